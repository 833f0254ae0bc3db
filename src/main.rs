mod cli;
mod repl;

use anyhow::Result;
use clap::Parser;
use termchat_client::ClientConfig;
use termchat_server::{ChatServer, ServerConfig};
use tokio_util::sync::CancellationToken;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();
    log::debug!("starting with {:?}", args.command);

    match args.command {
        Command::Server {
            host,
            port,
            capacity,
        } => {
            let server = ChatServer::new(ServerConfig {
                host,
                port,
                log_capacity: capacity,
            });
            let shutdown = CancellationToken::new();

            let ctrl_c = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            server.run_with_shutdown(shutdown).await
        },
        Command::Client {
            host,
            port,
            nickname,
        } => repl::run(ClientConfig { host, port }, nickname).await,
    }
}
