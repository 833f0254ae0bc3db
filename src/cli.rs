use clap::{Parser, Subcommand};
use termchat_core::DEFAULT_LOG_CAPACITY;
use termchat_protocol::{DEFAULT_HOST, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat server
    Server {
        /// Address to listen on
        #[clap(long, env = "TERMCHAT_HOST", default_value = DEFAULT_HOST)]
        host: String,

        #[clap(long, env = "TERMCHAT_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Number of messages kept in memory; older ones are dropped
        #[clap(long, env = "TERMCHAT_CAPACITY", default_value_t = DEFAULT_LOG_CAPACITY)]
        capacity: usize,
    },
    /// Connect to a chat server interactively
    Client {
        #[clap(long, env = "TERMCHAT_HOST", default_value = DEFAULT_HOST)]
        host: String,

        #[clap(long, env = "TERMCHAT_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Nickname to try first; prompted for when missing or taken
        #[clap(long, env = "TERMCHAT_NICKNAME")]
        nickname: Option<String>,
    },
}
