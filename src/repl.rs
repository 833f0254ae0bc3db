use std::io::Write;

use anyhow::{bail, Context, Result};
use termchat_client::{ChatClient, ClientConfig};
use termchat_protocol::Message;
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};

const QUIT: &str = "/quit";
const SYNC: &str = "/sync";

type Input = Lines<BufReader<Stdin>>;

/// Interactive session: pick a nickname, then every line typed is posted and the
/// message list is brought up to date.
pub async fn run(config: ClientConfig, nickname: Option<String>) -> Result<()> {
    let client = ChatClient::connect(&config)
        .await
        .with_context(|| format!("failed to connect to {}:{}", config.host, config.port))?;
    println!("connected");

    let mut input = BufReader::new(stdin()).lines();

    if !authenticate(&client, &mut input, nickname).await? {
        client.close().await;
        return Ok(());
    }
    println!("authenticated (type {} to fetch new messages, {} to leave)", SYNC, QUIT);

    let mut shown = refresh(&client, 0).await?;

    while let Some(line) = input.next_line().await? {
        let line = line.trim_end();
        match line {
            QUIT => break,
            SYNC | "" => {},
            text => {
                if !client.post(text).await {
                    println!("message not sent ('#' is not allowed)");
                }
            },
        }
        shown = refresh(&client, shown).await?;
    }

    client.close().await;
    Ok(())
}

/// Returns false if input ran out before a nickname was accepted.
async fn authenticate(
    client: &ChatClient,
    input: &mut Input,
    mut nickname: Option<String>,
) -> Result<bool> {
    loop {
        let candidate = match nickname.take() {
            Some(candidate) => candidate,
            None => {
                prompt("Nickname: ")?;
                match input.next_line().await? {
                    Some(line) => line.trim().to_string(),
                    None => return Ok(false),
                }
            },
        };

        if client.connect_as(&candidate).await {
            return Ok(true);
        }
        if !client.is_connected() {
            bail!("connection to server lost");
        }
        println!("nickname '{}' is taken, try another", candidate);
    }
}

/// Syncs and prints every message past the first `shown`. Returns the new count.
async fn refresh(client: &ChatClient, shown: usize) -> Result<usize> {
    if !client.sync().await && !client.is_connected() {
        bail!("connection to server lost");
    }
    let messages = client.messages().await;
    for message in messages.iter().skip(shown) {
        println!("{}", format_message(message));
    }
    Ok(messages.len())
}

fn format_message(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        message.timestamp().as_datetime().format("%Y-%m-%d %H:%M:%S"),
        message.sender(),
        message.content()
    )
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use termchat_protocol::Timestamp;

    #[test]
    fn test_format_message() {
        let timestamp = Timestamp::parse("2022-10-06T10:00:00.123456").unwrap();
        let message = Message::new("alice", timestamp, "hello");
        assert_eq!(format_message(&message), "[2022-10-06 10:00:00] alice: hello");
    }
}
