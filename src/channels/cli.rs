//! CLI channel — stdin/stdout REPL for local testing.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::activity::Activity;
use crate::error::ChannelError;
use crate::router::DialogRouter;

const CONVERSATION_ID: &str = "cli-conversation";
const USER_ID: &str = "local-user";
const USER_NAME: &str = "Usuario local";

/// Feeds stdin lines to the router as messages from a fixed local user.
pub struct CliChannel {
    router: Arc<DialogRouter>,
}

impl CliChannel {
    pub fn new(router: Arc<DialogRouter>) -> Self {
        Self { router }
    }

    /// Run until EOF or `/quit`.
    pub async fn run(&self) -> Result<(), ChannelError> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.run_with(stdin, tokio::io::stdout()).await
    }

    pub async fn run_with<R, W>(&self, reader: R, mut writer: W) -> Result<(), ChannelError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "/quit" {
                break;
            }

            let activity = Activity::message(CONVERSATION_ID, USER_ID, USER_NAME, line);
            let mut out = String::new();
            for reply in self.router.handle_turn(activity).await {
                out.push_str(&reply.render_plain());
                out.push('\n');
            }
            out.push('\n');
            writer.write_all(out.as_bytes()).await.map_err(write_failed)?;
            writer.flush().await.map_err(write_failed)?;
        }
        Ok(())
    }
}

fn write_failed(e: std::io::Error) -> ChannelError {
    ChannelError::SendFailed {
        name: "cli".to_string(),
        reason: e.to_string(),
    }
}
