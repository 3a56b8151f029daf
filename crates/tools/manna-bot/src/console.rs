use crate::dispatch::{Dispatcher, Reply};
use anyhow::{Context, Result};
use manna_ledger::{PlayerId, PlayerStore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

/// Split an optional leading `<@id>` off a console line.
pub fn split_author(line: &str, default: PlayerId) -> (PlayerId, &str) {
    let trimmed = line.trim_start();
    if trimmed.starts_with("<@") {
        if let Some((mention, rest)) = trimmed.split_once('>') {
            if let Ok(id) = format!("{}>", mention).parse::<PlayerId>() {
                return (id, rest.trim_start());
            }
        }
    }
    (default, trimmed)
}

/// Render a reply the way the console shows it.
pub fn format_reply(reply: &Reply) -> String {
    let mut out = reply.text();
    if let Some(announcement) = &reply.announcement {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("[announce] ");
        out.push_str(announcement);
    }
    out
}

/// Read command lines until EOF, writing each reply. Returns the number of
/// commands answered.
///
/// A storage failure is reported on the writer and the loop carries on.
pub async fn run_console<S, R, W>(
    dispatcher: &Dispatcher<S>,
    default_user: PlayerId,
    reader: R,
    mut writer: W,
) -> Result<usize>
where
    S: PlayerStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;
    while let Some(line) = lines.next_line().await.context("Failed to read console input")? {
        let (author, message) = split_author(&line, default_user);
        if message.is_empty() {
            continue;
        }
        let output = match dispatcher.handle_message(author, message) {
            Ok(Some(reply)) => {
                answered += 1;
                format_reply(&reply)
            }
            Ok(None) => {
                debug!(%author, "Ignoring non-command line");
                continue;
            }
            Err(e) => {
                error!(%author, error = %e, "Command failed");
                answered += 1;
                format!("{}", e)
            }
        };
        writer.write_all(output.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(answered)
}
