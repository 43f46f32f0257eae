//! TCP front end for the operator shell.

use crate::shell::{Reply, Shell, PROMPT};
use crate::{CliError, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

pub const BANNER: &str = "hotfix shell; type `help` for commands";

pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| CliError::Server(format!("failed to listen on {addr}: {e}")))
}

/// Accept sessions until `shutdown` resolves. Sessions already running are left to
/// finish on their own.
pub async fn serve(
    listener: TcpListener,
    shell: Shell,
    idle_timeout: Option<Duration>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    info!(address = %listener.local_addr()?, "hotfix shell listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!("accept failed: {err}");
                        continue;
                    }
                };
                let shell = shell.clone();
                tokio::spawn(async move {
                    if let Err(err) = session(stream, peer, shell, idle_timeout).await {
                        warn!(%peer, "session ended with an error: {err}");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("shutting down hotfix shell");
                return Ok(());
            }
        }
    }
}

async fn session(stream: TcpStream, peer: SocketAddr, shell: Shell, idle_timeout: Option<Duration>) -> Result<()> {
    info!(%peer, "session opened");
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    writer.write_all(format!("{BANNER}\r\n{PROMPT}").as_bytes()).await?;

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, lines.next_line()).await {
                Ok(next) => next?,
                Err(_) => {
                    writer.write_all(b"\r\nidle timeout, closing session\r\n").await?;
                    debug!(%peer, "session idle");
                    break;
                }
            },
            None => lines.next_line().await?,
        };
        let Some(line) = next else {
            break;
        };

        let worker = shell.clone();
        let reply = tokio::task::spawn_blocking(move || worker.execute(&line))
            .await
            .map_err(|e| CliError::Server(format!("shell worker failed: {e}")))?;
        match reply {
            Reply::Output(text) => {
                writer.write_all(crlf(&text).as_bytes()).await?;
                writer.write_all(format!("\r\n{PROMPT}").as_bytes()).await?;
            }
            Reply::Empty => writer.write_all(PROMPT.as_bytes()).await?,
            Reply::Exit(text) => {
                writer.write_all(format!("{}\r\n", crlf(&text)).as_bytes()).await?;
                break;
            }
        }
    }

    writer.shutdown().await?;
    info!(%peer, "session closed");
    Ok(())
}

/// Telnet clients expect CRLF line endings.
fn crlf(text: &str) -> String {
    text.replace('\n', "\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_become_crlf() {
        assert_eq!(crlf("a\nb"), "a\r\nb");
    }
}
