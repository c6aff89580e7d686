//! Control socket: server (during `sharedl run`) and client (for `sharedl cancel`).
//! Protocol: one `ControlCommand` line per command, e.g. "cancel <id>",
//! answered by one reply line.

use anyhow::{Context, Result};
use sharedl_core::control::ControlCommand;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};

/// Reply to a line that is not a command.
pub const UNKNOWN_COMMAND_REPLY: &str = "unknown command";
/// Reply when the run loop is gone before answering.
pub const STOPPING_REPLY: &str = "runner is stopping";

/// A parsed command and where its reply line goes.
pub type ControlRequest = (ControlCommand, oneshot::Sender<String>);

/// Binds `path` and spawns a task forwarding each command to `requests`.
/// The run loop answers on the oneshot; the answer is written back as one line.
pub fn spawn_control_listener(
    requests: mpsc::Sender<ControlRequest>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    // A stale socket from a crashed run blocks bind.
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(serve(stream, requests.clone()));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve(stream: UnixStream, requests: mpsc::Sender<ControlRequest>) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match ControlCommand::parse(&line) {
            Some(command) => forward(&requests, command).await,
            None => {
                tracing::debug!(line, "ignoring control line");
                UNKNOWN_COMMAND_REPLY.to_string()
            }
        };
        if let Err(e) = write.write_all(format!("{}\n", reply).as_bytes()).await {
            tracing::debug!("control socket reply: {}", e);
            break;
        }
    }
}

async fn forward(requests: &mpsc::Sender<ControlRequest>, command: ControlCommand) -> String {
    let (tx, rx) = oneshot::channel();
    if requests.send((command, tx)).await.is_err() {
        return STOPPING_REPLY.to_string();
    }
    rx.await.unwrap_or_else(|_| STOPPING_REPLY.to_string())
}

/// Sends one command to a running `sharedl run` and returns its reply line.
/// Errors when nothing is listening on `socket_path`.
pub async fn send_command(socket_path: &Path, command: ControlCommand) -> Result<String> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    stream.write_all(command.to_line().as_bytes()).await?;
    stream.shutdown().await?;

    let mut reply = String::new();
    BufReader::new(stream).read_line(&mut reply).await?;
    let reply = reply.trim_end();
    if reply.is_empty() {
        anyhow::bail!("runner closed the control socket without a reply");
    }
    Ok(reply.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers every request with `answer(command)` until the listener goes away.
    fn answering(
        answer: impl Fn(ControlCommand) -> String + Send + 'static,
    ) -> mpsc::Sender<ControlRequest> {
        let (tx, mut rx) = mpsc::channel::<ControlRequest>(4);
        tokio::spawn(async move {
            while let Some((command, reply)) = rx.recv().await {
                let _ = reply.send(answer(command));
            }
        });
        tx
    }

    #[tokio::test]
    async fn cancel_gets_the_run_loop_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let requests = answering(|command| match command {
            ControlCommand::Cancel(id) => format!("cancelled {}", id),
        });

        let listener = spawn_control_listener(requests, &path).unwrap();
        let reply = send_command(&path, ControlCommand::Cancel(7)).await.unwrap();
        assert_eq!(reply, "cancelled 7");
        listener.abort();
    }

    #[tokio::test]
    async fn send_without_listener_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = send_command(&dir.path().join("none.sock"), ControlCommand::Cancel(1)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn garbage_lines_get_an_error_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let requests = answering(|_| "unexpected".to_string());
        let listener = spawn_control_listener(requests, &path).unwrap();

        let mut stream = UnixStream::connect(&path).await.unwrap();
        stream.write_all(b"pause 3\ncancel x\n").await.unwrap();
        stream.shutdown().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), UNKNOWN_COMMAND_REPLY);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), UNKNOWN_COMMAND_REPLY);
        assert!(lines.next_line().await.unwrap().is_none());
        listener.abort();
    }

    #[tokio::test]
    async fn stopped_run_loop_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let (requests, rx) = mpsc::channel::<ControlRequest>(1);
        drop(rx);
        let listener = spawn_control_listener(requests, &path).unwrap();

        let reply = send_command(&path, ControlCommand::Cancel(2)).await.unwrap();
        assert_eq!(reply, STOPPING_REPLY);
        listener.abort();
    }
}
