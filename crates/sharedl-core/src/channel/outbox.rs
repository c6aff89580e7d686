//! Filesystem-backed delivery channel.
//!
//! Layout under the root, per chat:
//!
//! ```text
//! <chat_id>/status/<message_id>.txt   current text of each status message
//! <chat_id>/files/<name>              delivered files
//! <chat_id>/notices.log               one line per notice
//! ```
//!
//! Removing a status file by hand behaves like a deleted chat message: the
//! next edit reports `EditError::NotFound`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::job::{ChatId, Destination};
use crate::job_db::unix_timestamp;
use crate::url_model::staging_file_name;

use super::{DeliveryChannel, EditError};

#[derive(Debug, Clone)]
pub struct OutboxChannel {
    root: PathBuf,
}

impl OutboxChannel {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chat_dir(&self, chat_id: ChatId) -> PathBuf {
        self.root.join(chat_id.to_string())
    }

    pub fn status_path(&self, chat_id: ChatId, message_id: i64) -> PathBuf {
        self.chat_dir(chat_id)
            .join("status")
            .join(format!("{}.txt", message_id))
    }

    pub fn files_dir(&self, chat_id: ChatId) -> PathBuf {
        self.chat_dir(chat_id).join("files")
    }

    pub fn notices_path(&self, chat_id: ChatId) -> PathBuf {
        self.chat_dir(chat_id).join("notices.log")
    }

    /// Highest message id currently present in the chat's status dir.
    async fn last_message_id(&self, dir: &Path) -> Result<i64> {
        let mut last = 0i64;
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("read {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let id = Path::new(&name)
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i64>().ok());
            if let Some(id) = id {
                last = last.max(id);
            }
        }
        Ok(last)
    }
}

/// Create `dir/name`, or `dir/name (n)` for the first free `n`. The file is
/// created with `create_new`, so concurrent deliveries never pick the same name.
async fn create_free_file(dir: &Path, name: &str) -> Result<(PathBuf, tokio::fs::File)> {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 0u32;
    loop {
        let candidate = match (n, ext) {
            (0, _) => dir.join(name),
            (_, Some(ext)) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            (_, None) => dir.join(format!("{} ({})", stem, n)),
        };
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("create {}", candidate.display()));
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for OutboxChannel {
    async fn create_status_message(
        &self,
        chat_id: ChatId,
        reply_to: i64,
        text: &str,
    ) -> Result<i64> {
        let dir = self.chat_dir(chat_id).join("status");
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;

        let mut id = self.last_message_id(&dir).await?.max(reply_to) + 1;
        // create_new makes concurrent writers (a `submit` next to `run`) pick distinct ids.
        loop {
            let path = dir.join(format!("{}.txt", id));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut f) => {
                    f.write_all(text.as_bytes()).await?;
                    f.flush().await?;
                    return Ok(id);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => id += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("create {}", path.display()));
                }
            }
        }
    }

    async fn edit_status_message(&self, dest: &Destination, text: &str) -> Result<(), EditError> {
        let path = self.status_path(dest.chat_id, dest.status_message_id);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .await;
        let mut file = match file {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(EditError::NotFound),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("open {}", path.display()))
                    .into())
            }
        };
        file.write_all(text.as_bytes())
            .await
            .with_context(|| format!("write {}", path.display()))?;
        file.flush().await.context("flush status message")?;
        Ok(())
    }

    async fn send_file(&self, dest: &Destination, path: &Path, display_name: &str) -> Result<()> {
        let mut source = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        let dir = self.files_dir(dest.chat_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;

        let (target, mut file) = create_free_file(&dir, &staging_file_name(display_name)).await?;
        let copied = async {
            tokio::io::copy(&mut source, &mut file).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(anyhow::Error::new(e)
                .context(format!("copy {} to {}", path.display(), target.display())));
        }
        tracing::debug!(chat_id = dest.chat_id, file = %target.display(), "file delivered");
        Ok(())
    }

    async fn delete_status_message(&self, dest: &Destination) -> Result<()> {
        let path = self.status_path(dest.chat_id, dest.status_message_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let dir = self.chat_dir(chat_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = self.notices_path(chat_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        let line = format!("[{}] {}\n", unix_timestamp(), text.replace('\n', " "));
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
