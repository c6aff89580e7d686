//! In-memory stand-ins for the pipeline's collaborators.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::channel::{DeliveryChannel, EditError};
use crate::job::{
    ChatId, Destination, DownloadMethod, Job, JobId, JobStats, JobStatus, JobStore, NewJob,
};
use crate::resolver::{ResolvedFile, Resolver};
use crate::transfer::{
    ProgressSnapshot, TransferEngine, TransferEvent, TransferOptions, TransferOutcome,
};

pub(crate) fn new_job(url: &str) -> NewJob {
    NewJob {
        source_url: url.to_string(),
        download_method: DownloadMethod::Direct,
        destination: Destination {
            chat_id: 1,
            message_id: 10,
            status_message_id: 11,
        },
    }
}

pub(crate) fn resolved(name: &str, id: &str) -> ResolvedFile {
    ResolvedFile {
        direct_url: format!("https://cdn.example.com/{}", name),
        file_name: name.to_string(),
        file_id: id.to_string(),
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    jobs: Mutex<BTreeMap<JobId, Job>>,
    chats: Mutex<HashMap<ChatId, DownloadMethod>>,
    next_id: AtomicI64,
    pub fail_saves: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn status(&self, id: JobId) -> Option<JobStatus> {
        self.get(id).map(|j| j.status)
    }

    pub(crate) fn put(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, new: &NewJob) -> Result<JobId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.put(Job {
            id,
            source_url: new.source_url.clone(),
            status: JobStatus::Queued,
            retry_count: 0,
            downloaded_files: Vec::new(),
            download_method: new.download_method,
            destination: new.destination,
            created_at: 0,
            updated_at: 0,
        });
        Ok(id)
    }

    async fn load(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.get(id))
    }

    async fn save(&self, job: &Job) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("disk I/O error");
        }
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => anyhow::bail!("job {} not found", job.id),
        }
    }

    async fn query_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        self.jobs.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn chat_method(&self, chat_id: ChatId) -> Result<Option<DownloadMethod>> {
        Ok(self.chats.lock().unwrap().get(&chat_id).copied())
    }

    async fn set_chat_method(&self, chat_id: ChatId, method: DownloadMethod) -> Result<()> {
        self.chats.lock().unwrap().insert(chat_id, method);
        Ok(())
    }

    async fn stats(&self, chat_id: ChatId) -> Result<JobStats> {
        let mut stats = JobStats::default();
        for job in self.jobs.lock().unwrap().values() {
            if job.destination.chat_id == chat_id {
                stats.add(job.status, 1);
            }
        }
        Ok(stats)
    }
}

/// Records every call; status messages listed in `missing` report `NotFound`.
#[derive(Default)]
pub(crate) struct FakeChannel {
    pub edits: Mutex<Vec<(i64, String)>>,
    pub sent: Mutex<Vec<(PathBuf, String)>>,
    pub deleted: Mutex<Vec<i64>>,
    pub notices: Mutex<Vec<(ChatId, String)>>,
    pub missing: Mutex<HashSet<i64>>,
    pub fail_send: AtomicBool,
    next_message: AtomicI64,
}

impl FakeChannel {
    pub(crate) fn new() -> Self {
        Self {
            next_message: AtomicI64::new(100),
            ..Self::default()
        }
    }

    pub(crate) fn edits_of(&self, status_message_id: i64) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == status_message_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub(crate) fn last_edit(&self, status_message_id: i64) -> Option<String> {
        self.edits_of(status_message_id).pop()
    }
}

#[async_trait]
impl DeliveryChannel for FakeChannel {
    async fn create_status_message(
        &self,
        _chat_id: ChatId,
        _reply_to: i64,
        text: &str,
    ) -> Result<i64> {
        let id = self.next_message.fetch_add(1, Ordering::SeqCst);
        self.edits.lock().unwrap().push((id, text.to_string()));
        Ok(id)
    }

    async fn edit_status_message(&self, dest: &Destination, text: &str) -> Result<(), EditError> {
        if self.missing.lock().unwrap().contains(&dest.status_message_id) {
            return Err(EditError::NotFound);
        }
        self.edits
            .lock()
            .unwrap()
            .push((dest.status_message_id, text.to_string()));
        Ok(())
    }

    async fn send_file(&self, _dest: &Destination, path: &Path, display_name: &str) -> Result<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            anyhow::bail!("upload rejected");
        }
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            anyhow::bail!("staged file {} missing", path.display());
        }
        self.sent
            .lock()
            .unwrap()
            .push((path.to_path_buf(), display_name.to_string()));
        Ok(())
    }

    async fn delete_status_message(&self, dest: &Destination) -> Result<()> {
        self.deleted.lock().unwrap().push(dest.status_message_id);
        Ok(())
    }

    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.notices.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

pub(crate) enum ResolveWith {
    Files(Vec<ResolvedFile>),
    Error(&'static str),
    /// Never returns; the executor has to race it against cancellation.
    Hang,
}

pub(crate) struct FakeResolver {
    with: ResolveWith,
    pub calls: AtomicUsize,
}

impl FakeResolver {
    pub(crate) fn new(with: ResolveWith) -> Self {
        Self {
            with,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(
        &self,
        _source_url: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedFile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.with {
            ResolveWith::Files(files) => Ok(files.clone()),
            ResolveWith::Error(msg) => Err(anyhow::anyhow!(*msg)),
            ResolveWith::Hang => std::future::pending().await,
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum EngineMode {
    /// Write `bytes` zero bytes after `hold`.
    Complete { bytes: usize, hold: Duration },
    Fail,
    /// Block until the token trips.
    UntilCancelled,
}

/// Transfer engine that writes a dummy file and tracks concurrency.
pub(crate) struct FakeEngine {
    mode: EngineMode,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub calls: AtomicUsize,
    /// Destination path of every transfer, in call order.
    pub destinations: Mutex<Vec<PathBuf>>,
    /// Signalled once per transfer after `Started` is sent.
    pub started: Notify,
}

impl FakeEngine {
    pub(crate) fn new(mode: EngineMode) -> Self {
        Self {
            mode,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            destinations: Mutex::new(Vec::new()),
            started: Notify::new(),
        }
    }

    pub(crate) fn completing(bytes: usize) -> Self {
        Self::new(EngineMode::Complete {
            bytes,
            hold: Duration::ZERO,
        })
    }
}

#[async_trait]
impl TransferEngine for FakeEngine {
    async fn transfer(
        &self,
        _direct_url: &str,
        destination: &Path,
        _options: &TransferOptions,
        cancel: &CancellationToken,
        events: mpsc::Sender<TransferEvent>,
    ) -> TransferOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_path_buf());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let total = match self.mode {
            EngineMode::Complete { bytes, .. } => Some(bytes as u64),
            _ => None,
        };
        let _ = events.try_send(TransferEvent::Started { total_bytes: total });
        let _ = events.try_send(TransferEvent::Progress(ProgressSnapshot {
            bytes_received: 0,
            total_bytes: total,
            bytes_per_sec: 0,
        }));
        self.started.notify_one();

        let outcome = match self.mode {
            EngineMode::Complete { bytes, hold } => {
                tokio::select! {
                    _ = cancel.cancelled() => TransferOutcome::Cancelled,
                    _ = tokio::time::sleep(hold) => {
                        write_dummy(destination, bytes).await
                    }
                }
            }
            EngineMode::Fail => TransferOutcome::Failed(anyhow::anyhow!("HTTP 404")),
            EngineMode::UntilCancelled => {
                cancel.cancelled().await;
                TransferOutcome::Cancelled
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

async fn write_dummy(path: &Path, bytes: usize) -> TransferOutcome {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return TransferOutcome::Failed(e.into());
        }
    }
    match tokio::fs::write(path, vec![0u8; bytes]).await {
        Ok(()) => TransferOutcome::Completed {
            bytes: bytes as u64,
        },
        Err(e) => TransferOutcome::Failed(e.into()),
    }
}
