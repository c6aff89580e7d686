//! Tests for job_db (use in-memory DB helper from db).

use std::path::PathBuf;

use super::open_memory;
use crate::job::{Destination, DownloadMethod, DownloadedFile, JobStatus, JobStore, NewJob};

fn new_job(url: &str, chat_id: i64) -> NewJob {
    NewJob {
        source_url: url.to_string(),
        download_method: DownloadMethod::Direct,
        destination: Destination {
            chat_id,
            message_id: 10,
            status_message_id: 11,
        },
    }
}

#[tokio::test]
async fn create_and_load_job() {
    let db = open_memory().await.unwrap();
    let id = db
        .create_job(&new_job("https://example.com/file.bin", 7))
        .await
        .unwrap();

    let job = db.load(id).await.unwrap().expect("job exists");
    assert_eq!(job.id, id);
    assert_eq!(job.source_url, "https://example.com/file.bin");
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.retry_count, 0);
    assert!(job.downloaded_files.is_empty());
    assert_eq!(job.download_method, DownloadMethod::Direct);
    assert_eq!(job.destination.chat_id, 7);
    assert_eq!(job.destination.message_id, 10);
    assert_eq!(job.destination.status_message_id, 11);

    assert!(db.load(id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn save_persists_status_and_files() {
    let db = open_memory().await.unwrap();
    let id = db.create_job(&new_job("https://a.com/x", 1)).await.unwrap();

    let mut job = db.load(id).await.unwrap().unwrap();
    job.status = JobStatus::InProgress;
    job.downloaded_files.push(DownloadedFile {
        file_name: "movie.mkv".to_string(),
        file_path: PathBuf::from("/tmp/staging/abc"),
    });
    db.save(&job).await.unwrap();

    let reloaded = db.load(id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, JobStatus::InProgress);
    assert_eq!(reloaded.downloaded_files, job.downloaded_files);
}

#[tokio::test]
async fn save_missing_job_is_error() {
    let db = open_memory().await.unwrap();
    let id = db.create_job(&new_job("https://a.com/x", 1)).await.unwrap();
    let job = db.load(id).await.unwrap().unwrap();
    db.delete(id).await.unwrap();
    assert!(db.save(&job).await.is_err());
}

#[tokio::test]
async fn query_by_status_in_insertion_order() {
    let db = open_memory().await.unwrap();
    let a = db.create_job(&new_job("https://a.com/1", 1)).await.unwrap();
    let b = db.create_job(&new_job("https://a.com/2", 1)).await.unwrap();
    let c = db.create_job(&new_job("https://a.com/3", 1)).await.unwrap();
    db.set_status(b, JobStatus::InProgress).await.unwrap();

    let queued: Vec<_> = db
        .query_by_status(JobStatus::Queued)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(queued, vec![a, c]);

    let running = db.query_by_status(JobStatus::InProgress).await.unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, b);
}

#[tokio::test]
async fn list_jobs_newest_first_and_by_chat() {
    let db = open_memory().await.unwrap();
    let a = db.create_job(&new_job("https://a.com/1", 1)).await.unwrap();
    let b = db.create_job(&new_job("https://a.com/2", 2)).await.unwrap();

    let all = db.list_jobs(None).await.unwrap();
    assert_eq!(all.iter().map(|j| j.id).collect::<Vec<_>>(), vec![b, a]);

    let chat2 = db.list_jobs(Some(2)).await.unwrap();
    assert_eq!(chat2.len(), 1);
    assert_eq!(chat2[0].id, b);
}

#[tokio::test]
async fn chat_method_upsert() {
    let db = open_memory().await.unwrap();
    assert_eq!(db.chat_method(5).await.unwrap(), None);

    db.set_chat_method(5, DownloadMethod::Direct).await.unwrap();
    assert_eq!(db.chat_method(5).await.unwrap(), Some(DownloadMethod::Direct));

    db.set_chat_method(5, DownloadMethod::ShareApi).await.unwrap();
    assert_eq!(
        db.chat_method(5).await.unwrap(),
        Some(DownloadMethod::ShareApi)
    );
}

#[tokio::test]
async fn stats_count_per_status() {
    let db = open_memory().await.unwrap();
    let a = db.create_job(&new_job("https://a.com/1", 3)).await.unwrap();
    let _b = db.create_job(&new_job("https://a.com/2", 3)).await.unwrap();
    let c = db.create_job(&new_job("https://a.com/3", 3)).await.unwrap();
    let _other = db.create_job(&new_job("https://a.com/4", 4)).await.unwrap();
    db.set_status(a, JobStatus::Completed).await.unwrap();
    db.set_status(c, JobStatus::Failed).await.unwrap();

    let stats = db.stats(3).await.unwrap();
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.in_progress, 0);
    assert_eq!(stats.cancelled, 0);
}

#[tokio::test]
async fn open_at_creates_file_and_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("jobs.db");
    let db = super::JobDb::open_at(&path).await.unwrap();
    db.create_job(&new_job("https://a.com/1", 1)).await.unwrap();
    assert!(path.exists());

    let reopened = super::JobDb::open_at(&path).await.unwrap();
    assert_eq!(reopened.list_jobs(None).await.unwrap().len(), 1);
}
