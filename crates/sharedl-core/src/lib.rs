//! Core of sharedl: resolves share links, transfers the files they point at
//! and delivers them to the requesting chat, one job per link.

pub mod channel;
pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod fetch_head;
pub mod job;
pub mod job_db;
pub mod logging;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod segmenter;
pub mod storage;
pub mod submit;
pub mod transfer;
pub mod url_model;

#[cfg(test)]
mod testing;
