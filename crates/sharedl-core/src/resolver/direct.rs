//! Links that already point at the file.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::fetch_head;
use crate::url_model::derive_filename;

use super::{ResolvedFile, Resolver};

/// Resolves a direct URL to itself. A HEAD probe supplies the
/// `Content-Disposition` name when the server sends one.
#[derive(Debug, Clone)]
pub struct DirectResolver {
    user_agent: String,
}

impl DirectResolver {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
        }
    }
}

/// First 16 hex digits of the URL's SHA-256.
pub(crate) fn url_file_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..8])
}

#[async_trait]
impl Resolver for DirectResolver {
    async fn resolve(
        &self,
        source_url: &str,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<ResolvedFile>> {
        let url = url::Url::parse(source_url)
            .map_err(|e| anyhow::anyhow!("invalid URL {:?}: {}", source_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("unsupported URL scheme {:?}", url.scheme());
        }

        let probe_url = source_url.to_string();
        let user_agent = self.user_agent.clone();
        let head = tokio::task::spawn_blocking(move || fetch_head::probe(&probe_url, &user_agent))
            .await?;

        let content_disposition = match head {
            Ok(h) => h.content_disposition,
            Err(e) => {
                // Some hosts refuse HEAD; the transfer reports real failures.
                tracing::debug!(url = source_url, "HEAD probe failed: {:#}", e);
                None
            }
        };

        Ok(vec![ResolvedFile {
            direct_url: source_url.to_string(),
            file_name: derive_filename(source_url, content_disposition.as_deref()),
            file_id: url_file_id(source_url),
        }])
    }
}
