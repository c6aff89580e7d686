//! Resolver for share links through a third-party share API.
//!
//! `GET api/get-info?shorturl=<code>&pwd=` lists the files of a share, then
//! `POST api/get-download` returns a direct link per file.

mod parse;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{ResolvedFile, Resolver};
use parse::{decode_download_link, decode_share_info, share_code, DownloadRequest};

#[derive(Debug, Clone)]
pub struct ShareApiResolver {
    base: Url,
    user_agent: String,
}

impl ShareApiResolver {
    pub fn new(base: &str, user_agent: &str) -> Result<Self> {
        let mut base =
            Url::parse(base).with_context(|| format!("invalid share API base {:?}", base))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            user_agent: user_agent.to_string(),
        })
    }

    fn share_info_url(&self, code: &str) -> Result<Url> {
        let mut url = self.base.join("api/get-info")?;
        url.query_pairs_mut()
            .append_pair("shorturl", code)
            .append_pair("pwd", "");
        Ok(url)
    }

    fn download_url(&self) -> Result<Url> {
        Ok(self.base.join("api/get-download")?)
    }

    async fn call(&self, url: Url, body: Option<String>) -> Result<Vec<u8>> {
        let user_agent = self.user_agent.clone();
        let referer = self.base.to_string();
        tokio::task::spawn_blocking(move || request(url.as_str(), body.as_deref(), &user_agent, &referer))
            .await?
    }
}

/// Blocking GET (or JSON POST when `body` is set); returns the 2xx body.
fn request(url: &str, body: Option<&str>, user_agent: &str, referer: &str) -> Result<Vec<u8>> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.useragent(user_agent)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(60))?;

    let mut headers = curl::easy::List::new();
    headers.append("Accept: application/json")?;
    headers.append("Accept-Language: en-US,en;q=0.5")?;
    headers.append(&format!("Referer: {}", referer))?;
    if let Some(body) = body {
        headers.append("Content-Type: application/json")?;
        easy.post(true)?;
        easy.post_fields_copy(body.as_bytes())?;
    }
    easy.http_headers(headers)?;

    let mut out = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            out.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform().with_context(|| format!("request {} failed", url))?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("share API returned HTTP {}", code);
    }
    Ok(out)
}

#[async_trait]
impl Resolver for ShareApiResolver {
    async fn resolve(
        &self,
        source_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedFile>> {
        let code = share_code(source_url).context("failed to get share id from URL")?;
        tracing::debug!(url = source_url, code = %code, "resolving share");

        let body = self
            .call(self.share_info_url(&code)?, None)
            .await
            .context("get share info")?;
        let info = decode_share_info(&body)?;
        if info.list.is_empty() {
            anyhow::bail!("no files found in share");
        }

        let mut files = Vec::with_capacity(info.list.len());
        for entry in &info.list {
            if cancel.is_cancelled() {
                anyhow::bail!("resolution cancelled");
            }
            let request = DownloadRequest {
                shareid: info.shareid,
                uk: info.uk,
                sign: &info.sign,
                timestamp: info.timestamp,
                fs_id: &entry.fs_id,
            };
            let payload = serde_json::to_string(&request)?;
            let body = self
                .call(self.download_url()?, Some(payload))
                .await
                .with_context(|| format!("get download link for {}", entry.filename))?;
            files.push(ResolvedFile {
                direct_url: decode_download_link(&body)?,
                file_name: entry.filename.clone(),
                file_id: entry.fs_id.clone(),
            });
        }
        Ok(files)
    }
}
