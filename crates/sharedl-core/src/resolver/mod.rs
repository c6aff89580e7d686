//! Resolution of submitted links into direct-downloadable files.
//!
//! Each `DownloadMethod` maps to one [`Resolver`]. The registry is built once
//! at startup and shared read-only by every job.

mod direct;
mod share_api;

pub use direct::DirectResolver;
pub use share_api::ShareApiResolver;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::SharedlConfig;
use crate::error::JobError;
use crate::job::DownloadMethod;

/// One file a link resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub direct_url: String,
    /// Name shown to the requester.
    pub file_name: String,
    /// Stable id used to name the staging file.
    pub file_id: String,
}

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Turn `source_url` into one or more files. An empty share is an error.
    async fn resolve(
        &self,
        source_url: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<ResolvedFile>>;
}

#[derive(Default, Clone)]
pub struct ResolverRegistry {
    resolvers: HashMap<DownloadMethod, Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in resolver for every method.
    pub fn with_defaults(cfg: &SharedlConfig) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        registry.register(
            DownloadMethod::Direct,
            Arc::new(DirectResolver::new(&cfg.user_agent)),
        );
        registry.register(
            DownloadMethod::ShareApi,
            Arc::new(ShareApiResolver::new(&cfg.share_api_base, &cfg.user_agent)?),
        );
        Ok(registry)
    }

    /// Register (or replace) the resolver for `method`.
    pub fn register(&mut self, method: DownloadMethod, resolver: Arc<dyn Resolver>) {
        self.resolvers.insert(method, resolver);
    }

    pub fn resolve(&self, method: DownloadMethod) -> Result<Arc<dyn Resolver>, JobError> {
        self.resolvers
            .get(&method)
            .cloned()
            .ok_or(JobError::UnsupportedMethod(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl Resolver for Fixed {
        async fn resolve(
            &self,
            source_url: &str,
            _cancel: &CancellationToken,
        ) -> anyhow::Result<Vec<ResolvedFile>> {
            Ok(vec![ResolvedFile {
                direct_url: source_url.to_string(),
                file_name: "f".into(),
                file_id: "1".into(),
            }])
        }
    }

    #[tokio::test]
    async fn lookup_registered_method() {
        let mut registry = ResolverRegistry::new();
        registry.register(DownloadMethod::Direct, Arc::new(Fixed));

        let resolver = registry.resolve(DownloadMethod::Direct).unwrap();
        let files = resolver
            .resolve("https://x/y", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].direct_url, "https://x/y");
    }

    #[test]
    fn missing_method_is_unsupported() {
        let registry = ResolverRegistry::new();
        match registry.resolve(DownloadMethod::ShareApi) {
            Err(JobError::UnsupportedMethod(DownloadMethod::ShareApi)) => {}
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected UnsupportedMethod"),
        }
    }

    #[test]
    fn defaults_cover_every_method() {
        let registry = ResolverRegistry::with_defaults(&SharedlConfig::default()).unwrap();
        for method in DownloadMethod::ALL {
            assert!(registry.resolve(method).is_ok(), "{method} missing");
        }
    }
}
