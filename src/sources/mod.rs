//! Data sources polled once per refresh cycle.
//!
//! # Sources
//!
//! | Source | Upstream | Metrics |
//! |--------|----------|---------|
//! | [`IssueTrackerSource`] | GitHub | `in_progress`, `pull_requests` |
//! | [`PlatformSource`] | Heroku | `dynos_down` |
//! | [`CiSource`] | Snap CI | `failing_pipelines` |
//! | [`TodoScanSource`] | local checkout | `todos` |
//!
//! Every source owns a disjoint set of metrics and increments only those. A
//! source returns `Err` only when its foundational request fails; failures of
//! single repositories/apps/projects are recorded as [`SkippedItem`]s and the
//! source carries on with the next item.

pub mod ci;
pub mod issue_tracker;
pub mod platform;
pub mod todos;

pub use ci::{CiSource, PipelineLookup};
pub use issue_tracker::IssueTrackerSource;
pub use platform::PlatformSource;
pub use todos::TodoScanSource;

use crate::metrics::{LiveSnapshot, Metric};
use crate::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A unit of gathering work run concurrently with the other sources.
#[async_trait]
pub trait Source: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Metrics this source increments. No two registered sources share one.
    fn metrics(&self) -> &'static [Metric];

    async fn fetch(&self, ctx: &GatherContext, snapshot: &LiveSnapshot) -> Result<FetchSummary>;
}

/// One item (repository, app, project) whose contribution was dropped this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub item: String,
    pub reason: String,
}

impl fmt::Display for SkippedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}

/// What a source managed to do in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Items that contributed to the counts.
    pub counted: usize,
    pub skipped: Vec<SkippedItem>,
}

impl FetchSummary {
    pub fn count(&mut self) {
        self.counted += 1;
    }

    pub fn skip(&mut self, item: impl Into<String>, reason: impl fmt::Display) {
        self.skipped.push(SkippedItem {
            item: item.into(),
            reason: reason.to_string(),
        });
    }
}

/// Repository descriptor returned by the issue tracker's org listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub issues_url: String,
    pub pulls_url: String,
}

static URL_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("URL template pattern is valid"));

/// Drop RFC 6570 style placeholders such as `{/number}` from a hypermedia URL.
pub fn strip_url_template(url: &str) -> String {
    URL_TEMPLATE.replace_all(url, "").into_owned()
}

impl Repository {
    pub fn issues_endpoint(&self) -> String {
        strip_url_template(&self.issues_url)
    }

    pub fn pulls_endpoint(&self) -> String {
        strip_url_template(&self.pulls_url)
    }
}

/// Lists the organisation's repositories.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<Repository>>;
}

/// Per-cycle, fetch-once view of the repository list.
///
/// Both the issue tracker and the CI source need the list. Whoever asks first
/// triggers the fetch; concurrent callers wait for it. The outcome, failure
/// included, is kept for the rest of the cycle so the list is never fetched twice.
pub struct RepositoryDirectory {
    provider: Option<Arc<dyn RepositoryProvider>>,
    cell: OnceCell<std::result::Result<Arc<Vec<Repository>>, String>>,
}

impl RepositoryDirectory {
    pub fn new(provider: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            provider: Some(provider),
            cell: OnceCell::new(),
        }
    }

    /// A directory with no provider; every lookup fails.
    pub fn unavailable() -> Self {
        Self {
            provider: None,
            cell: OnceCell::new(),
        }
    }

    pub async fn repositories(&self) -> Result<Arc<Vec<Repository>>> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::Dependency("no repository provider configured".into()))?;
        let entry = self
            .cell
            .get_or_init(|| async {
                provider
                    .list_repositories()
                    .await
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .await;
        entry
            .clone()
            .map_err(|e| Error::Dependency(format!("repository list: {}", e)))
    }
}

/// Shared, read-only inputs for one gather.
pub struct GatherContext {
    pub repositories: RepositoryDirectory,
}

impl GatherContext {
    pub fn new(repositories: RepositoryDirectory) -> Self {
        Self { repositories }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RepositoryProvider for CountingProvider {
        async fn list_repositories(&self) -> Result<Vec<Repository>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(Error::Remote {
                    status: 502,
                    url: "https://api.github.com/orgs/x/repos".into(),
                });
            }
            Ok(vec![Repository {
                full_name: "gramo-org/api".into(),
                issues_url: "https://api.github.com/repos/gramo-org/api/issues{/number}".into(),
                pulls_url: "https://api.github.com/repos/gramo-org/api/pulls{/number}".into(),
            }])
        }
    }

    #[test]
    fn test_strip_url_template() {
        assert_eq!(
            strip_url_template("https://api.github.com/repos/o/r/issues{/number}"),
            "https://api.github.com/repos/o/r/issues"
        );
        assert_eq!(strip_url_template("https://x/y"), "https://x/y");
    }

    #[tokio::test]
    async fn test_directory_fetches_once_for_concurrent_callers() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let dir = RepositoryDirectory::new(provider.clone());
        let (a, b) = tokio::join!(dir.repositories(), dir.repositories());
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap()[0].pulls_endpoint(), "https://api.github.com/repos/gramo-org/api/pulls");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_directory_remembers_failure() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let dir = RepositoryDirectory::new(provider.clone());
        let first = dir.repositories().await.unwrap_err();
        let second = dir.repositories().await.unwrap_err();
        assert!(matches!(first, Error::Dependency(_)));
        assert!(second.to_string().contains("502"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_directory() {
        let err = RepositoryDirectory::unavailable().repositories().await.unwrap_err();
        assert!(matches!(err, Error::Dependency(_)));
    }

    #[test]
    fn test_fetch_summary_records_skips() {
        let mut summary = FetchSummary::default();
        summary.count();
        summary.skip("gramo-org/api", "HTTP 404");
        assert_eq!(summary.counted, 1);
        assert_eq!(summary.skipped[0].to_string(), "gramo-org/api: HTTP 404");
    }
}
