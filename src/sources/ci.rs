//! Snap CI: repositories whose latest pipeline did not pass.
//!
//! The CI API does not return the latest pipeline directly. It answers with a
//! link (`_links.redirect.href`) that has to be fetched in a second request.
//! Repositories the CI service does not know about fail that first lookup and
//! are skipped; they never stop the scan of the remaining repositories.

use super::{FetchSummary, GatherContext, Repository, Source};
use crate::metrics::{LiveSnapshot, Metric};
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

pub const PASSED: &str = "passed";

#[derive(Debug, Deserialize)]
struct LatestLink {
    #[serde(rename = "_links")]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct Links {
    redirect: Href,
}

#[derive(Debug, Deserialize)]
struct Href {
    href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub result: Option<String>,
}

impl Pipeline {
    /// Anything but an explicit pass counts as failing, including a missing result.
    pub fn is_failing(&self) -> bool {
        self.result.as_deref() != Some(PASSED)
    }
}

/// Outcome of resolving the latest pipeline for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineLookup {
    Resolved(String),
    Unavailable(String),
}

pub struct CiSource {
    transport: HttpTransport,
    branch: String,
}

impl CiSource {
    pub fn new(transport: HttpTransport, branch: impl Into<String>) -> Self {
        Self {
            transport,
            branch: branch.into(),
        }
    }

    pub async fn resolve_latest(&self, repo: &Repository) -> PipelineLookup {
        let path = format!(
            "project/{}/branch/{}/pipelines/latest",
            repo.full_name, self.branch
        );
        match self.transport.get_path::<LatestLink>(&path).await {
            Ok(link) if !link.links.redirect.href.is_empty() => {
                PipelineLookup::Resolved(link.links.redirect.href)
            }
            Ok(_) => PipelineLookup::Unavailable("empty redirect link".to_string()),
            Err(e) => PipelineLookup::Unavailable(e.to_string()),
        }
    }

    async fn latest_pipeline(&self, href: &str) -> Result<Pipeline> {
        self.transport.get_json(href).await.map_err(|e| match e {
            Error::Decode { message, .. } => Error::decode_with_context(
                message,
                ErrorContext::new()
                    .with_field_path("result")
                    .with_details(href.to_string())
                    .with_source("ci"),
            ),
            other => other,
        })
    }
}

#[async_trait]
impl Source for CiSource {
    fn name(&self) -> &'static str {
        "ci"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::FailingPipelines]
    }

    async fn fetch(&self, ctx: &GatherContext, snapshot: &LiveSnapshot) -> Result<FetchSummary> {
        let repos = ctx.repositories.repositories().await?;
        let mut summary = FetchSummary::default();

        for repo in repos.iter() {
            let href = match self.resolve_latest(repo).await {
                PipelineLookup::Resolved(href) => href,
                PipelineLookup::Unavailable(reason) => {
                    debug!(repository = repo.full_name.as_str(), reason = reason.as_str(), "no pipeline");
                    summary.skip(repo.full_name.clone(), reason);
                    continue;
                }
            };

            match self.latest_pipeline(&href).await {
                Ok(pipeline) => {
                    if pipeline.is_failing() {
                        snapshot.increment(Metric::FailingPipelines, 1);
                    }
                    summary.count();
                }
                Err(e) => {
                    warn!(repository = repo.full_name.as_str(), error = %e, "latest pipeline unavailable");
                    summary.skip(repo.full_name.clone(), e);
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_result() {
        let p = |r: Option<&str>| Pipeline {
            result: r.map(str::to_string),
        };
        assert!(!p(Some("passed")).is_failing());
        assert!(p(Some("failed")).is_failing());
        assert!(p(Some("unknown")).is_failing());
        assert!(p(None).is_failing());
    }

    #[test]
    fn test_latest_link_decodes() {
        let link: LatestLink = serde_json::from_str(
            r#"{"_links":{"redirect":{"href":"https://api.snap-ci.com/project/o/r/branch/master/pipelines/7"}}}"#,
        )
        .unwrap();
        assert!(link.links.redirect.href.ends_with("/pipelines/7"));
    }
}
