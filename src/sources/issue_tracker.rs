//! GitHub: stories in progress and open pull requests.

use super::{FetchSummary, GatherContext, Repository, RepositoryProvider, Source};
use crate::metrics::{LiveSnapshot, Metric};
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, warn};

pub const IN_PROGRESS_LABEL: &str = "in progress";
pub const FEATURE_LABEL: &str = "feature";

#[derive(Debug, Deserialize)]
struct Organization {
    repos_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Issue {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }

    /// A feature story that is being worked on: both labels must be present.
    pub fn is_feature_in_progress(&self) -> bool {
        self.has_label(IN_PROGRESS_LABEL) && self.has_label(FEATURE_LABEL)
    }
}

/// Counts feature stories in progress and open pull requests across the org.
///
/// Only the first page of every collection is read.
pub struct IssueTrackerSource {
    transport: HttpTransport,
    organization: String,
}

impl IssueTrackerSource {
    pub fn new(transport: HttpTransport, organization: impl Into<String>) -> Self {
        Self {
            transport,
            organization: organization.into(),
        }
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    async fn count_in_progress(&self, repo: &Repository) -> Result<u64> {
        let issues: Vec<Issue> = self.transport.get_json(&repo.issues_endpoint()).await?;
        Ok(issues.iter().filter(|i| i.is_feature_in_progress()).count() as u64)
    }

    async fn count_pull_requests(&self, repo: &Repository) -> Result<u64> {
        let pulls: Vec<IgnoredAny> = self.transport.get_json(&repo.pulls_endpoint()).await?;
        Ok(pulls.len() as u64)
    }
}

#[async_trait]
impl RepositoryProvider for IssueTrackerSource {
    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let org: Organization = self
            .transport
            .get_path(&format!("orgs/{}", self.organization))
            .await?;
        if org.repos_url.is_empty() {
            return Err(Error::decode_with_context(
                "organization has no repos_url",
                ErrorContext::new()
                    .with_field_path("repos_url")
                    .with_source("issue_tracker"),
            ));
        }
        let repos: Vec<Repository> = self.transport.get_json(&org.repos_url).await?;
        debug!(
            organization = self.organization.as_str(),
            repositories = repos.len(),
            "resolved repository list"
        );
        Ok(repos)
    }
}

#[async_trait]
impl Source for IssueTrackerSource {
    fn name(&self) -> &'static str {
        "issue_tracker"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::InProgress, Metric::PullRequests]
    }

    async fn fetch(&self, ctx: &GatherContext, snapshot: &LiveSnapshot) -> Result<FetchSummary> {
        let repos = ctx.repositories.repositories().await?;
        let mut summary = FetchSummary::default();

        for repo in repos.iter() {
            let mut ok = true;

            match self.count_in_progress(repo).await {
                Ok(n) => snapshot.increment(Metric::InProgress, n),
                Err(e) => {
                    warn!(repository = repo.full_name.as_str(), error = %e, "issues unavailable");
                    summary.skip(format!("{} issues", repo.full_name), e);
                    ok = false;
                }
            }

            match self.count_pull_requests(repo).await {
                Ok(n) => snapshot.increment(Metric::PullRequests, n),
                Err(e) => {
                    warn!(repository = repo.full_name.as_str(), error = %e, "pull requests unavailable");
                    summary.skip(format!("{} pulls", repo.full_name), e);
                    ok = false;
                }
            }

            if ok {
                summary.count();
            }
        }

        Ok(summary)
    }
}
