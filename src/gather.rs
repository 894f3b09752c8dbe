//! Gather coordination: run every source concurrently, join them all, freeze the counts.
//!
//! A source that fails (or panics) only leaves its own metrics at whatever it had
//! counted so far. The coordinator still waits for every other source before the
//! snapshot is frozen, so nothing downstream ever sees a half-gathered cycle.

use crate::metrics::{LiveSnapshot, Metric, Snapshot};
use crate::sources::{
    FetchSummary, GatherContext, RepositoryDirectory, RepositoryProvider, SkippedItem, Source,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// How one source ended in a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Completed {
        counted: usize,
        skipped: Vec<SkippedItem>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: &'static str,
    pub metrics: &'static [Metric],
    pub status: SourceStatus,
    pub elapsed: Duration,
}

impl SourceReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed { .. })
    }
}

/// Result of one gather: the frozen counts plus what happened to each source.
#[derive(Debug, Clone)]
pub struct GatherReport {
    pub snapshot: Snapshot,
    pub sources: Vec<SourceReport>,
    pub elapsed: Duration,
}

impl GatherReport {
    /// Metrics whose owning source failed outright this cycle.
    pub fn degraded_metrics(&self) -> HashSet<Metric> {
        self.sources
            .iter()
            .filter(|r| r.is_failed())
            .flat_map(|r| r.metrics.iter().copied())
            .collect()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|r| r.is_failed())
    }

    pub fn report(&self, source: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.source == source)
    }
}

/// Owns the registered sources and runs them once per [`gather`](Self::gather).
pub struct GatherCoordinator {
    sources: Vec<Arc<dyn Source>>,
    repositories: Option<Arc<dyn RepositoryProvider>>,
}

impl GatherCoordinator {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            repositories: None,
        }
    }

    /// Register a source. Panics if it claims a metric another source already owns.
    pub fn with_source(mut self, source: Arc<dyn Source>) -> Self {
        for existing in &self.sources {
            for m in source.metrics() {
                assert!(
                    !existing.metrics().contains(m),
                    "metric {} is owned by both {} and {}",
                    m,
                    existing.name(),
                    source.name()
                );
            }
        }
        self.sources.push(source);
        self
    }

    /// Set where the shared repository list comes from.
    pub fn with_repository_provider(mut self, provider: Arc<dyn RepositoryProvider>) -> Self {
        self.repositories = Some(provider);
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Metrics covered by at least one registered source.
    pub fn owned_metrics(&self) -> Vec<Metric> {
        self.sources
            .iter()
            .flat_map(|s| s.metrics().iter().copied())
            .collect()
    }

    pub async fn gather(&self) -> GatherReport {
        let start = Instant::now();
        let snapshot = Arc::new(LiveSnapshot::new());
        let directory = match &self.repositories {
            Some(p) => RepositoryDirectory::new(p.clone()),
            None => RepositoryDirectory::unavailable(),
        };
        let ctx = Arc::new(GatherContext::new(directory));

        let mut tasks = JoinSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let source = source.clone();
            let ctx = ctx.clone();
            let snapshot = snapshot.clone();
            tasks.spawn(async move {
                let started = Instant::now();
                let result = source.fetch(&ctx, &snapshot).await;
                (index, result, started.elapsed())
            });
        }

        let mut outcomes: Vec<Option<SourceReport>> = vec![None; self.sources.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result, elapsed)) => {
                    let source = &self.sources[index];
                    outcomes[index] = Some(report(source.as_ref(), result, elapsed));
                }
                Err(e) => {
                    // Panicked task: the index is lost with it, filled in below.
                    error!(error = %e, "source task aborted");
                }
            }
        }

        let sources: Vec<SourceReport> = outcomes
            .into_iter()
            .zip(self.sources.iter())
            .map(|(outcome, source)| {
                outcome.unwrap_or_else(|| SourceReport {
                    source: source.name(),
                    metrics: source.metrics(),
                    status: SourceStatus::Failed {
                        reason: "task panicked".to_string(),
                    },
                    elapsed: start.elapsed(),
                })
            })
            .collect();

        let elapsed = start.elapsed();
        let snapshot = snapshot.freeze();
        info!(
            sources = sources.len(),
            failed = sources.iter().filter(|r| r.is_failed()).count(),
            duration_ms = elapsed.as_millis() as u64,
            "gather complete"
        );

        GatherReport {
            snapshot,
            sources,
            elapsed,
        }
    }
}

impl Default for GatherCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn report(source: &dyn Source, result: crate::Result<FetchSummary>, elapsed: Duration) -> SourceReport {
    let status = match result {
        Ok(summary) => {
            if !summary.skipped.is_empty() {
                warn!(
                    source = source.name(),
                    skipped = summary.skipped.len(),
                    counted = summary.counted,
                    "source completed with skipped items"
                );
            }
            SourceStatus::Completed {
                counted: summary.counted,
                skipped: summary.skipped,
            }
        }
        Err(e) => {
            warn!(source = source.name(), error = %e, "source failed");
            SourceStatus::Failed {
                reason: e.to_string(),
            }
        }
    };
    SourceReport {
        source: source.name(),
        metrics: source.metrics(),
        status,
        elapsed,
    }
}
