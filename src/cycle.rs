//! The refresh loop: gather, classify, persist, render, sleep.

use crate::config::{Credentials, DashboardConfig};
use crate::gather::{GatherCoordinator, GatherReport};
use crate::metrics::{MetricSet, Snapshot};
use crate::render::{render_frame, Terminal, BANNER};
use crate::sources::{CiSource, IssueTrackerSource, PlatformSource, TodoScanSource};
use crate::summary::SummaryWriter;
use crate::thresholds::{Summary, Thresholds};
use crate::transport::{build_client, HttpTransport, SourceProfile};
use crate::Result;
use std::collections::HashSet;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Everything one cycle produced.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub report: GatherReport,
    pub summary: Summary,
    pub frame: String,
}

pub struct Dashboard {
    coordinator: GatherCoordinator,
    thresholds: Thresholds,
    tracked: MetricSet,
    summarized: MetricSet,
    writer: SummaryWriter,
    interval: Duration,
}

impl Dashboard {
    pub fn new(
        coordinator: GatherCoordinator,
        thresholds: Thresholds,
        tracked: MetricSet,
        writer: SummaryWriter,
        interval: Duration,
    ) -> Self {
        let owned = coordinator.owned_metrics();
        for metric in tracked.iter().filter(|m| !owned.contains(m)) {
            warn!(metric = metric.key(), "tracked metric has no source and will stay at 0");
        }
        Self {
            coordinator,
            thresholds,
            summarized: tracked.clone(),
            tracked,
            writer,
            interval,
        }
    }

    /// Count a different set of metrics in the summary file than the one displayed.
    pub fn with_summary_metrics(mut self, metrics: MetricSet) -> Self {
        self.summarized = metrics;
        self
    }

    /// Wire up the GitHub, Heroku and Snap CI sources (and the TODO scan, if configured).
    pub fn from_config(config: &DashboardConfig, credentials: &Credentials) -> Result<Self> {
        let client = build_client(&config.http_settings())?;

        let issue_tracker = Arc::new(IssueTrackerSource::new(
            HttpTransport::with_client(
                client.clone(),
                SourceProfile::github(&config.github.api_url, &credentials.github_token),
            ),
            &config.github.organization,
        ));
        let platform = Arc::new(PlatformSource::new(
            HttpTransport::with_client(
                client.clone(),
                SourceProfile::heroku(&config.heroku.api_url, &credentials.heroku_token),
            ),
            &config.heroku.app_prefix,
        ));
        let ci_user = credentials
            .snapci_user
            .clone()
            .unwrap_or_else(|| config.snapci.user.clone());
        let ci = Arc::new(CiSource::new(
            HttpTransport::with_client(
                client,
                SourceProfile::snapci(&config.snapci.api_url, ci_user, &credentials.snapci_token),
            ),
            &config.snapci.branch,
        ));

        let mut coordinator = GatherCoordinator::new()
            .with_repository_provider(issue_tracker.clone())
            .with_source(issue_tracker)
            .with_source(platform)
            .with_source(ci);

        if let Some(todos) = &config.todos {
            let source = match &todos.pattern {
                Some(pattern) => TodoScanSource::with_pattern(&todos.root, pattern)?,
                None => TodoScanSource::new(&todos.root),
            };
            coordinator = coordinator.with_source(Arc::new(source));
        }

        info!(
            sources = ?coordinator.source_names(),
            organization = config.github.organization.as_str(),
            interval_secs = config.refresh_interval_secs,
            "dashboard configured"
        );

        Ok(Self::new(
            coordinator,
            config.thresholds(),
            config.tracked_metrics(),
            SummaryWriter::new(&config.summary_path),
            config.refresh_interval(),
        )
        .with_summary_metrics(config.summary_metrics()))
    }

    pub fn tracked(&self) -> &MetricSet {
        &self.tracked
    }

    pub fn summarized(&self) -> &MetricSet {
        &self.summarized
    }

    /// Startup: show the banner and make sure the summary file exists before the
    /// first gather, derived from an all-zero snapshot.
    pub async fn initialize<W: Write>(&self, term: &mut Terminal<W>) -> Result<Summary> {
        term.draw(BANNER)?;
        let summary = self.thresholds.summarize(&Snapshot::zeroed(), &self.summarized);
        self.writer.write(&summary).await?;
        Ok(summary)
    }

    /// One full cycle. The frame is drawn even when persisting the summary fails;
    /// that failure is returned afterwards.
    pub async fn run_cycle<W: Write>(&self, term: &mut Terminal<W>) -> Result<CycleOutcome> {
        let report = self.coordinator.gather().await;
        let summary = self.thresholds.summarize(&report.snapshot, &self.summarized);
        let persisted = self.writer.write(&summary).await;

        let degraded: HashSet<_> = report.degraded_metrics();
        let frame = render_frame(&report.snapshot, &self.thresholds, &self.tracked, &degraded);
        term.draw(&frame)?;
        persisted?;

        info!(
            ok = summary.ok,
            warn = summary.warn,
            crit = summary.crit,
            worst = summary.worst().as_str(),
            "cycle complete"
        );
        Ok(CycleOutcome {
            report,
            summary,
            frame,
        })
    }

    /// Refresh until `shutdown` resolves. Cycle errors are logged and never stop the loop.
    pub async fn run<W, F>(&self, term: &mut Terminal<W>, shutdown: F) -> Result<()>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        if let Err(e) = self.initialize(term).await {
            error!(error = %e, "initial summary could not be written");
        }

        tokio::pin!(shutdown);
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            if let Err(e) = self.run_cycle(term).await {
                error!(cycle, error = %e, "refresh cycle failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!(cycles = cycle, "shutting down");
                    return Ok(());
                }
            }
        }
    }
}
