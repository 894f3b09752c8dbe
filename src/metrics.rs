//! Metric identifiers and the per-cycle counter snapshot.
//!
//! A [`LiveSnapshot`] is created at the start of every gather, shared with the
//! running sources through an `Arc`, and only ever incremented. Once every source
//! has finished it is frozen into a read-only [`Snapshot`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// One tracked quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    InProgress,
    PullRequests,
    DynosDown,
    FailingPipelines,
    Todos,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::InProgress,
        Metric::PullRequests,
        Metric::DynosDown,
        Metric::FailingPipelines,
        Metric::Todos,
    ];

    pub const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        match self {
            Metric::InProgress => 0,
            Metric::PullRequests => 1,
            Metric::DynosDown => 2,
            Metric::FailingPipelines => 3,
            Metric::Todos => 4,
        }
    }

    /// Stable snake_case identifier, as used in config files and logs.
    pub fn key(self) -> &'static str {
        match self {
            Metric::InProgress => "in_progress",
            Metric::PullRequests => "pull_requests",
            Metric::DynosDown => "dynos_down",
            Metric::FailingPipelines => "failing_pipelines",
            Metric::Todos => "todos",
        }
    }

    /// Human label shown on the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            Metric::InProgress => "Stories in progress",
            Metric::PullRequests => "Pull requests",
            Metric::DynosDown => "Dynos down",
            Metric::FailingPipelines => "Failed pipelines",
            Metric::Todos => "TODOs and FIXMEs",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.key() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// Ordered set of tracked metrics. Order only affects display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSet(Vec<Metric>);

impl MetricSet {
    /// Build a set from a list, dropping duplicates but keeping first-seen order.
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        let mut out: Vec<Metric> = Vec::new();
        for m in metrics {
            if !out.contains(&m) {
                out.push(m);
            }
        }
        Self(out)
    }

    /// The four network-backed metrics, in dashboard order.
    pub fn network() -> Self {
        Self::new([
            Metric::InProgress,
            Metric::PullRequests,
            Metric::DynosDown,
            Metric::FailingPipelines,
        ])
    }

    pub fn with(mut self, metric: Metric) -> Self {
        if !self.0.contains(&metric) {
            self.0.push(metric);
        }
        self
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.0.contains(&metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::network()
    }
}

/// Counters being filled in by running sources.
///
/// Sources own disjoint metrics, so contention never happens in practice; the
/// atomics only make concurrent increments sound.
#[derive(Debug, Default)]
pub struct LiveSnapshot {
    counters: [AtomicU64; Metric::COUNT],
}

impl LiveSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, metric: Metric, by: u64) {
        if by > 0 {
            self.counters[metric.index()].fetch_add(by, Ordering::Relaxed);
        }
    }

    pub fn get(&self, metric: Metric) -> u64 {
        self.counters[metric.index()].load(Ordering::Relaxed)
    }

    /// Read the current values into an immutable snapshot.
    ///
    /// Callers freeze only after every writer has been joined.
    pub fn freeze(&self) -> Snapshot {
        let mut values = [0u64; Metric::COUNT];
        for m in Metric::ALL {
            values[m.index()] = self.get(m);
        }
        Snapshot { values }
    }
}

/// Frozen metric values for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    values: [u64; Metric::COUNT],
}

impl Snapshot {
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: Metric) -> u64 {
        self.values[metric.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, u64)> + '_ {
        Metric::ALL.iter().map(move |m| (*m, self.get(*m)))
    }
}

impl FromIterator<(Metric, u64)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (Metric, u64)>>(iter: I) -> Self {
        let mut values = [0u64; Metric::COUNT];
        for (m, v) in iter {
            values[m.index()] = v;
        }
        Snapshot { values }
    }
}
