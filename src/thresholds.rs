//! Severity classification of metric values.

use crate::metrics::{Metric, MetricSet, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Severity tier. Ordered `Ok < Warn < Crit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Ok,
    Warn,
    Crit,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Ok => "ok",
            Tier::Warn => "warn",
            Tier::Crit => "crit",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bounds for the warn and crit tiers of one metric.
///
/// `crit >= warn` is assumed. When they are equal the warn tier is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warn: u64,
    pub crit: u64,
}

impl ThresholdPair {
    pub const fn new(warn: u64, crit: u64) -> Self {
        Self { warn, crit }
    }

    /// Crit is checked first, both bounds are inclusive.
    pub fn classify(&self, value: u64) -> Tier {
        if value >= self.crit {
            Tier::Crit
        } else if value >= self.warn {
            Tier::Warn
        } else {
            Tier::Ok
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.crit >= self.warn
    }
}

/// Threshold pairs for every metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholds {
    pairs: HashMap<Metric, ThresholdPair>,
}

impl Thresholds {
    pub fn get(&self, metric: Metric) -> ThresholdPair {
        self.pairs
            .get(&metric)
            .copied()
            .unwrap_or_else(|| default_pair(metric))
    }

    pub fn set(&mut self, metric: Metric, pair: ThresholdPair) {
        self.pairs.insert(metric, pair);
    }

    pub fn with(mut self, metric: Metric, pair: ThresholdPair) -> Self {
        self.set(metric, pair);
        self
    }

    pub fn classify(&self, metric: Metric, value: u64) -> Tier {
        self.get(metric).classify(value)
    }

    /// Count tracked metrics per tier.
    pub fn summarize(&self, snapshot: &Snapshot, tracked: &MetricSet) -> Summary {
        let mut summary = Summary::default();
        for metric in tracked.iter() {
            summary.record(self.classify(metric, snapshot.get(metric)));
        }
        summary
    }
}

fn default_pair(metric: Metric) -> ThresholdPair {
    match metric {
        Metric::InProgress => ThresholdPair::new(2, 3),
        Metric::PullRequests => ThresholdPair::new(1, 3),
        Metric::DynosDown => ThresholdPair::new(1, 1),
        Metric::FailingPipelines => ThresholdPair::new(1, 1),
        Metric::Todos => ThresholdPair::new(1, 5),
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pairs: Metric::ALL.iter().map(|m| (*m, default_pair(*m))).collect(),
        }
    }
}

/// Number of tracked metrics in each tier for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub ok: usize,
    pub warn: usize,
    pub crit: usize,
}

impl Summary {
    fn record(&mut self, tier: Tier) {
        match tier {
            Tier::Ok => self.ok += 1,
            Tier::Warn => self.warn += 1,
            Tier::Crit => self.crit += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.warn + self.crit
    }

    /// Worst tier with at least one metric in it.
    pub fn worst(&self) -> Tier {
        if self.crit > 0 {
            Tier::Crit
        } else if self.warn > 0 {
            Tier::Warn
        } else {
            Tier::Ok
        }
    }

    /// File body read by status-check agents: three `<tier> <count>` lines.
    pub fn to_file_contents(&self) -> String {
        format!("ok {}\nwarn {}\ncrit {}\n", self.ok, self.warn, self.crit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crit_boundary_for_every_metric() {
        let thresholds = Thresholds::default();
        for m in Metric::ALL {
            let pair = thresholds.get(m);
            assert_eq!(thresholds.classify(m, pair.crit), Tier::Crit, "{m}");
            let below = pair.crit - 1;
            let expected = if below >= pair.warn { Tier::Warn } else { Tier::Ok };
            assert_eq!(thresholds.classify(m, below), expected, "{m}");
        }
    }

    #[test]
    fn test_classify_is_monotonic() {
        let thresholds = Thresholds::default();
        for m in Metric::ALL {
            let mut previous = Tier::Ok;
            for v in 0..20 {
                let tier = thresholds.classify(m, v);
                assert!(tier >= previous, "{m} dropped from {previous} to {tier} at {v}");
                previous = tier;
            }
        }
    }

    #[test]
    fn test_classify_is_idempotent() {
        let pair = ThresholdPair::new(2, 3);
        for v in 0..6 {
            assert_eq!(pair.classify(v), pair.classify(v));
        }
    }

    #[test]
    fn test_equal_bounds_make_warn_unreachable() {
        let pair = ThresholdPair::new(1, 1);
        assert_eq!(pair.classify(0), Tier::Ok);
        assert_eq!(pair.classify(1), Tier::Crit);
        assert!((0..10).all(|v| pair.classify(v) != Tier::Warn));
    }

    #[test]
    fn test_warn_two_crit_three() {
        let pair = ThresholdPair::new(2, 3);
        assert_eq!(pair.classify(1), Tier::Ok);
        assert_eq!(pair.classify(2), Tier::Warn);
        assert_eq!(pair.classify(3), Tier::Crit);
        assert_eq!(pair.classify(40), Tier::Crit);
    }

    #[test]
    fn test_summary_sums_to_tracked_count() {
        let thresholds = Thresholds::default();
        let tracked = MetricSet::network().with(Metric::Todos);
        let snapshots = [
            Snapshot::zeroed(),
            [(Metric::InProgress, 2), (Metric::DynosDown, 4)].into_iter().collect(),
            Metric::ALL.iter().map(|m| (*m, 100)).collect(),
        ];
        for snap in snapshots {
            assert_eq!(thresholds.summarize(&snap, &tracked).total(), tracked.len());
        }
    }

    #[test]
    fn test_summary_file_contents() {
        let thresholds = Thresholds::default();
        let snap: Snapshot = [(Metric::InProgress, 2), (Metric::FailingPipelines, 1)]
            .into_iter()
            .collect();
        let summary = thresholds.summarize(&snap, &MetricSet::network());
        assert_eq!(summary, Summary { ok: 2, warn: 1, crit: 1 });
        assert_eq!(summary.to_file_contents(), "ok 2\nwarn 1\ncrit 1\n");
        assert_eq!(summary.worst(), Tier::Crit);
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let thresholds = Thresholds::default().with(Metric::PullRequests, ThresholdPair::new(5, 10));
        assert_eq!(thresholds.classify(Metric::PullRequests, 3), Tier::Ok);
        assert_eq!(thresholds.classify(Metric::PullRequests, 10), Tier::Crit);
    }
}
