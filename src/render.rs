//! Flat, colour-coded terminal view of one cycle.

use crate::metrics::{Metric, MetricSet, Snapshot};
use crate::thresholds::{Thresholds, Tier};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use std::collections::HashSet;
use std::io::{self, Write};

pub const OK_BG: &str = "\x1b[42m";
pub const WARN_BG: &str = "\x1b[43m";
pub const CRIT_BG: &str = "\x1b[41m";
pub const RESET: &str = "\x1b[0m";

pub const LABEL_WIDTH: usize = 30;
pub const VALUE_WIDTH: usize = 4;
pub const STALE_MARKER: &str = " (stale)";

pub const BANNER: &str = "\
┌──────────────────────────────────────────┐
│             Bird's Eye View              │▒
└──────────────────────────────────────────┘▒
  ▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒

";

pub fn background(tier: Tier) -> &'static str {
    match tier {
        Tier::Ok => OK_BG,
        Tier::Warn => WARN_BG,
        Tier::Crit => CRIT_BG,
    }
}

/// `"<label>:"` padded to the label column, then the coloured, right-aligned count.
pub fn metric_line(label: &str, value: u64, tier: Tier, stale: bool) -> String {
    let mut line = format!(
        "{:<lw$}{}{:>vw$} {}",
        format!("{}:", label),
        background(tier),
        value,
        RESET,
        lw = LABEL_WIDTH,
        vw = VALUE_WIDTH,
    );
    if stale {
        line.push_str(STALE_MARKER);
    }
    line
}

/// Whole frame: banner plus one line per tracked metric, in tracking order.
pub fn render_frame(
    snapshot: &Snapshot,
    thresholds: &Thresholds,
    tracked: &MetricSet,
    degraded: &HashSet<Metric>,
) -> String {
    let mut frame = String::from(BANNER);
    for metric in tracked.iter() {
        let value = snapshot.get(metric);
        frame.push_str(&metric_line(
            metric.label(),
            value,
            thresholds.classify(metric, value),
            degraded.contains(&metric),
        ));
        frame.push('\n');
    }
    frame
}

/// Where frames go.
pub struct Terminal<W: Write> {
    out: W,
    clear: bool,
}

impl Terminal<io::Stdout> {
    pub fn stdout(clear: bool) -> Self {
        Self::new(io::stdout(), clear)
    }
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W, clear: bool) -> Self {
        Self { out, clear }
    }

    pub fn draw(&mut self, frame: &str) -> io::Result<()> {
        if self.clear {
            execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::ThresholdPair;

    #[test]
    fn test_crit_value_gets_crit_background() {
        let thresholds = Thresholds::default().with(Metric::InProgress, ThresholdPair::new(2, 3));
        let tier = thresholds.classify(Metric::InProgress, 3);
        assert_eq!(tier, Tier::Crit);
        let line = metric_line("Stories in progress", 3, tier, false);
        assert_eq!(
            line,
            format!("{:<30}\x1b[41m   3 \x1b[0m", "Stories in progress:")
        );
    }

    #[test]
    fn test_backgrounds_are_distinct() {
        let codes: HashSet<_> = [Tier::Ok, Tier::Warn, Tier::Crit]
            .into_iter()
            .map(background)
            .collect();
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn test_stale_marker_follows_reset() {
        let line = metric_line("Dynos down", 0, Tier::Ok, true);
        assert!(line.ends_with("\x1b[0m (stale)"));
        assert!(line.contains("\x1b[42m   0 "));
    }

    #[test]
    fn test_frame_follows_tracking_order() {
        let snap: Snapshot = [(Metric::DynosDown, 1)].into_iter().collect();
        let tracked = MetricSet::new([Metric::DynosDown, Metric::PullRequests]);
        let frame = render_frame(&snap, &Thresholds::default(), &tracked, &HashSet::new());
        assert!(frame.starts_with(BANNER));
        let body: Vec<&str> = frame[BANNER.len()..].lines().collect();
        assert_eq!(body.len(), 2);
        assert!(body[0].starts_with("Dynos down:"));
        assert!(body[0].contains(CRIT_BG));
        assert!(body[1].starts_with("Pull requests:"));
        assert!(body[1].contains(OK_BG));
    }

    #[test]
    fn test_terminal_without_clear_writes_frame_verbatim() {
        let mut term = Terminal::new(Vec::new(), false);
        term.draw("hello\n").unwrap();
        assert_eq!(term.into_inner(), b"hello\n");
    }
}
