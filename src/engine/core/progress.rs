//! Per-job progress tracking over ffmpeg's stderr stream.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("invalid time regex")
});
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("invalid duration regex")
});

/// Percent reported while the encoder is still running.
pub const MAX_RUNNING_PERCENT: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Unregistered,
    Registered,
    Completed,
}

/// Process registration metadata passed along with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    pub percent: u8,
    pub paused: bool,
    pub killed: bool,
}

impl ProgressReport {
    fn at(percent: u8) -> Self {
        Self {
            percent,
            paused: false,
            killed: false,
        }
    }
}

/// Host-side receiver for progress updates
pub trait ProgressSink {
    fn report(&mut self, report: ProgressReport);
}

impl<F: FnMut(ProgressReport)> ProgressSink for F {
    fn report(&mut self, report: ProgressReport) {
        self(report)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressState {
    pub total_duration_seconds: f64,
    pub current_percent: u8,
    pub phase: ProgressPhase,
    pub pid: Option<u32>,
}

/// Turns ffmpeg output lines into a non-decreasing percentage.
///
/// One tracker per job. `time=` values that go backwards (two-pass runs,
/// duplicated lines) never lower the reported percent.
pub struct ProgressTracker {
    state: ProgressState,
    sink: Option<Box<dyn ProgressSink + Send>>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("state", &self.state)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl ProgressTracker {
    /// `total_duration_seconds` of 0 means unknown; a `Duration:` header
    /// line from ffmpeg fills it in later.
    pub fn new(total_duration_seconds: f64) -> Self {
        let total = if total_duration_seconds.is_finite() && total_duration_seconds > 0.0 {
            total_duration_seconds
        } else {
            0.0
        };
        Self {
            state: ProgressState {
                total_duration_seconds: total,
                current_percent: 0,
                phase: ProgressPhase::Unregistered,
                pid: None,
            },
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: impl ProgressSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn percent(&self) -> u8 {
        self.state.current_percent
    }

    /// Feed one output line. The first call that carries process info
    /// registers the tracker and reports 0.
    pub fn parse(&mut self, line: &str, process: Option<ProcessInfo>) -> ProgressReport {
        let report = match self.state.phase {
            ProgressPhase::Completed => ProgressReport::at(100),
            ProgressPhase::Unregistered => {
                if let Some(info) = process {
                    self.state.phase = ProgressPhase::Registered;
                    self.state.pid = Some(info.pid);
                    self.state.current_percent = 0;
                }
                self.observe_duration(line);
                ProgressReport::at(self.state.current_percent)
            }
            ProgressPhase::Registered => {
                self.observe_duration(line);
                if let Some(elapsed) = parse_timestamp(&TIME_RE, line) {
                    let pct = percent_for(elapsed, self.state.total_duration_seconds);
                    if pct > self.state.current_percent {
                        self.state.current_percent = pct;
                    }
                }
                ProgressReport::at(self.state.current_percent)
            }
        };
        self.emit(report);
        report
    }

    /// Completion signal from the host. Always reports exactly 100.
    pub fn finalize(&mut self) -> ProgressReport {
        self.state.phase = ProgressPhase::Completed;
        self.state.current_percent = 100;
        let report = ProgressReport::at(100);
        self.emit(report);
        report
    }

    fn observe_duration(&mut self, line: &str) {
        if self.state.total_duration_seconds > 0.0 {
            return;
        }
        if let Some(total) = parse_timestamp(&DURATION_RE, line) {
            if total > 0.0 {
                self.state.total_duration_seconds = total;
            }
        }
    }

    fn emit(&mut self, report: ProgressReport) {
        if let Some(sink) = self.sink.as_mut() {
            sink.report(report);
        }
    }
}

fn parse_timestamp(re: &Regex, line: &str) -> Option<f64> {
    let caps = re.captures(line)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// `floor(min(99, 100 * elapsed / total))`; 0 while the total is unknown.
pub fn percent_for(elapsed: f64, total: f64) -> u8 {
    if total <= 0.0 || !elapsed.is_finite() || elapsed <= 0.0 {
        return 0;
    }
    let pct = (100.0 * elapsed / total).min(MAX_RUNNING_PERCENT as f64);
    pct.floor() as u8
}
