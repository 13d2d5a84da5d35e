use std::time::{Duration, Instant};

use log::info;

/// Cumulative dispatch counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PumpStats {
    pub cycles: u64,
    /// Raw events drained from the binding.
    pub events: u64,
    /// Events handed to a live window.
    pub dispatched: u64,
    /// Connection-level or unroutable events.
    pub dropped: u64,
    /// Events addressed to a window that is gone.
    pub orphaned: u64,
    /// Registry entries removed because their window was dropped.
    pub pruned: u64,
    /// Deepest `pump()` nesting observed.
    pub max_depth: u32,
}

/// Result of one dispatch cycle, fed into [`Telemetry::record_cycle`].
#[derive(Debug, Copy, Clone, Default)]
pub struct CycleReport {
    pub events: usize,
    pub dispatched: usize,
    pub dropped: usize,
    pub orphaned: usize,
    pub pruned: usize,
    pub depth: u32,
}

/// Pump counters plus an optional periodic log line.
pub struct Telemetry {
    stats: PumpStats,

    log_enabled: bool,
    log_period: Duration,
    last_log: Instant,
    last_logged: PumpStats,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            stats: PumpStats::default(),
            log_enabled: false,
            log_period: Duration::from_secs(5),
            last_log: Instant::now(),
            last_logged: PumpStats::default(),
        }
    }

    pub fn configure_logging(&mut self, enabled: bool, period_sec: f32) {
        self.log_enabled = enabled;
        // Too large for a Duration (inf included) means "never".
        self.log_period = Duration::try_from_secs_f32(period_sec.max(0.25)).unwrap_or(Duration::MAX);
    }

    pub fn record_cycle(&mut self, report: &CycleReport) {
        let s = &mut self.stats;
        s.cycles += 1;
        s.events += report.events as u64;
        s.dispatched += report.dispatched as u64;
        s.dropped += report.dropped as u64;
        s.orphaned += report.orphaned as u64;
        s.pruned += report.pruned as u64;
        s.max_depth = s.max_depth.max(report.depth);

        if !self.log_enabled || self.last_log.elapsed() < self.log_period {
            return;
        }

        let prev = self.last_logged;
        let s = self.stats;
        info!(
            target: "display",
            "pump.stats cycles={} events={} dispatched={} dropped={} orphaned={} pruned={} max_depth={}",
            s.cycles - prev.cycles,
            s.events - prev.events,
            s.dispatched - prev.dispatched,
            s.dropped - prev.dropped,
            s.orphaned - prev.orphaned,
            s.pruned - prev.pruned,
            s.max_depth
        );
        self.last_logged = s;
        self.last_log = Instant::now();
    }

    #[inline]
    pub fn stats(&self) -> PumpStats {
        self.stats
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
