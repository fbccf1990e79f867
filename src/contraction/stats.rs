//! Per-worker contraction statistics.

use std::sync::Mutex;

/// Guards stdout so worker stat rows don't interleave.
static KEY: Mutex<()> = Mutex::new(());

/// Why a shortcut was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutReason {
    /// The probe proved the two-edge path is the unique optimum, or the
    /// optimum runs through another node selected for contraction.
    ShortestPath,
    /// The LP reached a fixed point with the witness tying the shortcut.
    RepeatingConfig,
    /// The LP reached a fixed point without a tie; emitted conservatively.
    UnknownReason,
}

/// Counters owned by one worker; the row is printed when the worker exits.
#[derive(Debug)]
pub struct StatsCollector {
    active: bool,
    short_count: usize,
    same_count: usize,
    unknown: usize,
    lp_max: usize,
    const_max: usize,
}

impl StatsCollector {
    pub fn new(active: bool) -> Self {
        StatsCollector {
            active,
            short_count: 0,
            same_count: 0,
            unknown: 0,
            lp_max: 0,
            const_max: 0,
        }
    }

    pub fn print_header() {
        println!("| \t\t Reasons for shortcut creation \t\t | \t\t  Max values \t\t|");
        println!("short \t\t repeating \t\t unknown \t\t lp calls \t max constraints");
    }

    pub fn count_shortcut(&mut self, reason: ShortcutReason) {
        match reason {
            ShortcutReason::ShortestPath => self.short_count += 1,
            ShortcutReason::RepeatingConfig => self.same_count += 1,
            ShortcutReason::UnknownReason => self.unknown += 1,
        }
    }

    pub fn record_max_values(&mut self, lp_calls: usize, constraints: usize) {
        self.lp_max = self.lp_max.max(lp_calls);
        self.const_max = self.const_max.max(constraints);
    }
}

#[cfg(test)]
impl StatsCollector {
    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        (self.short_count, self.same_count, self.unknown)
    }
}

impl Drop for StatsCollector {
    fn drop(&mut self) {
        if !self.active || self.short_count == 0 {
            return;
        }
        let _guard = KEY.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        println!(
            "{}\t\t{}\t\t\t{}\t\t\t{}\t\t{}",
            self.short_count, self.same_count, self.unknown, self.lp_max, self.const_max
        );
    }
}
