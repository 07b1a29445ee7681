#![allow(unused)]
use std::cell::RefCell;
use std::time::Duration;

#[derive(Default, Clone)]
pub struct TimingStats {
    pub assembly_times: Vec<Duration>,
    pub linear_solve_times: Vec<Duration>,
    pub total_time: Duration,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "timing")]
    pub fn print_summary(&self) {
        if self.assembly_times.is_empty() && self.linear_solve_times.is_empty() {
            return;
        }

        let total_assembly: Duration = self.assembly_times.iter().sum();
        let total_linear: Duration = self.linear_solve_times.iter().sum();
        let overhead = self.total_time.saturating_sub(total_assembly + total_linear);
        let avg_ms = |total: Duration, n: usize| total.as_secs_f64() * 1000.0 / n.max(1) as f64;

        log::info!("{}", "=".repeat(60));
        log::info!("{:^60}", "SOLVER TIMING SUMMARY");
        log::info!("{}", "=".repeat(60));
        log::info!(
            "Total solver time:             {:.3}s",
            self.total_time.as_secs_f64()
        );
        log::info!(
            "  Assembly:                  {:>9.3}ms  (avg: {:>9.3}ms)",
            total_assembly.as_secs_f64() * 1000.0,
            avg_ms(total_assembly, self.assembly_times.len())
        );
        log::info!(
            "  Linear solve:              {:>9.3}ms  (avg: {:>9.3}ms)",
            total_linear.as_secs_f64() * 1000.0,
            avg_ms(total_linear, self.linear_solve_times.len())
        );
        log::info!(
            "Overhead/Other:                {:>9.3}ms",
            overhead.as_secs_f64() * 1000.0
        );
        log::info!(
            "Calls:                         {} assembly, {} lin.solve",
            self.assembly_times.len(),
            self.linear_solve_times.len()
        );
    }

    #[cfg(not(feature = "timing"))]
    pub fn print_summary(&self) {}
}

#[cfg(feature = "timing")]
thread_local! {
    static TIMING_STATS: RefCell<TimingStats> = RefCell::new(TimingStats::new());
}

#[cfg(feature = "timing")]
pub fn reset_timing() {
    TIMING_STATS.with(|stats| {
        *stats.borrow_mut() = TimingStats::new();
    });
}

#[cfg(not(feature = "timing"))]
pub fn reset_timing() {}

#[cfg(feature = "timing")]
pub fn record_assembly<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    TIMING_STATS.with(|stats| {
        stats.borrow_mut().assembly_times.push(elapsed);
    });
    result
}

#[cfg(not(feature = "timing"))]
pub fn record_assembly<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(feature = "timing")]
pub fn record_linear_solve<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    TIMING_STATS.with(|stats| {
        stats.borrow_mut().linear_solve_times.push(elapsed);
    });
    result
}

#[cfg(not(feature = "timing"))]
pub fn record_linear_solve<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(feature = "timing")]
pub fn finalize_timing(total_time: Duration) -> TimingStats {
    TIMING_STATS.with(|stats| {
        let mut s = stats.borrow_mut();
        s.total_time = total_time;
        s.clone()
    })
}

#[cfg(not(feature = "timing"))]
pub fn finalize_timing(_total_time: Duration) -> TimingStats {
    TimingStats::new()
}

#[cfg(feature = "timing")]
pub fn finalize_and_print(total_time: Duration) {
    finalize_timing(total_time).print_summary();
}

#[cfg(not(feature = "timing"))]
pub fn finalize_and_print(_total_time: Duration) {}
