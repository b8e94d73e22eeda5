//! [`PeriodicSampler`] – keep-alive loop with a fixed-cadence sampler.
//!
//! # Algorithm
//!
//! Every iteration first checks the deadline, then calls the keep-alive
//! closure unconditionally (the command it re-issues expires on its own).
//! When at least `interval` has passed since the previous sample (or since
//! the start), the [`Sampler`] runs and its own execution time is measured.
//! A `true` sample ends the loop at once and that execution time is reported
//! as the overshoot: the base kept moving while the sampler was busy.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use spotter_scan::clock::ManualClock;
//! use spotter_scan::scheduler::PeriodicSampler;
//!
//! let clock = ManualClock::new();
//! let sampler = PeriodicSampler::new(Duration::from_millis(100))
//!     .with_pace(Duration::from_millis(10));
//!
//! let mut calls = 0;
//! let mut detector = || -> Result<bool, spotter_types::SpotterError> {
//!     calls += 1;
//!     Ok(calls == 2)
//! };
//! let report = sampler
//!     .run(&clock, Duration::from_secs(1), || Ok(()), &mut detector)
//!     .unwrap();
//!
//! assert!(report.stopped);
//! assert_eq!(report.invocations, 2);
//! ```

use std::time::Duration;

use spotter_types::SpotterError;
use tracing::{debug, trace};

use crate::clock::Clock;

// ─────────────────────────────────────────────────────────────────────────────
// Sampler
// ─────────────────────────────────────────────────────────────────────────────

/// A detection function sampled during a scan.
///
/// Returns `Ok(true)` to ask the scan to stop.  May block for as long as it
/// needs; the time is measured, not hidden.
pub trait Sampler {
    fn sample(&mut self) -> Result<bool, SpotterError>;
}

impl<F> Sampler for F
where
    F: FnMut() -> Result<bool, SpotterError>,
{
    fn sample(&mut self) -> Result<bool, SpotterError> {
        self()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one [`PeriodicSampler::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerReport {
    /// The sampler asked to stop before the deadline.
    pub stopped: bool,
    /// Execution time of the triggering sample; zero unless `stopped`.
    pub overshoot: Duration,
    /// Number of sampler invocations.
    pub invocations: u32,
    /// Time spent in the loop.
    pub elapsed: Duration,
}

// ─────────────────────────────────────────────────────────────────────────────
// PeriodicSampler
// ─────────────────────────────────────────────────────────────────────────────

/// Runs a keep-alive action continuously and a [`Sampler`] every `interval`.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicSampler {
    interval: Duration,
    pace: Duration,
}

impl PeriodicSampler {
    /// Sample every `interval`, spinning without pause in between.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pace: Duration::ZERO,
        }
    }

    /// Yield up to `pace` between iterations where no sample is due.
    ///
    /// The yield is cut short at the next sample time and at the deadline.
    /// Keep it well below the lifetime of the re-issued command.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Loop until the sampler returns `true` or `deadline` has elapsed on
    /// `clock`.
    ///
    /// # Errors
    ///
    /// * A failing `keep_alive` aborts the loop with its error unchanged.
    /// * A failing sampler aborts the loop with
    ///   [`SpotterError::SamplerFailure`].
    ///
    /// In both cases the caller is responsible for halting whatever
    /// `keep_alive` kept going.
    pub fn run<C, K, S>(
        &self,
        clock: &C,
        deadline: Duration,
        mut keep_alive: K,
        sampler: &mut S,
    ) -> Result<SamplerReport, SpotterError>
    where
        C: Clock + ?Sized,
        K: FnMut() -> Result<(), SpotterError>,
        S: Sampler + ?Sized,
    {
        let start = clock.now();
        let mut last_sample = start;
        let mut invocations = 0u32;

        loop {
            let elapsed = clock.now().saturating_sub(start);
            if elapsed >= deadline {
                debug!(invocations, ?elapsed, "deadline reached without a stop request");
                return Ok(SamplerReport {
                    stopped: false,
                    overshoot: Duration::ZERO,
                    invocations,
                    elapsed,
                });
            }

            keep_alive()?;

            let now = clock.now();
            let since_sample = now.saturating_sub(last_sample);
            if since_sample >= self.interval {
                last_sample = now;
                invocations += 1;
                let began = clock.now();
                let stop = sampler.sample().map_err(into_sampler_failure)?;
                let took = clock.now().saturating_sub(began);
                trace!(invocation = invocations, ?took, stop, "sampled");
                if stop {
                    return Ok(SamplerReport {
                        stopped: true,
                        overshoot: took,
                        invocations,
                        elapsed: clock.now().saturating_sub(start),
                    });
                }
            } else if !self.pace.is_zero() {
                let until_sample = self.interval - since_sample;
                let until_deadline = deadline.saturating_sub(now.saturating_sub(start));
                clock.sleep(self.pace.min(until_sample).min(until_deadline));
            }
        }
    }
}

fn into_sampler_failure(err: SpotterError) -> SpotterError {
    match err {
        SpotterError::SamplerFailure(_) => err,
        other => SpotterError::SamplerFailure(other.to_string()),
    }
}
