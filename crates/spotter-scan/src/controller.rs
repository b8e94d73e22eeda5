//! [`RotationController`] – bounded rotational scan of a mobile base.
//!
//! A scan spins the base in place for `turn_count` turns at
//! `rotation_rate`, sampling a detector at a fixed cadence via
//! [`PeriodicSampler`].  Velocity commands expire after `command_ttl`, so the
//! controller re-issues one on every loop iteration.
//!
//! # Stop guarantee
//!
//! Once the base has been commanded to move, exactly one stop command is
//! issued before [`RotationController::scan`] returns, on every path:
//! deadline, detection, sampler failure, or a rejected velocity command.
//! A sampler that panics still gets the base stopped while unwinding.
//!
//! # Overshoot
//!
//! The base keeps turning while the triggering sample is evaluated.
//! [`RotationController::compensate`] turns back at the same rate for that
//! long, so the final heading matches the moment the sample was taken.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use spotter_hal::SimBase;
//! use spotter_scan::{ManualClock, RotationController};
//! use spotter_types::{RotationRequest, SpotterError};
//!
//! let clock = ManualClock::new();
//! let controller = RotationController::with_clock(clock.clone())
//!     .pace(Duration::from_millis(20));
//! let mut base = SimBase::new();
//! let log = base.log();
//!
//! let mut samples = 0;
//! let mut detector = || -> Result<bool, SpotterError> {
//!     samples += 1;
//!     Ok(samples == 3)
//! };
//! let request = RotationRequest::new(0.5, 1.0, 200);
//! let result = controller.scan(&mut base, &mut detector, &request).unwrap();
//!
//! assert!(result.stopped_early);
//! assert_eq!(log.stop_count(), 1);
//! ```

use std::fmt;
use std::time::Duration;

use spotter_hal::MobileBase;
use spotter_types::{RotationRequest, ScanResult, SpotterError, VelocityCommand};
use tracing::{debug, error, info, info_span, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::scheduler::{PeriodicSampler, Sampler};

/// Lifetime of each re-issued rotation command.
pub const DEFAULT_COMMAND_TTL: Duration = Duration::from_secs(2);

/// Lifetime of the terminal stop command.
pub const DEFAULT_STOP_TTL: Duration = Duration::from_millis(100);

// ─────────────────────────────────────────────────────────────────────────────
// Scan phases
// ─────────────────────────────────────────────────────────────────────────────

/// Phases a single scan passes through; used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Rotating,
    SampleTriggeredStop,
    DeadlineStop,
    Failed,
    Stopped,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Rotating => "rotating",
            ScanPhase::SampleTriggeredStop => "sample_triggered_stop",
            ScanPhase::DeadlineStop => "deadline_stop",
            ScanPhase::Failed => "failed",
            ScanPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RotationController
// ─────────────────────────────────────────────────────────────────────────────

/// Runs bounded rotational scans against a [`MobileBase`].
#[derive(Debug, Clone)]
pub struct RotationController<C: Clock = MonotonicClock> {
    clock: C,
    command_ttl: Duration,
    stop_ttl: Duration,
    pace: Duration,
}

impl RotationController<MonotonicClock> {
    /// Controller on the monotonic wall clock with default timings.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for RotationController<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RotationController<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            command_ttl: DEFAULT_COMMAND_TTL,
            stop_ttl: DEFAULT_STOP_TTL,
            pace: Duration::ZERO,
        }
    }

    /// Lifetime attached to every re-issued rotation command.
    pub fn command_ttl(mut self, ttl: Duration) -> Self {
        self.command_ttl = ttl;
        self
    }

    /// Lifetime attached to the terminal stop command.
    pub fn stop_ttl(mut self, ttl: Duration) -> Self {
        self.stop_ttl = ttl;
        self
    }

    /// Maximum yield between re-issues; see [`PeriodicSampler::with_pace`].
    pub fn pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Spin `base` as described by `request`, sampling `sampler` along the
    /// way.
    ///
    /// # Errors
    ///
    /// * [`SpotterError::InvalidParameter`] for an invalid request; nothing
    ///   is sent to the base.
    /// * [`SpotterError::SamplerFailure`] if the sampler fails.
    /// * [`SpotterError::HardwareFault`] if the base rejects a command.
    ///
    /// Sampler and hardware errors are returned only after the stop command
    /// has been attempted.
    pub fn scan<B, S>(
        &self,
        base: &mut B,
        sampler: &mut S,
        request: &RotationRequest,
    ) -> Result<ScanResult, SpotterError>
    where
        B: MobileBase + ?Sized,
        S: Sampler + ?Sized,
    {
        request.validate()?;

        let duration = request.duration();
        let span = info_span!(
            "scan",
            base = base.id(),
            rate = request.rotation_rate,
            turns = request.turn_count,
            interval_ms = request.sampling_interval_ms,
        );
        let _enter = span.enter();
        debug!(phase = %ScanPhase::Idle, "scan requested");
        info!(
            phase = %ScanPhase::Rotating,
            duration_s = duration.as_secs_f64(),
            "rotating"
        );

        let rotate = VelocityCommand::rotate(request.rotation_rate, self.command_ttl.as_secs_f64());
        let mut guard = StopGuard::new(base, self.stop_ttl);
        let outcome = PeriodicSampler::new(request.sampling_interval())
            .with_pace(self.pace)
            .run(&self.clock, duration, || guard.base.send_velocity(rotate), sampler);

        let stop = guard.finish();

        match (outcome, stop) {
            (Ok(report), Ok(())) => {
                let phase = if report.stopped {
                    ScanPhase::SampleTriggeredStop
                } else {
                    ScanPhase::DeadlineStop
                };
                info!(
                    %phase,
                    invocations = report.invocations,
                    elapsed_s = report.elapsed.as_secs_f64(),
                    overshoot_s = report.overshoot.as_secs_f64(),
                    "scan finished"
                );
                debug!(phase = %ScanPhase::Stopped, "base halted");
                Ok(ScanResult {
                    stopped_early: report.stopped,
                    overshoot_seconds: report.overshoot.as_secs_f64(),
                })
            }
            (Ok(_), Err(stop_err)) => {
                error!(error = %stop_err, "stop command rejected");
                Err(stop_err)
            }
            (Err(err), Ok(())) => {
                warn!(phase = %ScanPhase::Failed, error = %err, "scan aborted");
                debug!(phase = %ScanPhase::Stopped, "base halted");
                Err(err)
            }
            (Err(err), Err(stop_err)) => {
                error!(
                    phase = %ScanPhase::Failed,
                    error = %err,
                    stop_error = %stop_err,
                    "scan aborted and stop command rejected"
                );
                Err(err)
            }
        }
    }

    /// Undo the overshoot of a scan that stopped early by turning back at the
    /// scan's rate for `overshoot_seconds`.
    ///
    /// Returns `true` if a corrective command was sent.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::HardwareFault`] if the base rejects the
    /// command.
    pub fn compensate<B>(
        &self,
        base: &mut B,
        request: &RotationRequest,
        result: &ScanResult,
    ) -> Result<bool, SpotterError>
    where
        B: MobileBase + ?Sized,
    {
        match result.corrective_command(request.rotation_rate) {
            Some(command) => {
                debug!(
                    v_rot = command.v_rot,
                    duration_s = command.duration_s,
                    "compensating overshoot"
                );
                base.send_velocity(command)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Halts the base when dropped, so a sampler that unwinds mid-scan still
/// leaves it stopped. [`finish`][Self::finish] sends the stop on the normal
/// path and disarms the drop.
struct StopGuard<'a, B: MobileBase + ?Sized> {
    base: &'a mut B,
    ttl: Duration,
    armed: bool,
}

impl<'a, B: MobileBase + ?Sized> StopGuard<'a, B> {
    fn new(base: &'a mut B, ttl: Duration) -> Self {
        Self {
            base,
            ttl,
            armed: true,
        }
    }

    fn finish(mut self) -> Result<(), SpotterError> {
        self.armed = false;
        self.base.send_velocity(VelocityCommand::stop(self.ttl.as_secs_f64()))
    }
}

impl<B: MobileBase + ?Sized> Drop for StopGuard<'_, B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.base.send_velocity(VelocityCommand::stop(self.ttl.as_secs_f64())) {
            Ok(()) => warn!(phase = %ScanPhase::Failed, "scan unwound; base halted"),
            Err(e) => error!(error = %e, "scan unwound and stop command rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use spotter_types::{BaseCommand, HeadPose};

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    /// Base that advances the clock by 1 ms per velocity command, like a
    /// network round-trip would.
    struct TimedBase {
        clock: ManualClock,
        commands: Vec<VelocityCommand>,
        fail_rotation_after: Option<usize>,
        fail_stop: bool,
    }

    impl TimedBase {
        fn new(clock: &ManualClock) -> Self {
            Self {
                clock: clock.clone(),
                commands: Vec::new(),
                fail_rotation_after: None,
                fail_stop: false,
            }
        }

        fn stops(&self) -> usize {
            self.commands.iter().filter(|c| c.is_stop()).count()
        }
    }

    impl MobileBase for TimedBase {
        fn id(&self) -> &str {
            "timed"
        }

        fn send_velocity(&mut self, command: VelocityCommand) -> Result<(), SpotterError> {
            self.clock.advance(Duration::from_millis(1));
            if command.is_stop() && self.fail_stop {
                return Err(SpotterError::hardware("timed", "stop rejected"));
            }
            if !command.is_stop()
                && self
                    .fail_rotation_after
                    .is_some_and(|n| self.commands.len() >= n)
            {
                return Err(SpotterError::hardware("timed", "lease revoked"));
            }
            self.commands.push(command);
            Ok(())
        }

        fn move_to_goal(&mut self, _x: f64, _y: f64) -> Result<(), SpotterError> {
            Ok(())
        }

        fn move_head(&mut self, _pose: &HeadPose) -> Result<(), SpotterError> {
            Ok(())
        }
    }

    /// Detector that blocks for `cost` and fires on its `fire_on`-th call.
    struct SlowDetector {
        clock: ManualClock,
        cost: Duration,
        fire_on: Option<u32>,
        calls: u32,
    }

    impl SlowDetector {
        fn new(clock: &ManualClock, cost: Duration, fire_on: Option<u32>) -> Self {
            Self {
                clock: clock.clone(),
                cost,
                fire_on,
                calls: 0,
            }
        }
    }

    impl Sampler for SlowDetector {
        fn sample(&mut self) -> Result<bool, SpotterError> {
            self.calls += 1;
            self.clock.advance(self.cost);
            Ok(self.fire_on == Some(self.calls))
        }
    }

    fn controller(clock: &ManualClock) -> RotationController<ManualClock> {
        RotationController::with_clock(clock.clone())
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[test]
    fn detection_on_third_sample_reports_its_latency() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        let mut detector = SlowDetector::new(&clock, Duration::from_millis(50), Some(3));
        let request = RotationRequest::new(-0.5, 2.0, 200);

        let result = controller(&clock)
            .scan(&mut base, &mut detector, &request)
            .unwrap();

        assert!(result.stopped_early);
        assert!((result.overshoot_seconds - 0.05).abs() < 1e-9);
        assert_eq!(detector.calls, 3);
        assert_eq!(base.stops(), 1);
        // The stop is the very last command: no motion after detection.
        assert!(base.commands.last().unwrap().is_stop());
        assert!(base.commands[..base.commands.len() - 1]
            .iter()
            .all(|c| (c.v_rot + 0.5).abs() < f64::EPSILON));
    }

    #[test]
    fn full_sweep_without_detection() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        let mut detector = SlowDetector::new(&clock, Duration::ZERO, None);
        let request = RotationRequest::new(-0.5, 2.0, 200);

        let result = controller(&clock)
            .scan(&mut base, &mut detector, &request)
            .unwrap();

        assert!(!result.stopped_early);
        assert_eq!(result.overshoot_seconds, 0.0);
        assert_eq!(base.stops(), 1);
        let elapsed = clock.now().as_secs_f64();
        assert!((elapsed - 25.133).abs() < 0.01, "ran for {elapsed} s");
        let ceiling = (request.duration().as_secs_f64() / 0.2).ceil() as u32;
        assert!(detector.calls <= ceiling);
    }

    #[test]
    fn zero_rate_is_rejected_before_any_command() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        let mut detector = SlowDetector::new(&clock, Duration::ZERO, Some(1));
        let request = RotationRequest::new(0.0, 2.0, 200);

        let err = controller(&clock)
            .scan(&mut base, &mut detector, &request)
            .unwrap_err();

        assert!(matches!(err, SpotterError::InvalidParameter(_)));
        assert!(base.commands.is_empty());
        assert_eq!(detector.calls, 0);
    }

    #[test]
    fn overlong_scan_is_rejected_before_any_command() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        let mut detector = SlowDetector::new(&clock, Duration::ZERO, None);
        let request = RotationRequest::new(1e-300, 1.0, 200);

        let err = controller(&clock)
            .scan(&mut base, &mut detector, &request)
            .unwrap_err();

        assert!(matches!(err, SpotterError::InvalidParameter(_)));
        assert!(base.commands.is_empty());
        assert_eq!(detector.calls, 0);
    }

    #[test]
    fn invalid_turns_and_interval_are_rejected() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        let mut never = || -> Result<bool, SpotterError> { Ok(false) };
        for request in [
            RotationRequest::new(0.5, 0.0, 200),
            RotationRequest::new(0.5, 1.0, 0),
        ] {
            let result = controller(&clock).scan(&mut base, &mut never, &request);
            assert!(matches!(result, Err(SpotterError::InvalidParameter(_))));
        }
        assert!(base.commands.is_empty());
    }

    #[test]
    fn sampler_failure_still_stops_the_base() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        let mut broken = || -> Result<bool, SpotterError> {
            Err(SpotterError::SamplerFailure("classifier crashed".into()))
        };
        let request = RotationRequest::new(0.15, 2.0, 200);

        let err = controller(&clock)
            .scan(&mut base, &mut broken, &request)
            .unwrap_err();

        assert!(matches!(err, SpotterError::SamplerFailure(_)));
        assert_eq!(base.stops(), 1);
        assert!(base.commands.last().unwrap().is_stop());
    }

    #[test]
    fn panicking_sampler_still_stops_the_base() {
        let clock = ManualClock::new();
        let controller = controller(&clock).pace(Duration::from_millis(5));
        let mut base = spotter_hal::SimBase::new();
        let log = base.log();
        let mut calls = 0;
        let mut crashing = || -> Result<bool, SpotterError> {
            calls += 1;
            panic!("classifier crashed");
        };
        let request = RotationRequest::new(0.5, 1.0, 10);

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            controller.scan(&mut base, &mut crashing, &request)
        }));

        assert!(unwound.is_err());
        assert_eq!(calls, 1);
        assert_eq!(log.stop_count(), 1);
        assert!(log.velocities().last().unwrap().is_stop());
    }

    #[test]
    fn rejected_rotation_still_stops_the_base() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        base.fail_rotation_after = Some(10);
        let mut detector = SlowDetector::new(&clock, Duration::ZERO, None);
        let request = RotationRequest::new(0.5, 1.0, 200);

        let err = controller(&clock)
            .scan(&mut base, &mut detector, &request)
            .unwrap_err();

        assert!(matches!(err, SpotterError::HardwareFault { .. }));
        assert_eq!(base.commands.len(), 11);
        assert_eq!(base.stops(), 1);
    }

    #[test]
    fn loop_error_wins_over_stop_error() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        base.fail_stop = true;
        let mut broken = || -> Result<bool, SpotterError> {
            Err(SpotterError::SamplerFailure("camera gone".into()))
        };
        let request = RotationRequest::new(0.5, 1.0, 200);

        let err = controller(&clock)
            .scan(&mut base, &mut broken, &request)
            .unwrap_err();
        assert!(matches!(err, SpotterError::SamplerFailure(_)));
    }

    #[test]
    fn stop_error_is_reported_after_clean_sweep() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        base.fail_stop = true;
        let mut detector = SlowDetector::new(&clock, Duration::ZERO, Some(1));
        let request = RotationRequest::new(0.5, 1.0, 200);

        let err = controller(&clock)
            .scan(&mut base, &mut detector, &request)
            .unwrap_err();
        assert!(matches!(err, SpotterError::HardwareFault { .. }));
    }

    #[test]
    fn rotation_commands_carry_the_configured_ttl() {
        let clock = ManualClock::new();
        let mut base = TimedBase::new(&clock);
        let mut detector = SlowDetector::new(&clock, Duration::ZERO, Some(1));
        let request = RotationRequest::new(0.5, 1.0, 100);

        controller(&clock)
            .command_ttl(Duration::from_millis(500))
            .stop_ttl(Duration::from_millis(250))
            .scan(&mut base, &mut detector, &request)
            .unwrap();

        let (stop, rotations) = base.commands.split_last().unwrap();
        assert!(rotations.iter().all(|c| (c.duration_s - 0.5).abs() < 1e-9));
        assert!((stop.duration_s - 0.25).abs() < 1e-9);
    }

    #[test]
    fn compensation_turns_back_for_the_overshoot() {
        let clock = ManualClock::new();
        let mut base = spotter_hal::SimBase::new();
        let log = base.log();
        let request = RotationRequest::new(0.15, 2.0, 200);
        let result = ScanResult {
            stopped_early: true,
            overshoot_seconds: 0.08,
        };

        let sent = controller(&clock)
            .compensate(&mut base, &request, &result)
            .unwrap();

        assert!(sent);
        match log.last() {
            Some(BaseCommand::Velocity(v)) => {
                assert!((v.v_rot + 0.15).abs() < f64::EPSILON);
                assert!((v.duration_s - 0.08).abs() < f64::EPSILON);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_compensation_after_full_sweep() {
        let clock = ManualClock::new();
        let mut base = spotter_hal::SimBase::new();
        let log = base.log();
        let request = RotationRequest::new(0.15, 2.0, 200);

        let sent = controller(&clock)
            .compensate(&mut base, &request, &ScanResult::default())
            .unwrap();

        assert!(!sent);
        assert!(log.is_empty());
    }

    #[test]
    fn real_clock_measures_blocking_sampler() {
        let controller = RotationController::new().pace(Duration::from_millis(1));
        let mut base = spotter_hal::SimBase::new();
        let log = base.log();
        let mut slow = || -> Result<bool, SpotterError> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(true)
        };
        // 0.05 turns at 2π rad/s: 50 ms budget, 10 ms cadence.
        let request = RotationRequest::new(std::f64::consts::TAU, 0.05, 10);

        let result = controller.scan(&mut base, &mut slow, &request).unwrap();

        assert!(result.stopped_early);
        assert!(result.overshoot_seconds >= 0.02);
        assert_eq!(log.stop_count(), 1);
    }
}
