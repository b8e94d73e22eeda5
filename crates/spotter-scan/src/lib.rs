//! `spotter-scan` – time-boxed rotational scan with periodic sampling.
//!
//! # Modules
//!
//! - [`clock`] – [`Clock`][clock::Clock]: monotonic time source.
//!   [`MonotonicClock`][clock::MonotonicClock] wraps `std::time::Instant`;
//!   [`ManualClock`][clock::ManualClock] only moves when told to, which makes
//!   the timing properties of a scan testable without waiting.
//! - [`scheduler`] – [`PeriodicSampler`][scheduler::PeriodicSampler]:
//!   re-issues a keep-alive command every iteration and invokes a
//!   [`Sampler`][scheduler::Sampler] at a fixed cadence until it asks to stop
//!   or a deadline passes.
//! - [`controller`] – [`RotationController`][controller::RotationController]:
//!   turns a [`RotationRequest`][spotter_types::RotationRequest] into a
//!   bounded spin of a [`MobileBase`][spotter_hal::MobileBase], always ends it
//!   with a stop command, and cancels the overshoot on request.

pub mod clock;
pub mod controller;
pub mod scheduler;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use controller::{RotationController, ScanPhase};
pub use scheduler::{PeriodicSampler, Sampler, SamplerReport};
