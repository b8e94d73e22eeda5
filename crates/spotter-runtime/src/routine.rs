//! [`InteractionRoutine`] – the scripted encounter.
//!
//! Boot, nod, greet, spin around looking for a person, then spend a fixed
//! window answering questions.  When a question names an object the robot
//! spins again looking for it, undoes the overshoot of that scan so it faces
//! the object, steps towards it and nods at it.
//!
//! The routine owns nothing but its timing; every effect goes through the
//! borrowed collaborators in [`Robot`], so a simulator and the real robot run
//! the same code.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use spotter_hal::MobileBase;
use spotter_scan::{Clock, MonotonicClock, RotationController};
use spotter_types::{HeadPose, RotationRequest, SpotterError};
use tracing::{debug, info, info_span, warn};

use crate::detector::{Detector, FACE};
use crate::interpreter::Assistant;
use crate::listener::Listener;
use crate::speech::Speaker;

pub const BOOT: &str = "Booting up the robot";
pub const GREETING: &str = "Hi, I am spot, how are you doing today? Where are you?";
pub const PERSON_FOUND: &str = "Oh, here you are, it's nice to see you!";
pub const NOBODY_HERE: &str = "It seems like no one is here. I will lay down for now.";
pub const OFFER_HELP: &str = "How can I help you today?";
pub const SIGN_OFF: &str = "Be careful, it might be hot! Let me know if you need anything else.";

/// Head pitch (radians) at the top of a nod.
pub const NOD_UP: f64 = 0.18;
/// Head pitch (radians) at the bottom of a nod.
pub const NOD_DOWN: f64 = -0.1;

fn searching_for(class: &str) -> String {
    format!("Let me find your {class}.")
}

fn presenting(class: &str) -> String {
    format!("Here is your {class}. Look at where I am nodding.")
}

fn not_found(class: &str) -> String {
    format!("I am sorry, but I could not find your {class}.")
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration & collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Timing and motion parameters of the routine.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineConfig {
    pub face_scan: RotationRequest,
    pub object_scan: RotationRequest,
    /// How long the robot keeps taking questions.
    pub question_window: Duration,
    /// Positioning goal, relative to the body, used to step towards a found
    /// object.
    pub approach_x: f64,
    pub approach_y: f64,
    /// Pause after the face scan and after approaching an object.
    pub pause: Duration,
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            face_scan: RotationRequest::new(-0.5, 2.0, 200),
            object_scan: RotationRequest::new(0.15, 2.0, 200),
            question_window: Duration::from_secs(60),
            approach_x: 0.25,
            approach_y: 0.0,
            pause: Duration::from_secs(1),
        }
    }
}

impl RoutineConfig {
    /// # Errors
    ///
    /// Returns [`SpotterError::InvalidParameter`] if either scan request is
    /// invalid or an approach coordinate is not finite.
    pub fn validate(&self) -> Result<(), SpotterError> {
        self.face_scan.validate()?;
        self.object_scan.validate()?;
        if !self.approach_x.is_finite() || !self.approach_y.is_finite() {
            return Err(SpotterError::InvalidParameter(
                "approach goal must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything the routine acts through, borrowed for one run.
pub struct Robot<'a> {
    pub base: &'a mut dyn MobileBase,
    pub speaker: &'a mut dyn Speaker,
    pub listener: &'a mut dyn Listener,
    pub assistant: &'a mut dyn Assistant,
    pub detector: &'a mut dyn Detector,
}

/// What happened during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutineOutcome {
    pub person_found: bool,
    /// Object class that was found and presented, if any.
    pub object_found: Option<String>,
    /// Non-empty questions answered.
    pub questions: u32,
    /// The shutdown flag cut the run short.
    pub interrupted: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// InteractionRoutine
// ─────────────────────────────────────────────────────────────────────────────

pub struct InteractionRoutine<C: Clock = MonotonicClock> {
    controller: RotationController<C>,
    config: RoutineConfig,
    shutdown: Arc<AtomicBool>,
}

impl<C: Clock> InteractionRoutine<C> {
    pub fn new(controller: RotationController<C>, config: RoutineConfig) -> Self {
        Self {
            controller,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a flag that, once set, ends the run at the next phase
    /// boundary.  A scan already in progress still finishes and stops.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn config(&self) -> &RoutineConfig {
        &self.config
    }

    pub fn controller(&self) -> &RotationController<C> {
        &self.controller
    }

    /// Run the encounter once.
    ///
    /// # Errors
    ///
    /// Any collaborator failure ends the run and is returned as is.  Scans
    /// always leave the base stopped, whatever they return.
    pub fn run(&self, robot: &mut Robot<'_>) -> Result<RoutineOutcome, SpotterError> {
        self.config.validate()?;
        let span = info_span!("routine", base = robot.base.id());
        let _enter = span.enter();
        let mut outcome = RoutineOutcome::default();

        robot.speaker.say(BOOT)?;
        if self.halted(&mut outcome) {
            return Ok(outcome);
        }

        self.nod(&mut *robot.base, 1)?;
        robot.speaker.say(GREETING)?;
        if self.halted(&mut outcome) {
            return Ok(outcome);
        }

        outcome.person_found = self.look_for_person(robot)?;
        robot
            .speaker
            .say(if outcome.person_found { PERSON_FOUND } else { NOBODY_HERE })?;
        self.controller.clock().sleep(self.config.pause);
        if self.halted(&mut outcome) {
            return Ok(outcome);
        }

        self.take_questions(robot, &mut outcome)?;
        info!(
            person_found = outcome.person_found,
            object = ?outcome.object_found,
            questions = outcome.questions,
            interrupted = outcome.interrupted,
            "routine finished"
        );
        Ok(outcome)
    }

    fn halted(&self, outcome: &mut RoutineOutcome) -> bool {
        if self.shutdown.load(Ordering::SeqCst) {
            warn!("shutdown requested, ending routine");
            outcome.interrupted = true;
        }
        outcome.interrupted
    }

    fn look_for_person(&self, robot: &mut Robot<'_>) -> Result<bool, SpotterError> {
        info!("looking for a person");
        let mut sampler = || -> Result<bool, SpotterError> { robot.detector.detect(FACE) };
        let result = self
            .controller
            .scan(&mut *robot.base, &mut sampler, &self.config.face_scan)?;
        Ok(result.stopped_early)
    }

    fn take_questions(
        &self,
        robot: &mut Robot<'_>,
        outcome: &mut RoutineOutcome,
    ) -> Result<(), SpotterError> {
        let clock = self.controller.clock();
        let opened = clock.now();
        robot.speaker.say(OFFER_HELP)?;

        while clock.now().saturating_sub(opened) < self.config.question_window {
            if self.halted(outcome) {
                return Ok(());
            }
            let Some(question) = robot.listener.listen()? else {
                debug!("no more questions");
                return Ok(());
            };
            if question.is_empty() {
                continue;
            }
            outcome.questions += 1;
            info!(%question, "question");

            let reply = robot.assistant.interpret(&question)?;
            robot.speaker.say(&reply.answer)?;
            let Some(class) = reply.object_class_to_find else {
                continue;
            };

            robot.speaker.say(&searching_for(&class))?;
            if self.fetch(robot, &class)? {
                outcome.object_found = Some(class);
                return Ok(());
            }
            robot.speaker.say(&not_found(&class))?;
        }
        debug!("question window closed");
        Ok(())
    }

    /// Scan for `class`; when found, face it, step towards it and point it
    /// out.  Returns whether it was found.
    fn fetch(&self, robot: &mut Robot<'_>, class: &str) -> Result<bool, SpotterError> {
        info!(class, "looking for object");
        let request = self.config.object_scan;
        let mut sampler = || -> Result<bool, SpotterError> { robot.detector.detect(class) };
        let result = self.controller.scan(&mut *robot.base, &mut sampler, &request)?;
        if !result.stopped_early {
            return Ok(false);
        }

        self.controller.compensate(&mut *robot.base, &request, &result)?;
        robot
            .base
            .move_to_goal(self.config.approach_x, self.config.approach_y)?;
        self.controller.clock().sleep(self.config.pause);
        robot.speaker.say(&presenting(class))?;
        self.nod(&mut *robot.base, 2)?;
        robot.speaker.say(SIGN_OFF)?;
        Ok(true)
    }

    fn nod(&self, base: &mut dyn MobileBase, times: u32) -> Result<(), SpotterError> {
        debug!(times, "nodding");
        for _ in 0..times {
            base.move_head(&HeadPose::pitch_and_back(NOD_UP))?;
            base.move_head(&HeadPose::pitch_and_back(NOD_DOWN))?;
        }
        base.move_head(&HeadPose::neutral())
    }
}
