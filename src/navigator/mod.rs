//! Closed-loop navigator for on-device setup wizards.
//!
//! Each iteration:
//!
//! 1. deadline passed → `TimedOut`
//! 2. boot probe says the device is up → `Succeeded`
//! 3. capture a frame; none → back off, counts as a step
//! 4. screen off → wake (pointer nudge, escalating to the power key),
//!    no oracle call, no step consumed
//! 5. oracle verdict `completed` → `Succeeded`
//! 6. dispatch the action, count a step; `max_steps` reached →
//!    `StepExhausted`
//!
//! Transport and oracle errors end the run with `Err`.

pub mod decision;


use std::time::Duration;

use log::{debug, info, warn};

pub use decision::{Action, NavigationDecision, SwipeDirection};

use crate::bridge::{BootProbe, DecisionOracle, FrameSource, TextInput};
use crate::clock::Clock;
use crate::config;
use crate::error::{Error, Result};
use crate::gesture::{GestureSynthesizer, Point, ScreenGeometry, SwipeProfile};
use crate::hid::{PeripheralId, ReportDescriptor};
use crate::screen::is_screen_off;
use crate::usb::Transport;

/// Run parameters. Validated by [`NavigationController::new`].
#[derive(Clone, Debug, PartialEq)]
pub struct NavigatorConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub pointer_id: PeripheralId,
    pub keyboard_id: PeripheralId,
    pub max_steps: u32,
    pub timeout: Duration,
    pub screen_off_threshold: f64,
    /// Prefix for log lines, usually the device serial.
    pub label: String,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            screen_width: config::DEFAULT_SCREEN_WIDTH,
            screen_height: config::DEFAULT_SCREEN_HEIGHT,
            pointer_id: PeripheralId(config::DEFAULT_POINTER_ID),
            keyboard_id: PeripheralId(config::DEFAULT_KEYBOARD_ID),
            max_steps: config::DEFAULT_MAX_STEPS,
            timeout: config::DEFAULT_TIMEOUT,
            screen_off_threshold: config::SCREEN_OFF_THRESHOLD,
            label: "usb".into(),
        }
    }
}

/// How a successful run was recognised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Control channel reachable and boot completed.
    DeviceBooted,
    /// The oracle judged the wizard finished.
    OracleReported,
}

/// Terminal state of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(Completion),
    TimedOut,
    StepExhausted,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }
}

/// Controller state. `Running` is initial, everything else terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Running,
    Succeeded(Completion),
    TimedOut,
    StepExhausted,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, State::Running)
    }

    /// The run outcome, once terminal.
    pub fn outcome(&self) -> Option<Outcome> {
        match *self {
            State::Running => None,
            State::Succeeded(how) => Some(Outcome::Succeeded(how)),
            State::TimedOut => Some(Outcome::TimedOut),
            State::StepExhausted => Some(Outcome::StepExhausted),
        }
    }
}

/// Summary of one finished run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub outcome: Outcome,
    /// Steps consumed (dispatched decisions plus failed captures).
    pub steps: u32,
    pub decisions: u32,
    pub capture_failures: u32,
    pub pointer_wakes: u32,
    pub power_key_wakes: u32,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Wake action chosen for a screen-off detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeAction {
    Pointer,
    PowerKey,
}

/// Consecutive screen-off counter.
///
/// Up to `threshold` consecutive detections get a pointer nudge; the next
/// one gets the power key and restarts the count, so the power key is
/// never pressed twice in a row.
#[derive(Clone, Debug)]
pub struct Escalation {
    consecutive_off: u32,
    threshold: u32,
}

impl Escalation {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_off: 0,
            threshold,
        }
    }

    pub fn screen_off(&mut self) -> WakeAction {
        self.consecutive_off += 1;
        if self.consecutive_off <= self.threshold {
            WakeAction::Pointer
        } else {
            self.consecutive_off = 0;
            WakeAction::PowerKey
        }
    }

    pub fn screen_on(&mut self) {
        self.consecutive_off = 0;
    }

    pub fn count(&self) -> u32 {
        self.consecutive_off
    }
}

/// Start and end of the canonical swipe for `direction`, centred on the
/// screen and clamped onto it.
pub fn canonical_swipe(direction: SwipeDirection, geometry: ScreenGeometry) -> (Point, Point) {
    let c = geometry.center();
    let (cx, cy) = (i64::from(c.x), i64::from(c.y));
    let d = i64::from(config::SWIPE_THROW);
    let ((x1, y1), (x2, y2)) = match direction {
        SwipeDirection::Up => ((cx, cy + d), (cx, cy - d)),
        SwipeDirection::Down => ((cx, cy - d), (cx, cy + d)),
        SwipeDirection::Left => ((cx + d, cy), (cx - d, cy)),
        SwipeDirection::Right => ((cx - d, cy), (cx + d, cy)),
    };
    (geometry.clamp(x1, y1), geometry.clamp(x2, y2))
}

/// Borrowed collaborators for one run.
pub struct Collaborators<'a> {
    pub frames: &'a mut dyn FrameSource,
    pub probe: &'a dyn BootProbe,
    pub oracle: &'a mut dyn DecisionOracle,
    pub text: &'a dyn TextInput,
}


/// Drives one device's UI to completion through synthetic HID input.
///
/// Owns the gesture synthesizer and therefore the device link. Both
/// peripherals are registered on construction and unregistered on drop.
pub struct NavigationController<T: Transport, C: Clock> {
    gestures: GestureSynthesizer<T, C>,
    geometry: ScreenGeometry,
    config: NavigatorConfig,
}

impl<T: Transport, C: Clock> NavigationController<T, C> {
    pub fn new(mut gestures: GestureSynthesizer<T, C>, config: NavigatorConfig) -> Result<Self> {
        let geometry = ScreenGeometry::new(config.screen_width, config.screen_height)?;
        if config.max_steps == 0 {
            return Err(Error::InvalidConfig("max_steps must be at least 1".into()));
        }
        if config.pointer_id == config.keyboard_id {
            return Err(Error::InvalidConfig(format!(
                "pointer and keyboard share peripheral id {}",
                config.pointer_id.0
            )));
        }
        if !config.screen_off_threshold.is_finite() {
            return Err(Error::InvalidConfig(
                "screen_off_threshold must be finite".into(),
            ));
        }

        gestures.register(config.pointer_id, ReportDescriptor::Pointer)?;
        if let Err(e) = gestures.register(config.keyboard_id, ReportDescriptor::Keyboard) {
            if let Err(cleanup) = gestures.unregister(config.pointer_id) {
                warn!("[{}] unregister {} failed: {cleanup}", config.label, config.pointer_id);
            }
            return Err(e.into());
        }
        info!(
            "[{}] navigator ready: {geometry} screen, pointer {}, keyboard {}",
            config.label, config.pointer_id, config.keyboard_id
        );

        Ok(Self {
            gestures,
            geometry,
            config,
        })
    }

    pub fn geometry(&self) -> ScreenGeometry {
        self.geometry
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn gestures(&self) -> &GestureSynthesizer<T, C> {
        &self.gestures
    }

    /// Direct access for manual gestures outside a run.
    pub fn gestures_mut(&mut self) -> &mut GestureSynthesizer<T, C> {
        &mut self.gestures
    }

    /// Run the loop until a terminal outcome or an error.
    pub fn run(&mut self, mut io: Collaborators<'_>) -> Result<RunReport> {
        let label = self.config.label.clone();
        info!("[{label}] starting setup wizard navigation");

        let start = self.gestures.clock().now();
        let deadline = start + self.config.timeout;
        let mut escalation = Escalation::new(config::ESCALATION_THRESHOLD);
        let mut report = RunReport {
            outcome: Outcome::TimedOut,
            steps: 0,
            decisions: 0,
            capture_failures: 0,
            pointer_wakes: 0,
            power_key_wakes: 0,
            elapsed: Duration::ZERO,
        };

        let outcome = loop {
            let state = self.iterate(&mut io, &mut escalation, &mut report, deadline)?;
            if let Some(outcome) = state.outcome() {
                break outcome;
            }
        };

        report.outcome = outcome;
        report.elapsed = self.gestures.clock().now().saturating_duration_since(start);
        match outcome {
            Outcome::Succeeded(how) => info!("[{label}] setup wizard done ({how:?})"),
            Outcome::TimedOut => warn!("[{label}] setup wizard timeout"),
            Outcome::StepExhausted => warn!(
                "[{label}] setup wizard did not complete within {} steps",
                self.config.max_steps
            ),
        }
        Ok(report)
    }

    fn iterate(
        &mut self,
        io: &mut Collaborators<'_>,
        escalation: &mut Escalation,
        report: &mut RunReport,
        deadline: std::time::Instant,
    ) -> Result<State> {
        let label = &self.config.label;
        if self.gestures.clock().now() >= deadline {
            return Ok(State::TimedOut);
        }

        if io.probe.is_booted() {
            info!("[{label}] control channel up and boot completed");
            return Ok(State::Succeeded(Completion::DeviceBooted));
        }

        let Some(frame) = io.frames.capture() else {
            report.capture_failures += 1;
            warn!(
                "[{label}] step {}: failed to capture screen, waiting",
                report.steps
            );
            return Ok(self.consume_step(report, config::CAPTURE_RETRY_BACKOFF));
        };

        if is_screen_off(&frame, self.config.screen_off_threshold) {
            match escalation.screen_off() {
                WakeAction::Pointer => {
                    info!("[{label}] screen off, nudging pointer");
                    self.gestures.wake_via_pointer(self.config.pointer_id)?;
                    report.pointer_wakes += 1;
                }
                WakeAction::PowerKey => {
                    info!("[{label}] screen still off, pressing power key");
                    self.gestures.wake_via_power_key(self.config.keyboard_id)?;
                    report.power_key_wakes += 1;
                }
            }
            self.gestures.clock().sleep(config::WAKE_SETTLE);
            return Ok(State::Running);
        }
        escalation.screen_on();

        let decision = io.oracle.decide(&frame)?;
        report.decisions += 1;
        info!(
            "[{label}] step {}: state={} confidence={:.2}",
            report.steps, decision.screen_state, decision.confidence
        );

        if decision.completed {
            info!("[{label}] oracle reports setup wizard completed");
            return Ok(State::Succeeded(Completion::OracleReported));
        }

        self.dispatch(&decision.action, io.text, deadline)?;
        Ok(self.consume_step(report, config::STEP_PACING))
    }

    /// Count a step, then pause for `pause` unless the budget is spent.
    fn consume_step(&self, report: &mut RunReport, pause: Duration) -> State {
        report.steps += 1;
        if report.steps >= self.config.max_steps {
            return State::StepExhausted;
        }
        self.gestures.clock().sleep(pause);
        State::Running
    }

    fn dispatch(
        &mut self,
        action: &Action,
        text: &dyn TextInput,
        deadline: std::time::Instant,
    ) -> Result<()> {
        let label = &self.config.label;
        let pointer = self.config.pointer_id;
        match action {
            Action::Tap { x, y } => {
                let p = self.geometry.clamp(*x, *y);
                if i64::from(p.x) != *x || i64::from(p.y) != *y {
                    warn!("[{label}] tap ({x}, {y}) is off-screen, clamped to {p}");
                }
                info!("[{label}]   action: tap {p}");
                self.gestures.tap(pointer, p, self.geometry)?;
            }
            Action::Swipe { direction } => {
                let (from, to) = canonical_swipe(*direction, self.geometry);
                info!("[{label}]   action: swipe {direction:?}");
                self.gestures
                    .swipe(pointer, from, to, self.geometry, SwipeProfile::default())?;
            }
            Action::Type { text: content } => {
                info!("[{label}]   action: type {content:?}");
                if let Err(e) = text.send_text(content) {
                    warn!("[{label}] text input failed: {e}");
                }
            }
            Action::Wait { seconds } => {
                let clock = self.gestures.clock();
                let requested = if seconds.is_finite() && *seconds > 0.0 {
                    Duration::from_secs_f64(seconds.min(u32::MAX as f64))
                } else {
                    Duration::ZERO
                };
                let remaining = deadline.saturating_duration_since(clock.now());
                let wait = requested.min(remaining);
                info!("[{label}]   action: wait {:.1}s", wait.as_secs_f64());
                clock.sleep(wait);
            }
        }
        debug!("[{label}] action dispatched");
        Ok(())
    }
}

impl<T: Transport, C: Clock> Drop for NavigationController<T, C> {
    fn drop(&mut self) {
        for id in [self.config.keyboard_id, self.config.pointer_id] {
            if let Err(e) = self.gestures.unregister(id) {
                warn!("[{}] unregister {id} failed: {e}", self.config.label);
            }
        }
        self.gestures.transport_mut().close();
    }
}
