//! In-memory doubles for driving the gesture and navigation layers
//! without a device.
//!
//! Doubles share state through `Rc`, so a test keeps a clone and inspects
//! it after handing the original to the code under test.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::bridge::{BootProbe, DecisionOracle, FrameSource, TextInput};
use crate::clock::Clock;
use crate::error::{OracleError, TextInputError, TransportError};
use crate::hid::keyboard::KeyboardReport;
use crate::hid::pointer::PointerReport;
use crate::hid::{HidReport, PeripheralId, ReportDescriptor};
use crate::navigator::NavigationDecision;
use crate::screen::{Frame, PixelLayout};
use crate::usb::Transport;

/// One accepted transport operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Register {
        id: PeripheralId,
        descriptor: ReportDescriptor,
    },
    Unregister {
        id: PeripheralId,
    },
    Report {
        id: PeripheralId,
        bytes: Vec<u8>,
    },
    Close,
}

#[derive(Debug, Default)]
struct TransportState {
    log: Vec<Sent>,
    profiles: BTreeMap<PeripheralId, ReportDescriptor>,
    /// Successful sends allowed before every further send fails.
    send_budget: Option<usize>,
    fail_register: bool,
    failed_sends: usize,
    closed: bool,
}

/// [`Transport`] that records every operation.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    state: Rc<RefCell<TransportState>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` more reports through, then fail every send.
    pub fn fail_sends_after(&self, n: usize) {
        self.state.borrow_mut().send_budget = Some(n);
    }

    pub fn fail_registration(&self) {
        self.state.borrow_mut().fail_register = true;
    }

    pub fn log(&self) -> Vec<Sent> {
        self.state.borrow().log.clone()
    }

    pub fn failed_sends(&self) -> usize {
        self.state.borrow().failed_sends
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub fn registered(&self) -> Vec<PeripheralId> {
        self.state.borrow().profiles.keys().copied().collect()
    }

    /// Decoded reports sent to `id`, in order.
    pub fn reports(&self, id: PeripheralId) -> Vec<HidReport> {
        let state = self.state.borrow();
        state
            .log
            .iter()
            .filter_map(|s| match s {
                Sent::Report { id: to, bytes } if *to == id => {
                    let profile = state.profiles.get(to).copied()?;
                    HidReport::decode(profile, bytes)
                }
                _ => None,
            })
            .collect()
    }

    pub fn pointer_reports(&self, id: PeripheralId) -> Vec<PointerReport> {
        self.reports(id)
            .iter()
            .filter_map(|r| r.as_pointer().copied())
            .collect()
    }

    pub fn keyboard_reports(&self, id: PeripheralId) -> Vec<KeyboardReport> {
        self.reports(id)
            .iter()
            .filter_map(|r| r.as_keyboard().copied())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn register(
        &mut self,
        id: PeripheralId,
        descriptor: ReportDescriptor,
    ) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.fail_register {
            return Err(TransportError::new("REGISTER_HID", id, "stalled"));
        }
        state.profiles.insert(id, descriptor);
        state.log.push(Sent::Register { id, descriptor });
        Ok(())
    }

    fn unregister(&mut self, id: PeripheralId) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.profiles.remove(&id).is_none() {
            return Err(TransportError::new("UNREGISTER_HID", id, "not registered"));
        }
        state.log.push(Sent::Unregister { id });
        Ok(())
    }

    fn send_report(&mut self, id: PeripheralId, report: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.closed {
            return Err(TransportError::new("SEND_HID_EVENT", id, "device handle closed"));
        }
        if let Some(budget) = state.send_budget.as_mut() {
            if *budget == 0 {
                state.failed_sends += 1;
                return Err(TransportError::new("SEND_HID_EVENT", id, "pipe error"));
            }
            *budget -= 1;
        }
        state.log.push(Sent::Report {
            id,
            bytes: report.to_vec(),
        });
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        if !state.closed {
            state.closed = true;
            state.log.push(Sent::Close);
        }
    }
}

#[derive(Debug)]
struct ClockState {
    origin: Instant,
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// Virtual clock: `sleep` advances time instantly and is recorded.
#[derive(Clone, Debug)]
pub struct ManualClock {
    state: Rc<RefCell<ClockState>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ClockState {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        self.state.borrow_mut().elapsed += by;
    }

    pub fn elapsed(&self) -> Duration {
        self.state.borrow().elapsed
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.borrow().sleeps.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let state = self.state.borrow();
        state.origin + state.elapsed
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.borrow_mut();
        state.elapsed += duration;
        state.sleeps.push(duration);
    }
}

/// A 4x4 frame bright enough to count as on.
pub fn lit_frame() -> Frame {
    Frame::filled(4, 4, PixelLayout::Rgb, 200)
}

/// A 4x4 black frame.
pub fn dark_frame() -> Frame {
    Frame::filled(4, 4, PixelLayout::Rgb, 0)
}

/// Frame source replaying a script, then repeating `then` forever.
#[derive(Debug)]
pub struct ScriptedFrames {
    script: VecDeque<Option<Frame>>,
    then: Option<Frame>,
    captures: usize,
}

impl ScriptedFrames {
    pub fn new(script: impl IntoIterator<Item = Option<Frame>>, then: Option<Frame>) -> Self {
        Self {
            script: script.into_iter().collect(),
            then,
            captures: 0,
        }
    }

    /// Always the same lit frame.
    pub fn always_lit() -> Self {
        Self::new([], Some(lit_frame()))
    }

    pub fn captures(&self) -> usize {
        self.captures
    }
}

impl FrameSource for ScriptedFrames {
    fn capture(&mut self) -> Option<Frame> {
        self.captures += 1;
        match self.script.pop_front() {
            Some(frame) => frame,
            None => self.then.clone(),
        }
    }
}

/// Boot probe that turns true once it has been asked `after` times.
#[derive(Debug, Default)]
pub struct CountingProbe {
    after: Option<usize>,
    calls: Cell<usize>,
}

impl CountingProbe {
    pub fn never() -> Self {
        Self::default()
    }

    /// `false` for the first `n` calls, `true` afterwards.
    pub fn booted_after(n: usize) -> Self {
        Self {
            after: Some(n),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl BootProbe for CountingProbe {
    fn is_booted(&self) -> bool {
        let seen = self.calls.get();
        self.calls.set(seen + 1);
        self.after.is_some_and(|n| seen >= n)
    }
}

/// Oracle replaying raw model replies through the real response parser,
/// then repeating `then`.
#[derive(Debug)]
pub struct ScriptedOracle {
    replies: VecDeque<Result<String, String>>,
    then: String,
    calls: usize,
}

impl ScriptedOracle {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>, then: &str) -> Self {
        Self {
            replies: replies.into_iter().map(|r| Ok(r.into())).collect(),
            then: then.to_string(),
            calls: 0,
        }
    }

    /// Make the next unanswered call fail outright.
    pub fn then_fail(mut self, reason: &str) -> Self {
        self.replies.push_back(Err(reason.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DecisionOracle for ScriptedOracle {
    fn decide(&mut self, _frame: &Frame) -> Result<NavigationDecision, OracleError> {
        self.calls += 1;
        match self.replies.pop_front() {
            Some(Ok(reply)) => Ok(NavigationDecision::from_response(&reply)),
            Some(Err(reason)) => Err(OracleError::Request(reason)),
            None => Ok(NavigationDecision::from_response(&self.then)),
        }
    }
}

/// Text channel recording what it was asked to type.
#[derive(Debug, Default)]
pub struct RecordingText {
    sent: RefCell<Vec<String>>,
    offline: bool,
}

impl RecordingText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self {
            sent: RefCell::default(),
            offline: true,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }
}

impl TextInput for RecordingText {
    fn send_text(&self, text: &str) -> Result<(), TextInputError> {
        if self.offline {
            return Err(TextInputError::NotConnected);
        }
        self.sent.borrow_mut().push(text.to_string());
        Ok(())
    }
}
