//! Gesture synthesis: screen-space intents to framed HID reports.
//!
//! Coordinates are pixels on the logical display. They are normalised to
//! the pointer's absolute axis range with `round(v / extent * 10000)`.
//! The synthesizer owns the transport, so one synthesizer is the only
//! writer on a device link.

use core::fmt;
use std::time::Duration;

use log::{debug, trace};

use crate::clock::Clock;
use crate::config;
use crate::error::{Error, GestureError};
use crate::hid::keyboard::{KeyboardReport, KEY_POWER};
use crate::hid::pointer::{PointerReport, AXIS_MAX};
use crate::hid::{HidReport, PeripheralId, ReportDescriptor};
use crate::usb::Transport;

/// Logical display size in pixels. Both dimensions are non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenGeometry {
    width: u32,
    height: u32,
}

impl ScreenGeometry {
    pub fn new(width: u32, height: u32) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGeometry { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2, self.height / 2)
    }

    /// `true` for points in `[0, width) x [0, height)`.
    pub fn contains(&self, p: Point) -> bool {
        p.x < self.width && p.y < self.height
    }

    /// Nearest on-screen point to a possibly off-screen one.
    pub fn clamp(&self, x: i64, y: i64) -> Point {
        let cx = x.clamp(0, i64::from(self.width) - 1);
        let cy = y.clamp(0, i64::from(self.height) - 1);
        // Both values now lie in 0..u32::MAX.
        Point::new(cx as u32, cy as u32)
    }

    /// Map a pixel position to absolute axis units.
    pub fn normalize(&self, p: Point) -> (u16, u16) {
        (
            normalize_axis(p.x, self.width),
            normalize_axis(p.y, self.height),
        )
    }
}

impl fmt::Display for ScreenGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A pixel position on the display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// `round(value / extent * AXIS_MAX)`, saturating at `AXIS_MAX`.
///
/// `value == extent` maps to exactly `AXIS_MAX`. An `extent` of zero maps
/// everything to 0.
pub fn normalize_axis(value: u32, extent: u32) -> u16 {
    if extent == 0 {
        return 0;
    }
    let scaled = (f64::from(value) / f64::from(extent) * f64::from(AXIS_MAX)).round();
    if scaled >= f64::from(AXIS_MAX) {
        AXIS_MAX
    } else {
        scaled as u16
    }
}

/// The `steps + 1` evenly spaced points from `from` to `to`, inclusive.
pub fn interpolate(from: Point, to: Point, steps: u32) -> impl Iterator<Item = Point> {
    let lerp = move |a: u32, b: u32, i: u32| -> u32 {
        if i == steps {
            return b;
        }
        let t = f64::from(i) / f64::from(steps);
        (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u32
    };
    (0..=steps).map(move |i| Point::new(lerp(from.x, to.x, i), lerp(from.y, to.y, i)))
}

/// Shape of an interpolated swipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwipeProfile {
    pub steps: u32,
    pub duration: Duration,
}

impl Default for SwipeProfile {
    fn default() -> Self {
        Self {
            steps: config::SWIPE_STEPS,
            duration: config::SWIPE_DURATION,
        }
    }
}

/// Builds and sends HID reports for taps, swipes and key presses.
pub struct GestureSynthesizer<T: Transport, C: Clock> {
    transport: T,
    clock: C,
}

impl<T: Transport, C: Clock> GestureSynthesizer<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self { transport, clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> (T, C) {
        (self.transport, self.clock)
    }

    fn send(&mut self, id: PeripheralId, report: impl Into<HidReport>) -> Result<(), GestureError> {
        let report = report.into();
        trace!("{id} <- {report:?}");
        self.transport.send_report(id, &report.encode())?;
        Ok(())
    }

    fn check_bounds(p: Point, geometry: ScreenGeometry) -> Result<(), GestureError> {
        if geometry.contains(p) {
            Ok(())
        } else {
            Err(GestureError::OutOfBounds {
                x: p.x,
                y: p.y,
                geometry,
            })
        }
    }

    /// Register a virtual peripheral with one of the fixed descriptors.
    pub fn register(
        &mut self,
        id: PeripheralId,
        descriptor: ReportDescriptor,
    ) -> Result<(), GestureError> {
        self.transport.register(id, descriptor)?;
        Ok(())
    }

    pub fn unregister(&mut self, id: PeripheralId) -> Result<(), GestureError> {
        self.transport.unregister(id)?;
        Ok(())
    }

    /// Press and release at `p`, holding for the tap settle interval.
    pub fn tap(
        &mut self,
        id: PeripheralId,
        p: Point,
        geometry: ScreenGeometry,
    ) -> Result<(), GestureError> {
        Self::check_bounds(p, geometry)?;
        let (x, y) = geometry.normalize(p);
        debug!("tap {p} -> ({x}, {y})");
        self.send(id, PointerReport::down(x, y))?;
        self.clock.sleep(config::TAP_SETTLE);
        self.send(id, PointerReport::up(x, y))
    }

    /// Drag from `from` to `to`: `steps + 1` pressed reports spaced
    /// `duration / steps` apart, then one release at `to`.
    pub fn swipe(
        &mut self,
        id: PeripheralId,
        from: Point,
        to: Point,
        geometry: ScreenGeometry,
        profile: SwipeProfile,
    ) -> Result<(), GestureError> {
        if profile.steps == 0 {
            return Err(GestureError::InvalidSteps);
        }
        Self::check_bounds(from, geometry)?;
        Self::check_bounds(to, geometry)?;
        debug!("swipe {from} -> {to} in {} steps", profile.steps);

        let spacing = profile.duration / profile.steps;
        for p in interpolate(from, to, profile.steps) {
            let (x, y) = geometry.normalize(p);
            self.send(id, PointerReport::down(x, y))?;
            self.clock.sleep(spacing);
        }
        let (x, y) = geometry.normalize(to);
        self.send(id, PointerReport::up(x, y))
    }

    /// Press and release a single key. No chords: the release report
    /// clears every key and modifier.
    pub fn send_key(
        &mut self,
        id: PeripheralId,
        key_code: u8,
        modifiers: u8,
    ) -> Result<(), GestureError> {
        debug!("key 0x{key_code:02X} (modifiers 0x{modifiers:02X})");
        self.send(id, KeyboardReport::key(key_code, modifiers))?;
        self.clock.sleep(config::KEY_HOLD);
        self.send(id, KeyboardReport::empty())
    }

    /// Nudge the pointer without pressing anything. Wakes a dimmed display
    /// and cannot activate UI elements.
    pub fn wake_via_pointer(&mut self, id: PeripheralId) -> Result<(), GestureError> {
        let mid = AXIS_MAX / 2;
        let nudged = mid + config::WAKE_NUDGE;
        debug!("wake: pointer nudge on {id}");
        self.send(id, PointerReport::up(mid, mid))?;
        self.send(id, PointerReport::up(nudged, nudged))
    }

    /// Press the hardware power key. Toggles an already-on screen off.
    pub fn wake_via_power_key(&mut self, id: PeripheralId) -> Result<(), GestureError> {
        debug!("wake: power key on {id}");
        self.send_key(id, KEY_POWER, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, RecordingTransport};

    const POINTER: PeripheralId = PeripheralId(2);
    const KEYBOARD: PeripheralId = PeripheralId(1);

    fn synth() -> (
        GestureSynthesizer<RecordingTransport, ManualClock>,
        RecordingTransport,
        ManualClock,
    ) {
        let transport = RecordingTransport::new();
        let clock = ManualClock::new();
        let mut s = GestureSynthesizer::new(transport.clone(), clock.clone());
        s.register(POINTER, ReportDescriptor::Pointer).unwrap();
        s.register(KEYBOARD, ReportDescriptor::Keyboard).unwrap();
        (s, transport, clock)
    }

    fn phone() -> ScreenGeometry {
        ScreenGeometry::new(1080, 2400).unwrap()
    }

    #[test]
    fn zero_geometry_rejected() {
        assert!(matches!(
            ScreenGeometry::new(0, 2400),
            Err(Error::InvalidGeometry { width: 0, .. })
        ));
        assert!(ScreenGeometry::new(1080, 0).is_err());
    }

    #[test]
    fn normalize_center_of_phone() {
        assert_eq!(phone().normalize(Point::new(540, 1200)), (5000, 5000));
    }

    #[test]
    fn normalize_boundaries() {
        // The far edge itself is off-screen but maps to exactly AXIS_MAX.
        assert_eq!(normalize_axis(1080, 1080), AXIS_MAX);
        assert_eq!(normalize_axis(2400, 2400), AXIS_MAX);
        assert_eq!(normalize_axis(0, 1080), 0);
        // Last on-screen pixel stays below the far edge.
        assert_eq!(normalize_axis(1079, 1080), 9991);
        assert!(!phone().contains(Point::new(1080, 0)));
        assert!(!phone().contains(Point::new(0, 2400)));
        assert!(phone().contains(Point::new(1079, 2399)));
    }

    #[test]
    fn normalize_rounds_to_nearest() {
        // 1/3 * 10000 = 3333.33
        assert_eq!(normalize_axis(1, 3), 3333);
        // 2/3 * 10000 = 6666.67
        assert_eq!(normalize_axis(2, 3), 6667);
    }

    #[test]
    fn clamp_pulls_points_on_screen() {
        let g = phone();
        assert_eq!(g.clamp(-5, 99_999), Point::new(0, 2399));
        assert_eq!(g.clamp(1080, 10), Point::new(1079, 10));
    }

    #[test]
    fn tap_sends_down_then_up_at_same_position() {
        let (mut s, transport, clock) = synth();
        s.tap(POINTER, Point::new(540, 1200), phone()).unwrap();

        let reports = transport.pointer_reports(POINTER);
        assert_eq!(
            reports,
            vec![PointerReport::down(5000, 5000), PointerReport::up(5000, 5000)]
        );
        assert_eq!(clock.sleeps(), vec![config::TAP_SETTLE]);
    }

    #[test]
    fn tap_out_of_bounds_is_rejected_before_sending() {
        let (mut s, transport, _) = synth();
        let err = s.tap(POINTER, Point::new(1080, 10), phone()).unwrap_err();
        assert!(matches!(err, GestureError::OutOfBounds { x: 1080, .. }));
        assert!(transport.pointer_reports(POINTER).is_empty());
    }

    #[test]
    fn swipe_emits_steps_plus_one_downs_and_one_up() {
        let (mut s, transport, clock) = synth();
        let from = Point::new(540, 1600);
        let to = Point::new(540, 800);
        let profile = SwipeProfile {
            steps: 4,
            duration: Duration::from_millis(400),
        };
        s.swipe(POINTER, from, to, phone(), profile).unwrap();

        let reports = transport.pointer_reports(POINTER);
        let downs: Vec<_> = reports.iter().filter(|r| r.is_pressed()).collect();
        let ups: Vec<_> = reports.iter().filter(|r| !r.is_pressed()).collect();
        assert_eq!(downs.len(), 5);
        assert_eq!(ups.len(), 1);
        assert_eq!(reports.last(), Some(&PointerReport::up(5000, 3333)));
        // Final pressed report sits on the destination.
        assert_eq!(*downs[4], PointerReport::down(5000, 3333));
        assert_eq!(*downs[0], PointerReport::down(5000, 6667));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(100); 5]);
    }

    #[test]
    fn swipe_single_step() {
        let (mut s, transport, _) = synth();
        let profile = SwipeProfile {
            steps: 1,
            duration: Duration::from_millis(10),
        };
        s.swipe(POINTER, Point::new(0, 0), Point::new(1079, 2399), phone(), profile)
            .unwrap();
        let reports = transport.pointer_reports(POINTER);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[1], PointerReport::down(9991, 9996));
    }

    #[test]
    fn swipe_rejects_zero_steps() {
        let (mut s, _, _) = synth();
        let profile = SwipeProfile {
            steps: 0,
            duration: Duration::ZERO,
        };
        let err = s
            .swipe(POINTER, Point::new(1, 1), Point::new(2, 2), phone(), profile)
            .unwrap_err();
        assert!(matches!(err, GestureError::InvalidSteps));
    }

    #[test]
    fn interpolate_is_inclusive_and_deterministic() {
        let pts: Vec<_> = interpolate(Point::new(0, 10), Point::new(10, 0), 3).collect();
        assert_eq!(
            pts,
            vec![
                Point::new(0, 10),
                Point::new(3, 7),
                Point::new(7, 3),
                Point::new(10, 0)
            ]
        );
    }

    #[test]
    fn send_key_holds_then_releases_everything() {
        let (mut s, transport, clock) = synth();
        s.send_key(KEYBOARD, 0x28, 0x02).unwrap();
        let reports = transport.keyboard_reports(KEYBOARD);
        assert_eq!(
            reports,
            vec![KeyboardReport::key(0x28, 0x02), KeyboardReport::empty()]
        );
        assert_eq!(clock.sleeps(), vec![config::KEY_HOLD]);
    }

    #[test]
    fn wake_via_pointer_never_presses() {
        let (mut s, transport, _) = synth();
        s.wake_via_pointer(POINTER).unwrap();
        let reports = transport.pointer_reports(POINTER);
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| !r.is_pressed()));
        assert_ne!(reports[0], reports[1]);
    }

    #[test]
    fn wake_via_power_key_sends_power_usage() {
        let (mut s, transport, _) = synth();
        s.wake_via_power_key(KEYBOARD).unwrap();
        let reports = transport.keyboard_reports(KEYBOARD);
        assert_eq!(reports[0].keycodes[0], KEY_POWER);
        assert!(reports[1].is_empty());
    }

    #[test]
    fn transport_failure_surfaces_without_retry() {
        let (mut s, transport, _) = synth();
        transport.fail_sends_after(1);
        let err = s.tap(POINTER, Point::new(10, 10), phone()).unwrap_err();
        assert!(matches!(err, GestureError::Transport(_)));
        // Press went through, release was attempted exactly once.
        assert_eq!(transport.pointer_reports(POINTER).len(), 1);
        assert_eq!(transport.failed_sends(), 1);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn on_screen_points_normalize_into_axis_range(
                w in 1u32..8000,
                h in 1u32..8000,
                fx in 0.0f64..1.0,
                fy in 0.0f64..1.0,
            ) {
                let g = ScreenGeometry::new(w, h).unwrap();
                let p = Point::new((fx * f64::from(w)) as u32, (fy * f64::from(h)) as u32);
                prop_assume!(g.contains(p));
                let (x, y) = g.normalize(p);
                prop_assert!(x <= AXIS_MAX);
                prop_assert!(y <= AXIS_MAX);
            }

            #[test]
            fn swipe_last_down_is_destination(
                x1 in 0u32..1080, y1 in 0u32..2400,
                x2 in 0u32..1080, y2 in 0u32..2400,
                steps in 1u32..40,
            ) {
                let pts: Vec<_> = interpolate(Point::new(x1, y1), Point::new(x2, y2), steps).collect();
                prop_assert_eq!(pts.len() as u32, steps + 1);
                prop_assert_eq!(pts[0], Point::new(x1, y1));
                prop_assert_eq!(*pts.last().unwrap(), Point::new(x2, y2));
            }
        }
    }
}
