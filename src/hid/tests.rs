//! Unit tests for report encoding and descriptor constants.

use super::keyboard::{
    key_by_name, modifier_by_name, KeyboardReport, KEYBOARD_REPORT_DESCRIPTOR, KEY_BACKSPACE,
    KEY_ENTER, KEY_ESCAPE, KEY_POWER, KEY_TAB, KEY_VOLUME_DOWN, KEY_VOLUME_UP, MOD_LEFT_ALT,
    MOD_LEFT_CTRL, MOD_LEFT_GUI, MOD_LEFT_SHIFT,
};
use super::pointer::{PointerReport, AXIS_MAX, POINTER_REPORT_DESCRIPTOR};
use super::{HidReport, PeripheralId, ReportDescriptor};

// ═══════════════════════════════════════════════════════════════════════════
// Pointer Report Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn pointer_report_wire_layout_is_little_endian() {
    let report = PointerReport::down(5000, 0x1234);
    assert_eq!(report.to_bytes(), [0x01, 0x88, 0x13, 0x34, 0x12]);
}

#[test]
fn pointer_report_up_clears_button() {
    let report = PointerReport::up(AXIS_MAX, AXIS_MAX);
    assert!(!report.is_pressed());
    assert_eq!(report.to_bytes(), [0x00, 0x10, 0x27, 0x10, 0x27]);
}

#[test]
fn pointer_report_serialize_buffer_too_small() {
    let mut buf = [0u8; 4];
    assert_eq!(PointerReport::down(1, 1).serialize(&mut buf), 0);
}

#[test]
fn pointer_report_from_short_bytes_fails() {
    assert!(PointerReport::from_bytes(&[0x01, 0x00, 0x00]).is_none());
}

#[test]
fn pointer_descriptor_declares_10000_logical_max() {
    // Logical Maximum (long item, 2 bytes) = 0x2710.
    let needle = [0x26, 0x10, 0x27];
    assert!(POINTER_REPORT_DESCRIPTOR
        .windows(needle.len())
        .any(|w| w == needle));
    // Two 16-bit fields.
    assert!(POINTER_REPORT_DESCRIPTOR
        .windows(4)
        .any(|w| w == [0x75, 0x10, 0x95, 0x02]));
}

// ═══════════════════════════════════════════════════════════════════════════
// Keyboard Report Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn keyboard_report_single_key_layout() {
    let report = KeyboardReport::key(0x04, MOD_LEFT_SHIFT);
    assert_eq!(report.to_bytes(), [0x02, 0x00, 0x04, 0, 0, 0, 0, 0]);
    assert!(!report.is_empty());
}

#[test]
fn keyboard_report_empty_is_all_zero() {
    let report = KeyboardReport::empty();
    assert!(report.is_empty());
    assert_eq!(report.to_bytes(), [0; 8]);
}

#[test]
fn keyboard_report_modifier_only_is_not_empty() {
    let report = KeyboardReport::key(0, MOD_LEFT_SHIFT);
    assert!(!report.is_empty());
}

#[test]
fn keyboard_descriptor_covers_power_key() {
    // Logical Maximum (255) must be >= KEY_POWER.
    assert!(KEYBOARD_REPORT_DESCRIPTOR
        .windows(3)
        .any(|w| w == [0x26, 0xFF, 0x00]));
    assert!(KEY_POWER < 0xFF);
}

#[test]
fn key_names_resolve_to_usages() {
    assert_eq!(key_by_name("enter"), Some(KEY_ENTER));
    assert_eq!(key_by_name("Esc"), Some(KEY_ESCAPE));
    assert_eq!(key_by_name("backspace"), Some(KEY_BACKSPACE));
    assert_eq!(key_by_name("tab"), Some(KEY_TAB));
    assert_eq!(key_by_name("POWER"), Some(KEY_POWER));
    assert_eq!(key_by_name("volume-up"), Some(KEY_VOLUME_UP));
    assert_eq!(key_by_name("volume_down"), Some(KEY_VOLUME_DOWN));
    assert_eq!(key_by_name("0x28"), None);
    assert_eq!(key_by_name("home"), None);
}

#[test]
fn modifier_names_resolve_to_bits() {
    assert_eq!(modifier_by_name("ctrl"), Some(MOD_LEFT_CTRL));
    assert_eq!(modifier_by_name("Shift"), Some(MOD_LEFT_SHIFT));
    assert_eq!(modifier_by_name("alt"), Some(MOD_LEFT_ALT));
    assert_eq!(modifier_by_name("meta"), Some(MOD_LEFT_GUI));
    assert_eq!(modifier_by_name("hyper"), None);
}

// ═══════════════════════════════════════════════════════════════════════════
// HidReport Enum Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn hid_report_encode_lengths_match_profiles() {
    let p = HidReport::from(PointerReport::down(1, 2));
    let k = HidReport::from(KeyboardReport::key(KEY_POWER, 0));
    assert_eq!(p.encode().len(), ReportDescriptor::Pointer.report_size());
    assert_eq!(k.encode().len(), ReportDescriptor::Keyboard.report_size());
}

#[test]
fn hid_report_decode_rejects_wrong_profile_length() {
    let bytes = KeyboardReport::key(KEY_POWER, 0).to_bytes();
    assert!(HidReport::decode(ReportDescriptor::Pointer, &bytes).is_none());
    let decoded = HidReport::decode(ReportDescriptor::Keyboard, &bytes).unwrap();
    assert_eq!(decoded.as_keyboard().unwrap().keycodes[0], KEY_POWER);
}

#[test]
fn peripheral_id_display() {
    assert_eq!(PeripheralId(2).to_string(), "hid#2");
}
