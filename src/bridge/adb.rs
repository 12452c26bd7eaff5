//! Device-side collaborators over the `adb` executable.

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use wait_timeout::ChildExt;

use crate::bridge::{BootProbe, FrameSource, TextInput};
use crate::config::{self, AdbSettings};
use crate::error::TextInputError;
use crate::screen::{Frame, PixelLayout};

/// Handle on one device (or whichever single device is attached when no
/// serial is given).
#[derive(Clone, Debug)]
pub struct AdbBridge {
    path: String,
    serial: Option<String>,
    shell_timeout: Duration,
    screencap_timeout: Duration,
}

impl AdbBridge {
    pub fn new(path: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            path: path.into(),
            serial,
            shell_timeout: config::ADB_SHELL_TIMEOUT,
            screencap_timeout: config::ADB_SCREENCAP_TIMEOUT,
        }
    }

    /// Override the per-command limits. A command still running when its
    /// limit expires is killed and reported as failed.
    pub fn with_timeouts(mut self, shell: Duration, screencap: Duration) -> Self {
        self.shell_timeout = shell;
        self.screencap_timeout = screencap;
        self
    }

    pub fn from_settings(settings: &AdbSettings) -> Self {
        Self::new(settings.path.clone(), settings.serial.clone())
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Full argument list: `-s SERIAL` first when a serial is set.
    fn args<'a>(&'a self, rest: &[&'a str]) -> Vec<&'a str> {
        let mut args = Vec::with_capacity(rest.len() + 2);
        if let Some(serial) = self.serial.as_deref() {
            args.extend(["-s", serial]);
        }
        args.extend_from_slice(rest);
        args
    }

    /// Run adb and collect its output, killing it after `timeout`.
    fn run(&self, rest: &[&str], timeout: Duration) -> io::Result<Output> {
        let args = self.args(rest);
        debug!("ADB: {} {}", self.path, args.join(" "));
        let mut child = Command::new(&self.path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        // Drain both pipes while waiting; a screencap is larger than the
        // pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match child.wait_timeout(timeout) {
            Ok(Some(status)) => Ok(Output {
                status,
                stdout: collect(stdout),
                stderr: collect(stderr),
            }),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                // Readers are left detached: a grandchild may still hold
                // the pipes open.
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("adb {} timed out after {:?}", rest.join(" "), timeout),
                ))
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(e)
            }
        }
    }

    /// Run `command` in the device shell and return trimmed stdout.
    pub fn shell(&self, command: &str) -> io::Result<String> {
        let out = self.run(&["shell", command], self.shell_timeout)?;
        if !out.status.success() {
            return Err(io::Error::other(format!(
                "`{command}` exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    pub fn getprop(&self, name: &str) -> Option<String> {
        self.shell(&format!("getprop {name}")).ok()
    }

    pub fn is_connected(&self) -> bool {
        match self.run(&["devices"], self.shell_timeout) {
            Ok(out) => device_listed(&String::from_utf8_lossy(&out.stdout), self.serial()),
            Err(e) => {
                debug!("adb devices failed: {e}");
                false
            }
        }
    }
}

impl BootProbe for AdbBridge {
    fn is_booted(&self) -> bool {
        self.is_connected() && self.getprop("sys.boot_completed").as_deref() == Some("1")
    }
}

impl TextInput for AdbBridge {
    fn send_text(&self, text: &str) -> Result<(), TextInputError> {
        if !self.is_connected() {
            return Err(TextInputError::NotConnected);
        }
        self.shell(&format!("input text {}", quote_input_text(text)))
            .map(drop)
            .map_err(|e| TextInputError::Command(e.to_string()))
    }
}

/// Frame source running `screencap -p` on the device.
#[derive(Clone, Debug)]
pub struct AdbScreenCapture {
    adb: AdbBridge,
}

impl AdbScreenCapture {
    pub fn new(adb: AdbBridge) -> Self {
        Self { adb }
    }
}

impl FrameSource for AdbScreenCapture {
    fn capture(&mut self) -> Option<Frame> {
        let args = ["exec-out", "screencap", "-p"];
        let out = match self.adb.run(&args, self.adb.screencap_timeout) {
            Ok(out) => out,
            Err(e) => {
                warn!("screencap failed: {e}");
                return None;
            }
        };
        if !out.status.success() {
            warn!(
                "screencap failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
            return None;
        }
        decode_screencap(&out.stdout)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn collect(reader: JoinHandle<Vec<u8>>) -> Vec<u8> {
    reader.join().unwrap_or_default()
}

/// Decode a PNG screenshot into an RGB frame.
pub fn decode_screencap(png: &[u8]) -> Option<Frame> {
    match image::load_from_memory(png) {
        Ok(image) => {
            let rgb = image.to_rgb8();
            let (width, height) = rgb.dimensions();
            Some(Frame::new(width, height, PixelLayout::Rgb, rgb.into_raw()))
        }
        Err(e) => {
            warn!("screencap is not a decodable image ({} bytes): {e}", png.len());
            None
        }
    }
}

/// Whether `adb devices` output lists a device in the `device` state,
/// optionally a specific serial.
fn device_listed(devices: &str, serial: Option<&str>) -> bool {
    devices
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            Some((cols.next()?, cols.next()?))
        })
        .any(|(id, state)| state == "device" && serial.map_or(true, |s| s == id))
}

/// Argument for `input text`: single-quoted for the device shell, with
/// spaces as `%s` since `input` splits on them.
fn quote_input_text(text: &str) -> String {
    let encoded = text.replace(' ', "%s").replace('\'', r"'\''");
    format!("'{encoded}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = "List of devices attached\n\
                           R58M123ABC\tdevice\n\
                           emulator-5554\toffline\n\
                           0123456789\tunauthorized\n";

    #[test]
    fn any_device_online() {
        assert!(device_listed(DEVICES, None));
        assert!(!device_listed("List of devices attached\n\n", None));
    }

    #[test]
    fn serial_must_be_online() {
        assert!(device_listed(DEVICES, Some("R58M123ABC")));
        assert!(!device_listed(DEVICES, Some("emulator-5554")));
        assert!(!device_listed(DEVICES, Some("0123456789")));
        assert!(!device_listed(DEVICES, Some("R58M")));
    }

    #[test]
    fn header_line_ignored() {
        assert!(!device_listed("device device\n", None));
    }

    #[test]
    fn serial_goes_first() {
        let adb = AdbBridge::new("adb", Some("R58M123ABC".into()));
        assert_eq!(adb.args(&["shell", "id"]), ["-s", "R58M123ABC", "shell", "id"]);
        let any = AdbBridge::new("adb", None);
        assert_eq!(any.args(&["devices"]), ["devices"]);
    }

    #[test]
    fn text_spaces_and_quotes() {
        assert_eq!(quote_input_text("hello"), "'hello'");
        assert_eq!(quote_input_text("my wifi pass"), "'my%swifi%spass'");
        assert_eq!(quote_input_text("it's"), r"'it'\''s'");
    }

    #[test]
    fn screencap_png_decodes_to_rgb() {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let frame = decode_screencap(png.get_ref()).unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(frame.layout, PixelLayout::Rgb);
        assert_eq!(&frame.data[..3], &[10, 20, 30]);
        assert_eq!(frame.data.len(), 3 * 2 * 3);
    }

    #[test]
    fn garbage_screencap_is_none() {
        assert!(decode_screencap(b"error: device offline").is_none());
        assert!(decode_screencap(&[]).is_none());
    }

    /// An executable `adb` stand-in running `body` under `/bin/sh`.
    #[cfg(unix)]
    fn fake_adb(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("adb");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn stalled_screencap_is_killed_and_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let adb = AdbBridge::new(fake_adb(&dir, "sleep 20"), None)
            .with_timeouts(Duration::from_secs(1), Duration::from_millis(500));
        let mut capture = AdbScreenCapture::new(adb);

        let started = std::time::Instant::now();
        assert!(capture.capture().is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn stalled_shell_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let adb = AdbBridge::new(fake_adb(&dir, "sleep 20"), None)
            .with_timeouts(Duration::from_millis(500), Duration::from_secs(1));

        let started = std::time::Instant::now();
        let err = adb.shell("getprop sys.boot_completed").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(!adb.is_booted());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn fast_command_output_is_collected() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"case "$1" in
  devices) printf 'List of devices attached\nR58M123ABC\tdevice\n' ;;
  shell) echo 1 ;;
esac"#;
        let adb = AdbBridge::new(fake_adb(&dir, body), None);
        assert!(adb.is_connected());
        assert_eq!(adb.getprop("sys.boot_completed").as_deref(), Some("1"));
        assert!(adb.is_booted());
    }

    #[test]
    fn missing_adb_binary_is_disconnected() {
        let adb = AdbBridge::new("/nonexistent/adb-binary", None);
        assert!(!adb.is_connected());
        assert!(!adb.is_booted());
        assert!(matches!(adb.send_text("x"), Err(TextInputError::NotConnected)));
    }
}
