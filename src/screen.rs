//! Captured frames and the screen-off heuristic.

/// Byte layout of one pixel in a [`Frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgb,
    Bgr,
    Rgba,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Rgb | PixelLayout::Bgr => 3,
            PixelLayout::Rgba => 4,
        }
    }

    /// Channels that carry colour (alpha excluded).
    fn color_channels(self) -> usize {
        match self {
            PixelLayout::Rgba => 3,
            other => other.channels(),
        }
    }
}

/// One screenshot, row-major, 8 bits per channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Every channel of every pixel set to `value`.
    pub fn filled(width: u32, height: u32, layout: PixelLayout, value: u8) -> Self {
        let len = width as usize * height as usize * layout.channels();
        Self::new(width, height, layout, vec![value; len])
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Mean of all colour channel values, `0.0..=255.0`. `None` for an empty
/// frame.
///
/// Works on whatever pixels are present; a trailing partial pixel is
/// ignored and no cropping is applied.
pub fn mean_brightness(frame: &Frame) -> Option<f64> {
    let channels = frame.layout.channels();
    let color = frame.layout.color_channels();
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for px in frame.data.chunks_exact(channels) {
        for &v in &px[..color] {
            sum += u64::from(v);
        }
        count += color as u64;
    }
    if count == 0 {
        return None;
    }
    Some(sum as f64 / count as f64)
}

/// `true` when the mean brightness is strictly below `threshold`.
/// Frames with no pixels count as off.
pub fn is_screen_off(frame: &Frame, threshold: f64) -> bool {
    match mean_brightness(frame) {
        Some(mean) => mean < threshold,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCREEN_OFF_THRESHOLD;

    #[test]
    fn all_white_frame_is_on() {
        let frame = Frame::filled(64, 128, PixelLayout::Rgb, 255);
        assert!(!is_screen_off(&frame, SCREEN_OFF_THRESHOLD));
    }

    #[test]
    fn all_black_frame_is_off() {
        let frame = Frame::filled(64, 128, PixelLayout::Bgr, 0);
        assert!(is_screen_off(&frame, SCREEN_OFF_THRESHOLD));
    }

    #[test]
    fn threshold_is_strict() {
        let frame = Frame::filled(4, 4, PixelLayout::Gray, 10);
        assert!(!is_screen_off(&frame, 10.0));
        assert!(is_screen_off(&frame, 10.5));
    }

    #[test]
    fn alpha_channel_is_ignored() {
        // Black pixels with opaque alpha.
        let data = [0, 0, 0, 255].repeat(16);
        let frame = Frame::new(4, 4, PixelLayout::Rgba, data);
        assert_eq!(mean_brightness(&frame), Some(0.0));
        assert!(is_screen_off(&frame, SCREEN_OFF_THRESHOLD));
    }

    #[test]
    fn mean_is_over_all_channels() {
        // One white pixel, one black pixel.
        let frame = Frame::new(2, 1, PixelLayout::Rgb, vec![255, 255, 255, 0, 0, 0]);
        assert_eq!(mean_brightness(&frame), Some(127.5));
    }

    #[test]
    fn empty_frame_is_off() {
        let frame = Frame::new(0, 0, PixelLayout::Rgb, Vec::new());
        assert_eq!(mean_brightness(&frame), None);
        assert!(is_screen_off(&frame, SCREEN_OFF_THRESHOLD));
    }

    #[test]
    fn odd_sizes_are_tolerated() {
        // Dimensions that disagree with the buffer are not an error.
        let frame = Frame::new(3, 7, PixelLayout::Rgb, vec![200; 10]);
        assert_eq!(mean_brightness(&frame), Some(200.0));
    }
}
