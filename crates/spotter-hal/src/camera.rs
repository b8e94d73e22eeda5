//! Generic `Camera` trait and supporting types for image-capture hardware.

use spotter_types::SpotterError;

/// A raw image frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data (e.g. BGR24 or greyscale).
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// Bytes per pixel implied by the buffer size, or `None` for an empty or
    /// inconsistent frame.
    pub fn channels(&self) -> Option<usize> {
        let pixels = (self.width as usize) * (self.height as usize);
        if pixels == 0 || self.data.len() % pixels != 0 {
            return None;
        }
        Some(self.data.len() / pixels)
    }
}

/// A camera or image-capture device.
///
/// Capture devices buffer frames; a caller that needs the current view
/// should read and discard stale frames first.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"webcam0"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::HardwareFault`] if the frame cannot be captured
    /// (e.g. the device is disconnected or the buffer is unavailable).
    fn capture(&mut self) -> Result<CameraFrame, SpotterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
    }

    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture(&mut self) -> Result<CameraFrame, SpotterError> {
            Ok(CameraFrame {
                width: 2,
                height: 2,
                data: vec![0u8; 4 * 3], // 2×2 BGR24
            })
        }
    }

    #[test]
    fn mock_camera_capture() {
        let mut cam = MockCamera {
            id: "webcam0".to_string(),
        };
        assert_eq!(cam.id(), "webcam0");
        let frame = cam.capture().unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.channels(), Some(3));
    }

    #[test]
    fn empty_frame_has_no_channels() {
        let frame = CameraFrame {
            width: 0,
            height: 0,
            data: vec![],
        };
        assert_eq!(frame.channels(), None);
    }
}
