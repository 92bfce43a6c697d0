//! Owned camera frame handed to the detection pipeline.

/// A single video frame: opaque pixel buffer plus the metadata a classifier
/// backend needs to interpret it.
///
/// Frames are owned transiently by the pipeline for the duration of one
/// analysis and are released back to their source when dropped. The release
/// hook runs exactly once, on every exit path — cadence skip, busy skip,
/// classification success, classification failure, and unwind alike — because
/// it is tied to `Drop`.
pub struct Frame {
    /// Producer-assigned sequence number, monotonically increasing.
    seq: u64,
    /// Width in pixels.
    width: u32,
    /// Height in pixels.
    height: u32,
    /// Clockwise rotation to apply before interpretation (0, 90, 180, 270).
    rotation_degrees: u32,
    /// Raw pixel data. The pipeline never interprets this; only classifier
    /// backends do.
    pixels: Vec<u8>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Frame {
    pub fn new(seq: u64, width: u32, height: u32, rotation_degrees: u32, pixels: Vec<u8>) -> Self {
        Self {
            seq,
            width,
            height,
            rotation_degrees,
            pixels,
            release: None,
        }
    }

    /// Attaches a hook that runs when the frame is released.
    ///
    /// Camera integrations use this to return the underlying buffer to the
    /// capture pool; tests use it to observe the release-exactly-once
    /// guarantee.
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rotation_degrees(&self) -> u32 {
        self.rotation_degrees
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns true if the frame carries no pixel data.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("seq", &self.seq)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation_degrees", &self.rotation_degrees)
            .field("bytes", &self.pixels.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn release_hook_runs_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let frame = Frame::new(1, 640, 480, 0, vec![0u8; 16]).on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(frame);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn frame_without_hook_drops_quietly() {
        let frame = Frame::new(2, 320, 240, 90, Vec::new());
        assert!(frame.is_empty());
        drop(frame);
    }
}
