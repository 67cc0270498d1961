//! Host environment integration
//!
//! The exporter only needs a handful of calls from the application it runs
//! in: a mode switch, timeline access and progress reporting.

use std::ops::{Deref, DerefMut};

pub trait Host {
    /// Leave any edit mode so that gathered data is up to date
    fn ensure_object_mode(&mut self) {}

    fn current_frame(&self) -> i32;

    fn set_frame(&mut self, frame: i32);

    fn progress_begin(&mut self, _min: u32, _max: u32) {}

    fn progress_update(&mut self, _value: u32) {}

    fn progress_end(&mut self) {}
}

/// Restores the timeline position captured at construction.
///
/// Restoration happens exactly once: either through [`FrameGuard::restore`]
/// or when the guard is dropped, including on early returns.
pub struct FrameGuard<'a> {
    host: &'a mut dyn Host,
    original: i32,
    restored: bool,
}

impl<'a> FrameGuard<'a> {
    pub fn capture(host: &'a mut dyn Host) -> Self {
        let original = host.current_frame();
        Self {
            host,
            original,
            restored: false,
        }
    }

    /// Frame captured on entry
    pub fn original_frame(&self) -> i32 {
        self.original
    }

    pub fn restore(&mut self) {
        if !self.restored {
            self.host.set_frame(self.original);
            self.restored = true;
        }
    }
}

impl<'a> Deref for FrameGuard<'a> {
    type Target = dyn Host + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.host
    }
}

impl<'a> DerefMut for FrameGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.host
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Host for command line use: an in-memory timeline, progress to the log
#[derive(Debug, Default)]
pub struct HeadlessHost {
    frame: i32,
}

impl HeadlessHost {
    pub fn new(frame: i32) -> Self {
        Self { frame }
    }
}

impl Host for HeadlessHost {
    fn current_frame(&self) -> i32 {
        self.frame
    }

    fn set_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    fn progress_begin(&mut self, min: u32, max: u32) {
        tracing::debug!("Progress {}..{}", min, max);
    }

    fn progress_update(&mut self, value: u32) {
        tracing::debug!("Progress {}%", value);
    }
}
