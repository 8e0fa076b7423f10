use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::instruments::error::BenchError;

/// Shared cancellation flag for one panel's render loop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of rendering one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameOutcome<P> {
    /// Ask the driver for another frame on the next display refresh.
    pub reschedule: bool,
    /// Patch for the panel's own state slice, applied after the frame.
    pub writeback: Option<P>,
}

impl<P> FrameOutcome<P> {
    pub fn again() -> Self {
        Self {
            reschedule: true,
            writeback: None,
        }
    }

    pub fn settle() -> Self {
        Self {
            reschedule: false,
            writeback: None,
        }
    }

    pub fn with_writeback(mut self, patch: Option<P>) -> Self {
        self.writeback = patch;
        self
    }
}

/// Schedules one panel's frames against display refreshes.
///
/// At most one frame request is outstanding. Cancelling drops it and keeps
/// a frame that is already executing from rescheduling itself.
#[derive(Debug, Default)]
pub struct FrameDriver {
    pending: bool,
    token: CancelToken,
    frames: u64,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a request was already outstanding.
    pub fn request_frame(&mut self) -> bool {
        if self.token.is_cancelled() {
            self.token = CancelToken::new();
        }
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    pub fn cancel(&mut self) {
        if self.pending {
            log::debug!("frame request cancelled after {} frames", self.frames);
        }
        self.token.cancel();
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending && !self.token.is_cancelled()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Runs the pending frame, if any. A failed frame is not rescheduled.
    pub fn run<P, F>(&mut self, frame: F) -> Result<Option<FrameOutcome<P>>, BenchError>
    where
        F: FnOnce(&CancelToken) -> Result<FrameOutcome<P>, BenchError>,
    {
        if !self.is_pending() {
            self.pending = false;
            return Ok(None);
        }
        self.pending = false;
        let token = self.token.clone();
        let outcome = frame(&token)?;
        self.frames += 1;
        if outcome.reschedule && !token.is_cancelled() {
            self.pending = true;
        }
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_outstanding_request() {
        let mut driver = FrameDriver::new();
        assert!(driver.request_frame());
        assert!(!driver.request_frame());
        assert!(driver.is_pending());
    }

    #[test]
    fn reschedules_only_when_asked() {
        let mut driver = FrameDriver::new();
        driver.request_frame();
        let out = driver.run(|_| Ok(FrameOutcome::<()>::again())).unwrap();
        assert!(out.is_some());
        assert!(driver.is_pending());
        driver.run(|_| Ok(FrameOutcome::<()>::settle())).unwrap();
        assert!(!driver.is_pending());
        assert!(driver.run(|_| Ok(FrameOutcome::<()>::again())).unwrap().is_none());
        assert_eq!(driver.frames_rendered(), 2);
    }

    #[test]
    fn cancel_inside_frame_stops_the_loop() {
        let mut driver = FrameDriver::new();
        driver.request_frame();
        let out = driver
            .run(|token| {
                token.cancel();
                Ok(FrameOutcome::<()>::again())
            })
            .unwrap();
        assert!(out.unwrap().reschedule);
        assert!(!driver.is_pending());
    }

    #[test]
    fn cancel_drops_pending_and_request_revives() {
        let mut driver = FrameDriver::new();
        driver.request_frame();
        driver.cancel();
        assert!(!driver.is_pending());
        assert!(driver.run(|_| Ok(FrameOutcome::<()>::again())).unwrap().is_none());

        assert!(driver.request_frame());
        assert!(driver.is_pending());
        let out = driver
            .run(|token| {
                assert!(!token.is_cancelled());
                Ok(FrameOutcome::<()>::again())
            })
            .unwrap();
        assert!(out.is_some());
        assert!(driver.is_pending());
    }

    #[test]
    fn failed_frame_is_not_rescheduled() {
        let mut driver = FrameDriver::new();
        driver.request_frame();
        let err = driver.run::<(), _>(|_| Err(BenchError::Plot("boom".into())));
        assert!(err.is_err());
        assert!(!driver.is_pending());
        assert_eq!(driver.frames_rendered(), 0);
    }
}
