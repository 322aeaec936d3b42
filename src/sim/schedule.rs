//! Resumable timed continuations
//!
//! Waits are not blocking calls. A component records where it will pick up
//! again and when, and the owner polls the schedule each tick with the
//! current clock. Cancelling drops the pending step.

/// A step to resume at a given time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resume<S> {
    pub at: f64,
    pub step: S,
}

/// At most one pending continuation
#[derive(Debug, Clone)]
pub struct Schedule<S> {
    pending: Option<Resume<S>>,
}

impl<S> Default for Schedule<S> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<S: Copy> Schedule<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending step with `step` due at `at`
    pub fn at(&mut self, at: f64, step: S) {
        self.pending = Some(Resume { at, step });
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending step if it is due by `now`
    pub fn poll(&mut self, now: f64) -> Option<Resume<S>> {
        match self.pending {
            Some(resume) if resume.at <= now => self.pending.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_waits_until_due() {
        let mut schedule = Schedule::new();
        schedule.at(2.0, 'a');
        assert_eq!(schedule.poll(1.5), None);
        assert!(schedule.is_pending());
        assert_eq!(schedule.poll(2.0), Some(Resume { at: 2.0, step: 'a' }));
        assert_eq!(schedule.poll(3.0), None);
    }

    #[test]
    fn test_cancel_and_replace() {
        let mut schedule = Schedule::new();
        schedule.at(1.0, 1u8);
        schedule.at(5.0, 2u8);
        assert_eq!(schedule.poll(1.0), None);
        schedule.cancel();
        assert!(!schedule.is_pending());
        assert_eq!(schedule.poll(10.0), None);
    }
}
