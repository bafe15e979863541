use crate::capture::frame::CaptureFrame;
use crate::prelude::{CaptureMode, ClientError, ClientResult, SubmitTarget};
use crate::protocol::VerificationVerdict;
use image::RgbImage;

/// Lifecycle of one camera-driven session.
///
/// `Capturing` and `Settling` both count as busy: a tick in either state is
/// skipped without touching the frame source or the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Ready,
    Capturing(Ticket),
    Settling(Ticket),
}

/// Identifies one accepted tick. Stale tickets (from before a stop) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    epoch: u64,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Idle,
    Busy,
    NoFrame,
}

#[derive(Debug)]
pub enum TickDecision {
    Skip(SkipReason),
    Capture(Ticket, CaptureFrame),
}

#[derive(Debug)]
pub struct Session {
    mode: CaptureMode,
    identity: Option<String>,
    state: SessionState,
    epoch: u64,
    seq: u64,
    last_result: Option<VerificationVerdict>,
}

impl Session {
    /// Online mode needs a non-blank identity, reused for every capture.
    pub fn new(mode: CaptureMode, identity: Option<String>) -> ClientResult<Self> {
        let identity = identity
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if mode.requires_identity() && identity.is_none() {
            return Err(ClientError::MissingIdentity);
        }
        Ok(Self {
            mode,
            identity: if mode.requires_identity() { identity } else { None },
            state: SessionState::Idle,
            epoch: 0,
            seq: 0,
            last_result: None,
        })
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != SessionState::Idle
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            SessionState::Capturing(_) | SessionState::Settling(_)
        )
    }

    pub fn last_result(&self) -> Option<&VerificationVerdict> {
        self.last_result.as_ref()
    }

    /// Idle -> Active. Call only after the camera was acquired.
    pub fn start(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Ready;
        }
    }

    /// Active -> Idle. Outstanding tickets become stale.
    pub fn stop(&mut self) {
        self.state = SessionState::Idle;
        self.epoch += 1;
    }

    /// Runs the tick guards, then snapshots a frame through `grab`.
    ///
    /// `grab` is only called when the session is ready, so a busy tick never
    /// touches the device.
    pub fn try_begin<F>(&mut self, grab: F) -> ClientResult<TickDecision>
    where
        F: FnOnce() -> ClientResult<Option<RgbImage>>,
    {
        match self.state {
            SessionState::Idle => return Ok(TickDecision::Skip(SkipReason::Idle)),
            SessionState::Capturing(_) | SessionState::Settling(_) => {
                return Ok(TickDecision::Skip(SkipReason::Busy))
            }
            SessionState::Ready => {}
        }

        let Some(image) = grab()? else {
            return Ok(TickDecision::Skip(SkipReason::NoFrame));
        };

        self.seq += 1;
        let ticket = Ticket {
            epoch: self.epoch,
            seq: self.seq,
        };
        self.state = SessionState::Capturing(ticket);
        Ok(TickDecision::Capture(ticket, CaptureFrame::new(image)))
    }

    pub fn submission_target(&self) -> SubmitTarget {
        match (self.mode, &self.identity) {
            (CaptureMode::CheckIn, _) => SubmitTarget::CheckIn,
            (CaptureMode::CheckOut, _) => SubmitTarget::CheckOut,
            (CaptureMode::Online, identity) => SubmitTarget::Online {
                reg_no: identity.clone().unwrap_or_default(),
            },
        }
    }

    /// Marks the submission finished and enters the settle delay.
    ///
    /// Returns `false` when the ticket is stale; the outcome is then discarded.
    pub fn complete(&mut self, ticket: Ticket, verdict: Option<VerificationVerdict>) -> bool {
        if self.state != SessionState::Capturing(ticket) {
            return false;
        }
        if let Some(verdict) = verdict {
            self.last_result = Some(verdict);
        }
        self.state = SessionState::Settling(ticket);
        true
    }

    /// Settle delay elapsed: accept ticks again.
    pub fn settle(&mut self, ticket: Ticket) -> bool {
        if self.state != SessionState::Settling(ticket) {
            return false;
        }
        self.state = SessionState::Ready;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame() -> ClientResult<Option<RgbImage>> {
        Ok(Some(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]))))
    }

    fn begin(session: &mut Session) -> Ticket {
        match session.try_begin(frame).unwrap() {
            TickDecision::Capture(ticket, _) => ticket,
            TickDecision::Skip(reason) => panic!("unexpected skip {:?}", reason),
        }
    }

    #[test]
    fn online_mode_requires_identity() {
        assert_eq!(
            Session::new(CaptureMode::Online, Some("   ".into())).unwrap_err(),
            ClientError::MissingIdentity
        );
        let session = Session::new(CaptureMode::Online, Some(" R7 ".into())).unwrap();
        assert_eq!(
            session.submission_target(),
            SubmitTarget::Online { reg_no: "R7".into() }
        );
    }

    #[test]
    fn open_mode_drops_identity() {
        let session = Session::new(CaptureMode::CheckOut, Some("R7".into())).unwrap();
        assert!(session.identity().is_none());
        assert_eq!(session.submission_target(), SubmitTarget::CheckOut);
    }

    #[test]
    fn idle_session_skips_without_grabbing() {
        let mut session = Session::new(CaptureMode::CheckIn, None).unwrap();
        let decision = session
            .try_begin(|| panic!("idle session must not grab"))
            .unwrap();
        assert!(matches!(decision, TickDecision::Skip(SkipReason::Idle)));
    }

    #[test]
    fn busy_ticks_skip_until_settled() {
        let mut session = Session::new(CaptureMode::CheckIn, None).unwrap();
        session.start();
        let ticket = begin(&mut session);
        assert!(session.is_busy());

        let decision = session
            .try_begin(|| panic!("busy session must not grab"))
            .unwrap();
        assert!(matches!(decision, TickDecision::Skip(SkipReason::Busy)));

        assert!(session.complete(ticket, Some(VerificationVerdict::default())));
        assert!(session.is_busy());
        assert!(matches!(
            session.try_begin(frame).unwrap(),
            TickDecision::Skip(SkipReason::Busy)
        ));

        assert!(session.settle(ticket));
        assert!(!session.is_busy());
        begin(&mut session);
    }

    #[test]
    fn missing_frame_leaves_session_ready() {
        let mut session = Session::new(CaptureMode::CheckIn, None).unwrap();
        session.start();
        assert!(matches!(
            session.try_begin(|| Ok(None)).unwrap(),
            TickDecision::Skip(SkipReason::NoFrame)
        ));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn completion_after_stop_is_discarded() {
        let mut session = Session::new(CaptureMode::CheckIn, None).unwrap();
        session.start();
        let ticket = begin(&mut session);
        session.stop();
        session.start();

        let verdict = VerificationVerdict {
            message: "late".into(),
            ..Default::default()
        };
        assert!(!session.complete(ticket, Some(verdict)));
        assert!(session.last_result().is_none());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn failed_submission_keeps_previous_verdict() {
        let mut session = Session::new(CaptureMode::CheckIn, None).unwrap();
        session.start();
        let first = begin(&mut session);
        let verdict = VerificationVerdict {
            message: "Checked in".into(),
            success: true,
            ..Default::default()
        };
        session.complete(first, Some(verdict));
        session.settle(first);

        let second = begin(&mut session);
        assert!(session.complete(second, None));
        assert_eq!(session.last_result().unwrap().message, "Checked in");
    }
}
