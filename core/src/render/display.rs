use crate::prelude::{CaptureMode, ClientError, DISPLAY_WINDOW};
use crate::protocol::VerificationVerdict;
use crate::render::overlay::Overlay;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub tone: Tone,
}

impl StatusLine {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// Status text and overlay for the latest verdict.
///
/// A verdict stays up for the display window, then the mode's idle message
/// returns and the overlay clears. A newer verdict pushes the deadline out,
/// so an older window can never wipe it. Errors replace the text but leave
/// any running window alone.
#[derive(Debug, Clone)]
pub struct ResultDisplay {
    idle: StatusLine,
    status: StatusLine,
    overlay: Option<Overlay>,
    window: Duration,
    expires_at: Option<Instant>,
}

impl ResultDisplay {
    pub fn new(mode: CaptureMode) -> Self {
        Self::with_window(mode, DISPLAY_WINDOW)
    }

    pub fn with_window(mode: CaptureMode, window: Duration) -> Self {
        let idle = StatusLine::new(mode.idle_message(), Tone::Neutral);
        Self {
            status: idle.clone(),
            idle,
            overlay: None,
            window,
            expires_at: None,
        }
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Shows a verdict and returns when it should be cleared.
    pub fn show_verdict(&mut self, verdict: &VerificationVerdict, now: Instant) -> Instant {
        let tone = if verdict.success {
            Tone::Success
        } else {
            Tone::Failure
        };
        self.status = StatusLine::new(verdict.message.clone(), tone);
        self.overlay = Overlay::from_verdict(verdict);
        let deadline = now + self.window;
        self.expires_at = Some(deadline);
        deadline
    }

    pub fn show_error(&mut self, error: &ClientError) {
        self.status = StatusLine::new(error.status_text(), Tone::Failure);
    }

    pub fn show_pending(&mut self, text: impl Into<String>) {
        self.status = StatusLine::new(text, Tone::Pending);
    }

    /// Free-form message with no expiry (camera state changes, prompts).
    pub fn show_message(&mut self, text: impl Into<String>, tone: Tone) {
        self.status = StatusLine::new(text, tone);
    }

    /// Reverts to idle once the current window has elapsed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) if now >= deadline => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.status = self.idle.clone();
        self.overlay = None;
        self.expires_at = None;
    }
}
