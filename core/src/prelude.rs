use crate::capture::frame::EncodedFrame;
use crate::protocol::routes;
use crate::protocol::VerificationVerdict;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

/// Delay between a completed submission and the next accepted tick.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How long a verdict stays on screen before the idle message returns.
pub const DISPLAY_WINDOW: Duration = Duration::from_secs(3);

/// Which gateway operation a session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    CheckIn,
    CheckOut,
    #[serde(alias = "online-verify")]
    Online,
}

impl CaptureMode {
    pub fn default_period(self) -> Duration {
        match self {
            CaptureMode::CheckIn | CaptureMode::CheckOut => Duration::from_millis(1500),
            CaptureMode::Online => Duration::from_secs(15),
        }
    }

    pub fn idle_message(self) -> &'static str {
        match self {
            CaptureMode::CheckIn => "Ready to check IN.",
            CaptureMode::CheckOut => "Ready to check OUT.",
            CaptureMode::Online => "Camera started. Verifying your presence periodically...",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CaptureMode::CheckIn => "Attendance check IN",
            CaptureMode::CheckOut => "Attendance check OUT",
            CaptureMode::Online => "Online presence verification",
        }
    }

    /// Online mode verifies as soon as the camera is up; open mode waits one period.
    pub fn fires_immediately(self) -> bool {
        matches!(self, CaptureMode::Online)
    }

    pub fn requires_identity(self) -> bool {
        matches!(self, CaptureMode::Online)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureMode::CheckIn => "check-in",
            CaptureMode::CheckOut => "check-out",
            CaptureMode::Online => "online",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown capture mode `{0}` (expected check-in, check-out or online)")]
pub struct ParseModeError(pub String);

impl FromStr for CaptureMode {
    type Err = ParseModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "check-in" | "checkin" | "in" => Ok(CaptureMode::CheckIn),
            "check-out" | "checkout" | "out" => Ok(CaptureMode::CheckOut),
            "online" | "online-verify" => Ok(CaptureMode::Online),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Gateway operation a single submission is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitTarget {
    CheckIn,
    CheckOut,
    Online { reg_no: String },
}

impl SubmitTarget {
    pub fn route(&self) -> &'static str {
        match self {
            SubmitTarget::CheckIn => routes::MARK_IN,
            SubmitTarget::CheckOut => routes::MARK_OUT,
            SubmitTarget::Online { .. } => routes::MARK_ONLINE,
        }
    }

    pub fn reg_no(&self) -> Option<&str> {
        match self {
            SubmitTarget::Online { reg_no } => Some(reg_no),
            _ => None,
        }
    }
}

/// One encoded frame on its way to the gateway.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub target: SubmitTarget,
    pub frame: EncodedFrame,
}

/// Error taxonomy shared by the capture loop, the renderer and the gateway client.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("device access denied: {0}")]
    DeviceAccessDenied(String),
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("registration number required for online verification")]
    MissingIdentity,
    #[error("frame encoding failed: {0}")]
    Encode(String),
}

impl ClientError {
    /// Text shown in the status line when this error ends a tick.
    pub fn status_text(&self) -> String {
        match self {
            ClientError::BadRequest(message) | ClientError::UpstreamUnavailable(message) => {
                message.clone()
            }
            ClientError::DeviceAccessDenied(_) => {
                "Error: Could not access webcam. Please allow camera permissions.".into()
            }
            ClientError::TransportFailure(_) => "Error: Could not connect to server.".into(),
            ClientError::MissingIdentity => "Please enter a registration number.".into(),
            ClientError::Encode(_) => "Error: Could not encode camera frame.".into(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A still-image producer the capture loop can snapshot from.
///
/// `grab` returns `Ok(None)` while the device has no complete frame yet; the
/// capture loop treats that as a silent skip.
pub trait FrameSource {
    fn open(&mut self) -> ClientResult<()>;
    fn grab(&mut self) -> ClientResult<Option<RgbImage>>;
    fn release(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> ClientResult<()> {
        (**self).open()
    }

    fn grab(&mut self) -> ClientResult<Option<RgbImage>> {
        (**self).grab()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Anything that can turn a submission into a verdict (normally the gateway).
pub trait VerificationService: Send + Sync + 'static {
    fn verify(
        &self,
        request: SubmissionRequest,
    ) -> impl Future<Output = ClientResult<VerificationVerdict>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_aliases() {
        assert_eq!("in".parse::<CaptureMode>().unwrap(), CaptureMode::CheckIn);
        assert_eq!("Check-Out".parse::<CaptureMode>().unwrap(), CaptureMode::CheckOut);
        assert_eq!("online-verify".parse::<CaptureMode>().unwrap(), CaptureMode::Online);
        assert!("lunch".parse::<CaptureMode>().is_err());
    }

    #[test]
    fn mode_periods_follow_use_case() {
        assert_eq!(CaptureMode::CheckIn.default_period(), Duration::from_millis(1500));
        assert_eq!(CaptureMode::Online.default_period(), Duration::from_secs(15));
        assert!(CaptureMode::Online.fires_immediately());
        assert!(!CaptureMode::CheckOut.fires_immediately());
    }

    #[test]
    fn upstream_errors_surface_server_message() {
        let err = ClientError::UpstreamUnavailable("Error communicating with recognition server.".into());
        assert_eq!(err.status_text(), "Error communicating with recognition server.");
        let err = ClientError::TransportFailure("connection refused".into());
        assert!(!err.status_text().contains("refused"));
    }
}
