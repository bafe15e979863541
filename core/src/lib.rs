//! Client-side capture pipeline and wire protocol for the face attendance kiosk.
//!
//! The capture loop grabs still frames on a fixed period, never keeps more
//! than one submission in flight, and hands verdicts to the renderer
//! view-models. The gateway binary and the kiosk binary both build on the
//! protocol types defined here.

pub mod capture;
pub mod gateway_client;
pub mod prelude;
pub mod protocol;
pub mod render;
pub mod telemetry;

pub use prelude::{CaptureMode, ClientError, ClientResult, FrameSource, VerificationService};
