pub mod frame;
pub mod runner;
pub mod session;

pub use frame::{CaptureFrame, EncodedFrame, StillFrameSource, DEFAULT_JPEG_QUALITY};
pub use image::RgbImage;
pub use runner::{CaptureEvent, CaptureLoop, CaptureTiming};
pub use session::{Session, SessionState, SkipReason, TickDecision, Ticket};
