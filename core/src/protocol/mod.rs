pub mod record;
pub mod routes;
pub mod verdict;

pub use record::{AttendanceRecord, RecordMode, RecordType};
pub use routes::ErrorBody;
pub use verdict::{FaceBox, VerificationVerdict};
