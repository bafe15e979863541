//! Route names, multipart field names and canned messages shared by the
//! gateway and its clients.

use serde::{Deserialize, Serialize};

pub const MARK_IN: &str = "mark_in";
pub const MARK_OUT: &str = "mark_out";
pub const MARK_ONLINE: &str = "mark_online";
pub const GET_HISTORY: &str = "get_history";

pub const IMAGE_FIELD: &str = "image";
pub const REG_NO_FIELD: &str = "reg_no";

pub const CAPTURE_FILENAME: &str = "capture.jpg";
pub const CAPTURE_CONTENT_TYPE: &str = "image/jpeg";

pub const NO_IMAGE_MESSAGE: &str = "No image file provided.";
pub const MISSING_FIELDS_MESSAGE: &str = "Missing image or registration number.";
pub const UPLOAD_TOO_LARGE_MESSAGE: &str = "Uploaded image is too large.";

pub fn upstream_message(backend_label: &str) -> String {
    format!("Error communicating with {} server.", backend_label)
}

/// Body of every reply the gateway synthesizes itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
