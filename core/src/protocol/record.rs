use serde::{Deserialize, Serialize};
use std::fmt;

/// One historical attendance entry as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub reg_no: String,
    pub name: String,
    pub date: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: RecordType,
    pub mode: RecordMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    In,
    Out,
    /// Written by online-mode verification.
    Present,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    Offline,
    Online,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordType::In => "IN",
            RecordType::Out => "OUT",
            RecordType::Present => "PRESENT",
            RecordType::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordMode::Offline => "offline",
            RecordMode::Online => "online",
            RecordMode::Unknown => "unknown",
        };
        f.write_str(label)
    }
}
