//! View-models for the verdict overlay, the status line and the history table.
//!
//! Nothing here draws; the kiosk turns these into canvas geometry and widgets.

pub mod display;
pub mod history;
pub mod overlay;

pub use display::{ResultDisplay, StatusLine, Tone};
pub use history::{HistoryRow, HistoryTable, HistoryView, HistoryViewer};
pub use overlay::{Overlay, OverlayColor};
