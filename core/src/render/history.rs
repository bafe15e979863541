use crate::prelude::{ClientError, ClientResult};
use crate::protocol::{AttendanceRecord, RecordType};

pub const LOADING_MESSAGE: &str = "Loading...";
pub const NO_RECORDS_MESSAGE: &str = "No records found for this registration number.";
pub const FETCH_ERROR_MESSAGE: &str = "Error fetching data.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub date: String,
    pub time: String,
    pub status: String,
    pub kind: RecordType,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTable {
    pub heading: String,
    pub rows: Vec<HistoryRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryView {
    Blank,
    Loading,
    Empty,
    Table(HistoryTable),
    Failed(String),
}

impl HistoryView {
    /// Rows keep the backend's order.
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let Some(first) = records.first() else {
            return HistoryView::Empty;
        };
        let rows = records
            .iter()
            .map(|record| HistoryRow {
                date: record.date.clone(),
                time: record.time.clone(),
                status: record.kind.to_string(),
                kind: record.kind,
                mode: record.mode.to_string(),
            })
            .collect();
        HistoryView::Table(HistoryTable {
            heading: format!("History for {} ({})", first.name, first.reg_no),
            rows,
        })
    }

    pub fn from_error(error: &ClientError) -> Self {
        match error {
            ClientError::TransportFailure(_) => HistoryView::Failed(FETCH_ERROR_MESSAGE.into()),
            other => HistoryView::Failed(other.status_text()),
        }
    }
}

/// Tracks the latest lookup so a slow earlier response cannot overwrite it.
#[derive(Debug)]
pub struct HistoryViewer {
    view: HistoryView,
    generation: u64,
}

impl HistoryViewer {
    pub fn new() -> Self {
        Self {
            view: HistoryView::Blank,
            generation: 0,
        }
    }

    pub fn view(&self) -> &HistoryView {
        &self.view
    }

    /// Validates the key and enters the loading state.
    ///
    /// Returns the request generation and the trimmed key to look up.
    pub fn begin(&mut self, input: &str) -> ClientResult<(u64, String)> {
        let key = input.trim();
        if key.is_empty() {
            return Err(ClientError::MissingIdentity);
        }
        self.generation += 1;
        self.view = HistoryView::Loading;
        Ok((self.generation, key.to_string()))
    }

    pub fn finish(&mut self, generation: u64, result: ClientResult<Vec<AttendanceRecord>>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.view = match result {
            Ok(records) => HistoryView::from_records(&records),
            Err(err) => HistoryView::from_error(&err),
        };
        true
    }
}

impl Default for HistoryViewer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RecordMode;

    fn record(kind: RecordType, time: &str) -> AttendanceRecord {
        AttendanceRecord {
            reg_no: "R1".into(),
            name: "Asha".into(),
            date: "2024-01-01".into(),
            time: time.into(),
            kind,
            mode: RecordMode::Offline,
        }
    }

    #[test]
    fn records_render_in_backend_order() {
        let view = HistoryView::from_records(&[
            record(RecordType::Out, "17:00"),
            record(RecordType::In, "09:00"),
        ]);
        let HistoryView::Table(table) = view else {
            panic!("expected table");
        };
        assert_eq!(table.heading, "History for Asha (R1)");
        assert_eq!(table.rows[0].status, "OUT");
        assert_eq!(table.rows[1].time, "09:00");
        assert_eq!(table.rows[1].mode, "offline");
    }

    #[test]
    fn empty_history_is_not_a_table() {
        assert_eq!(HistoryView::from_records(&[]), HistoryView::Empty);
    }

    #[test]
    fn transport_and_upstream_failures_differ() {
        let transport = HistoryView::from_error(&ClientError::TransportFailure("dns".into()));
        let upstream = HistoryView::from_error(&ClientError::UpstreamUnavailable(
            "Error communicating with recognition server.".into(),
        ));
        assert_eq!(transport, HistoryView::Failed(FETCH_ERROR_MESSAGE.into()));
        assert_ne!(transport, upstream);
    }

    #[test]
    fn blank_key_is_refused_locally() {
        let mut viewer = HistoryViewer::new();
        assert_eq!(viewer.begin("   ").unwrap_err(), ClientError::MissingIdentity);
        assert_eq!(viewer.view(), &HistoryView::Blank);
    }

    #[test]
    fn stale_response_is_ignored() {
        let mut viewer = HistoryViewer::new();
        let (first, _) = viewer.begin("R1").unwrap();
        let (second, key) = viewer.begin(" R2 ").unwrap();
        assert_eq!(key, "R2");
        assert!(!viewer.finish(first, Ok(vec![record(RecordType::In, "09:00")])));
        assert_eq!(viewer.view(), &HistoryView::Loading);
        assert!(viewer.finish(second, Ok(Vec::new())));
        assert_eq!(viewer.view(), &HistoryView::Empty);
    }
}
