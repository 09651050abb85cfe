use super::{Record, RecordValue, Recorder};
use itertools::Itertools;
use log::info;

/// Dumps each record as an aligned key/value table through [`log::info!`].
///
/// ```text
/// -------------------------------------
/// | explained_variance | 0.1523       |
/// | fps                | 1830         |
/// | nupdates           | 100          |
/// -------------------------------------
/// ```
#[derive(Default)]
pub struct TabularRecorder {}

impl TabularRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self {}
    }

    fn format_value(v: &RecordValue) -> String {
        match v {
            RecordValue::Scalar(v) if v.fract() == 0.0 && v.abs() < 1e9 => format!("{}", *v as i64),
            RecordValue::Scalar(v) => format!("{:.4}", v),
        }
    }

    /// Renders the record as lines of a table, rows sorted by key.
    pub fn render(record: &Record) -> Vec<String> {
        let rows = record
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(k, v)| (k.clone(), Self::format_value(v)))
            .collect::<Vec<_>>();
        let kw = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        let vw = rows.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let dashes = "-".repeat(kw + vw + 7);

        let mut lines = Vec::with_capacity(rows.len() + 2);
        lines.push(dashes.clone());
        for (k, v) in rows {
            lines.push(format!("| {:<kw$} | {:<vw$} |", k, v, kw = kw, vw = vw));
        }
        lines.push(dashes);
        lines
    }
}

impl Recorder for TabularRecorder {
    fn write(&mut self, record: Record) {
        if record.is_empty() {
            return;
        }
        for line in Self::render(&record) {
            info!("{}", line);
        }
    }
}
