//! Summary table collected across cases.

use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

/// Columns of one case row.
pub const CASE_COLUMNS: [&str; 11] = [
    "case",
    "connection",
    "action",
    "concur",
    "batch",
    "start",
    "run",
    "throughput",
    "points",
    "errors",
    "avg-lat",
];

/// Accepts a header once, then rows of the same width.
#[derive(Debug, Clone, Default)]
pub struct Report {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report with the case columns already set.
    pub fn for_cases() -> Self {
        let mut report = Self::new();
        report.set_header(CASE_COLUMNS.iter().map(|c| c.to_string()).collect());
        report
    }

    pub fn set_header(&mut self, header: Vec<String>) {
        self.header = header;
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Append a row. Rows whose width differs from the header are rejected.
    pub fn append(&mut self, row: Vec<String>) -> anyhow::Result<()> {
        if row.len() != self.header.len() {
            anyhow::bail!(
                "Report row has {} columns, header has {}",
                row.len(),
                self.header.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(self.header.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
        for row in &self.rows {
            table.add_row(row.iter().map(Cell::new));
        }
        table.to_string()
    }
}
