use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::layout::TableLayout;
use crate::pool::{PoolCursor, StringPool};
use crate::WorkItem;

/// A batch of rows sent as one multi-row `INSERT`.
///
/// Rows are regenerated as a whole on every [`WorkItem::update`]; the
/// database assigns `id` and `create_time`, so `set_time` is a no-op.
#[derive(Debug, Clone)]
pub struct TableChunk {
    layout: Arc<TableLayout>,
    rows: Vec<String>,
    int_value: i64,
    float_value: f64,
    text: PoolCursor,
}

impl TableChunk {
    pub fn new(layout: Arc<TableLayout>, batch_size: usize, pool: &StringPool) -> Self {
        let mut chunk = Self {
            layout,
            rows: vec![String::new(); batch_size],
            int_value: 0,
            float_value: 0.0,
            text: pool.cursor(0),
        };
        chunk.regenerate();
        chunk
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Shrink to at most `n` rows.
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    pub fn insert_statement(&self) -> String {
        format!(
            "INSERT INTO {} VALUES {};",
            self.layout.name(),
            self.rows.join(",")
        )
    }

    fn regenerate(&mut self) {
        for (i, row) in self.rows.iter_mut().enumerate() {
            *row = self.layout.row_values(
                self.int_value.wrapping_add(i as i64),
                self.float_value,
                self.text.current(),
                i,
            );
        }
    }
}

impl WorkItem for TableChunk {
    fn key(&self) -> &[u8] {
        self.layout.name().as_bytes()
    }

    fn set_time(&mut self, _t: DateTime<Utc>) {}

    fn write_to(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.insert_statement())
    }

    fn update(&mut self) {
        self.int_value = self.int_value.wrapping_add(1);
        self.float_value += 0.1;
        self.text.advance();
        self.regenerate();
    }
}
