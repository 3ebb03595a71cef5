//! Line-protocol points.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::DataError;
use crate::fieldset::{FieldKind, FieldTemplate};
use crate::pool::{PoolCursor, StringPool};
use crate::precision::Precision;
use crate::series::SeriesTemplate;
use crate::WorkItem;

#[derive(Debug, Clone)]
enum FieldValue {
    Int(i64),
    Float(f64),
    Str(PoolCursor),
}

#[derive(Debug, Clone)]
struct Field {
    key: Arc<str>,
    value: FieldValue,
}

/// One series with its fields and the timestamp of the current cycle.
#[derive(Debug, Clone)]
pub struct Point {
    series_key: Vec<u8>,
    fields: Vec<Field>,
    timestamp: i64,
    precision: Precision,
}

impl Point {
    pub fn new(
        series_key: Vec<u8>,
        template: &FieldTemplate,
        pool: &StringPool,
        precision: Precision,
    ) -> Self {
        let fields = template
            .fields()
            .iter()
            .enumerate()
            .map(|(i, spec)| Field {
                key: Arc::from(spec.key.as_str()),
                value: match spec.kind {
                    FieldKind::Int => FieldValue::Int(0),
                    FieldKind::Float => FieldValue::Float(0.0),
                    FieldKind::Str => FieldValue::Str(pool.cursor(i)),
                },
            })
            .collect();

        Self {
            series_key,
            fields,
            timestamp: 0,
            precision,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Render the point as one line-protocol line.
    pub fn to_line(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl WorkItem for Point {
    fn key(&self) -> &[u8] {
        &self.series_key
    }

    fn set_time(&mut self, t: DateTime<Utc>) {
        self.timestamp = self.precision.timestamp(&t);
    }

    fn write_to(&self, w: &mut dyn Write) -> std::io::Result<()> {
        w.write_all(&self.series_key)?;
        for (i, field) in self.fields.iter().enumerate() {
            w.write_all(if i == 0 { b" " } else { b"," })?;
            w.write_all(field.key.as_bytes())?;
            match &field.value {
                FieldValue::Int(v) => write!(w, "={v}i")?,
                FieldValue::Float(v) => write!(w, "={v}")?,
                FieldValue::Str(cursor) => {
                    w.write_all(b"=\"")?;
                    write_escaped(w, cursor.current())?;
                    w.write_all(b"\"")?;
                }
            }
        }
        writeln!(w, " {}", self.timestamp)
    }

    fn update(&mut self) {
        for field in &mut self.fields {
            match &mut field.value {
                FieldValue::Int(v) => *v = v.wrapping_add(1),
                FieldValue::Float(v) => *v += 1.0,
                FieldValue::Str(cursor) => cursor.advance(),
            }
        }
    }
}

fn write_escaped(w: &mut dyn Write, s: &str) -> std::io::Result<()> {
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            w.write_all(b"\\")?;
        }
        w.write_all(&[b])?;
    }
    Ok(())
}

/// Build `count` points shaped by `series` and `fields`.
pub fn generate_points(
    series: &SeriesTemplate,
    fields: &FieldTemplate,
    count: usize,
    precision: Precision,
    pool: &StringPool,
) -> Vec<Point> {
    series
        .keys(count)
        .into_iter()
        .map(|key| Point::new(key, fields, pool, precision))
        .collect()
}

/// Convenience wrapper parsing the templates first.
pub fn generate_points_from_templates(
    measurement: &str,
    tags: &str,
    fields: &str,
    count: usize,
    precision: Precision,
    pool: &StringPool,
) -> Result<Vec<Point>, DataError> {
    let series = SeriesTemplate::new(measurement, tags)?;
    let fields = FieldTemplate::parse(fields)?;
    Ok(generate_points(&series, &fields, count, precision, pool))
}
