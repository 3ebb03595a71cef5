//! Synthetic workload data for dbstress.
//!
//! This crate produces the mutable "work items" that the write engine
//! serializes and sends. Two shapes are provided:
//!
//! - [`Point`]: one line-protocol point per series key. Points are generated
//!   from a measurement, a tag template and a field template, with series-key
//!   cardinality spread across tags by prime factorization of the requested
//!   count.
//! - [`TableChunk`]: a batch of relational rows shaped by a [`TableLayout`],
//!   rendered as a single multi-row `INSERT` statement.
//!
//! ```text
//!  measurement + tags ──► SeriesTemplate ──► series keys ─┐
//!                                                          ├─► Vec<Point>
//!  fields ─────────────► FieldTemplate ───────────────────┘
//!                              │
//!                              └──► TableLayout ──► TableChunk (batch_size rows)
//! ```
//!
//! Values advance deterministically on every [`WorkItem::update`]; string
//! fields rotate through a precomputed [`StringPool`] so that high-rate
//! generation never pays for fresh random strings.

pub mod error;
pub mod fieldset;
pub mod mysql;
pub mod point;
pub mod pool;
pub mod precision;
pub mod series;

use chrono::{DateTime, Utc};

pub use error::DataError;
pub use fieldset::{FieldKind, FieldTemplate};
pub use mysql::{TableChunk, TableLayout};
pub use point::{generate_points, generate_points_from_templates, Point};
pub use pool::StringPool;
pub use precision::Precision;
pub use series::SeriesTemplate;

/// A mutable unit of synthetic payload.
///
/// The identity key and the field shape are fixed at creation. The timestamp
/// is set by the writer before every serialization and `update` advances the
/// field values so successive writes are distinguishable.
pub trait WorkItem: Send {
    /// Identity of the item (series key or table name).
    fn key(&self) -> &[u8];

    /// Stamp the item with the time of the current send cycle.
    fn set_time(&mut self, t: DateTime<Utc>);

    /// Serialize the item, including its trailing newline.
    fn write_to(&self, w: &mut dyn std::io::Write) -> std::io::Result<()>;

    /// Advance field values for the next appearance of this item.
    fn update(&mut self);
}
