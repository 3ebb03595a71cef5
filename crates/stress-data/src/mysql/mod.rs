//! Relational table shape and row chunks.

mod chunk;
mod layout;

pub use chunk::TableChunk;
pub use layout::TableLayout;
