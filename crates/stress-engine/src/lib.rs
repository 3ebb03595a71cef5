//! Concurrent batched write engine for dbstress.
//!
//! ```text
//!            ┌──────────── dispatch ────────────┐
//!  items ──► │ shard 0 ─► writer ─► Client.send │──┐
//!            │ shard 1 ─► writer ─► Client.send │──┤  WriteResult
//!            │   ...                            │  │  (try_send)
//!            └──────────────────────────────────┘  ▼
//!                                             MultiSink ──► ErrorSink
//!                                                      ├──► StatsSink
//!                                                      └──► SummarySink
//! ```
//!
//! Writers never block on the results channel: a full channel drops the
//! result. Transport failures are data carried by [`WriteResult`]; only
//! programming errors (a zero batch size) panic.

pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod result;
pub mod sink;
pub mod tick;
pub mod writer;

pub use buffer::BatchBuffer;
pub use dispatch::{dispatch_points, dispatch_rows, shard_ranges, DispatchConfig, DispatchTotals};
pub use error::EngineError;
pub use result::WriteResult;
pub use sink::{ErrorSink, MultiSink, Sink, StatsSink, Summary, SummarySink};
pub use tick::{IntervalTick, Pacing, Tick, Unthrottled};
pub use writer::{write_points, write_rows, WriteConfig, WriterTotals, UNBOUNDED};
