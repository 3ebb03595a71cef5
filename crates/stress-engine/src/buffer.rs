//! Batch buffer with optional gzip compression.

use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use stress_data::WorkItem;

enum Encoder {
    Plain(Vec<u8>),
    Gzip(GzEncoder<Vec<u8>>),
}

/// Accumulates serialized items until the batch is taken.
pub struct BatchBuffer {
    level: i32,
    encoder: Encoder,
    items: u64,
}

impl BatchBuffer {
    /// `level == 0` disables compression, `-1` selects the default level.
    pub fn new(level: i32) -> Self {
        Self {
            level,
            encoder: encoder(level),
            items: 0,
        }
    }

    pub fn push<T: WorkItem + ?Sized>(&mut self, item: &T) -> io::Result<()> {
        let writer: &mut dyn Write = match &mut self.encoder {
            Encoder::Plain(buf) => buf,
            Encoder::Gzip(gz) => gz,
        };
        item.write_to(writer)?;
        self.items += 1;
        Ok(())
    }

    /// Items pushed since the last [`take`](Self::take).
    pub fn items(&self) -> u64 {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    /// Finish the current batch and start a fresh one.
    pub fn take(&mut self) -> io::Result<Vec<u8>> {
        self.items = 0;
        match std::mem::replace(&mut self.encoder, encoder(self.level)) {
            Encoder::Plain(buf) => Ok(buf),
            Encoder::Gzip(gz) => gz.finish(),
        }
    }

    /// Drop the current batch without sending it.
    pub fn discard(&mut self) {
        self.items = 0;
        self.encoder = encoder(self.level);
    }
}

fn encoder(level: i32) -> Encoder {
    match level {
        0 => Encoder::Plain(Vec::new()),
        l if l < 0 => Encoder::Gzip(GzEncoder::new(Vec::new(), Compression::default())),
        l => Encoder::Gzip(GzEncoder::new(Vec::new(), Compression::new(l.min(9) as u32))),
    }
}
