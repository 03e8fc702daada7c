//! zlib inflate with chunked output.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{CacheError, Result};

/// Output grows by this much per round
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Produces the decompressed payload or a codec error.
pub trait Decompressor: Send + Sync {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Streaming zlib decoder.
///
/// A stream that ends before its end marker is an error, not a short read.
#[derive(Debug, Clone, Copy)]
pub struct ZlibDecompressor {
    chunk_size: usize,
}

impl ZlibDecompressor {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(64),
        }
    }
}

impl Default for ZlibDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for ZlibDecompressor {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut stream = Decompress::new(true);
        let mut out = Vec::with_capacity(self.chunk_size);

        loop {
            if out.len() == out.capacity() {
                out.reserve(self.chunk_size);
            }
            let before_in = stream.total_in();
            let before_out = stream.total_out();
            let consumed = before_in as usize;

            let status =
                stream.decompress_vec(&input[consumed..], &mut out, FlushDecompress::None)?;
            if status == Status::StreamEnd {
                break;
            }

            let progressed = stream.total_in() != before_in || stream.total_out() != before_out;
            if !progressed && out.len() < out.capacity() {
                return Err(CacheError::DecompressionFailed(format!(
                    "stream truncated after {} of {} input bytes",
                    consumed,
                    input.len()
                )));
            }
        }

        out.shrink_to_fit();
        Ok(out)
    }
}
