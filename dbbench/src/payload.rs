//! Compressible values for write benchmarks.
//!
//! Synthesizing a fresh value for each of several hundred thousand writes would dominate the
//! measurement, so [`PayloadGenerator`] builds one buffer up front and hands out windows into it.

use crate::random::Random;

/// Size of the pre-built payload buffer.
pub const PAYLOAD_CAPACITY: usize = 1024 * 1024;

/// Length of the compressible pieces the buffer is assembled from.
const CHUNK_LEN: usize = 100;

/// Seed of the payload stream, independent of the key-selection stream.
const PAYLOAD_SEED: u32 = 301;

/// Serves fixed-length values out of a pre-built, partially compressible buffer.
///
/// The buffer consists of 100-byte chunks. Each chunk repeats a random string of
/// `100 * compression_ratio` printable characters, so a compressor can shrink the buffer to
/// roughly the requested fraction of its size.
#[derive(Debug)]
pub struct PayloadGenerator {
    data: Vec<u8>,
    pos: usize,
}

impl PayloadGenerator {
    /// Creates a generator with a buffer of [`PAYLOAD_CAPACITY`] bytes.
    pub fn new(compression_ratio: f64) -> Self {
        Self::with_capacity(compression_ratio, PAYLOAD_CAPACITY)
    }

    /// Creates a generator with a buffer of exactly `capacity` bytes.
    pub fn with_capacity(compression_ratio: f64, capacity: usize) -> Self {
        let mut rand = Random::new(PAYLOAD_SEED);
        let mut data = Vec::with_capacity(capacity);
        let mut raw = Vec::new();

        while data.len() < capacity {
            let chunk_end = (data.len() + CHUNK_LEN).min(capacity);
            random_string(&mut rand, raw_len(compression_ratio), &mut raw);
            while data.len() < chunk_end {
                let take = raw.len().min(chunk_end - data.len());
                data.extend_from_slice(&raw[..take]);
            }
        }

        Self { data, pos: 0 }
    }

    /// Total number of bytes available to [`generate`](Self::generate).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the next `len` bytes of the buffer.
    ///
    /// Starts over at the beginning of the buffer when fewer than `len` bytes remain.
    ///
    /// # Panics
    ///
    /// Panics if `len` is not smaller than the buffer.
    pub fn generate(&mut self, len: usize) -> &[u8] {
        assert!(
            len < self.data.len(),
            "payload of {len} bytes does not fit the {} byte buffer",
            self.data.len()
        );

        if self.pos + len > self.data.len() {
            self.pos = 0;
        }

        let start = self.pos;
        self.pos += len;
        &self.data[start..self.pos]
    }
}

/// Number of random characters in each chunk. Always at least one.
fn raw_len(compression_ratio: f64) -> usize {
    ((CHUNK_LEN as f64 * compression_ratio) as usize).max(1)
}

/// Replaces the contents of `dst` with `len` printable ASCII characters.
///
/// The string is filled from the back, so the first draw becomes its last character.
fn random_string(rand: &mut Random, len: usize, dst: &mut Vec<u8>) {
    dst.clear();
    dst.resize(len, 0);
    for byte in dst.iter_mut().rev() {
        *byte = b' ' + rand.uniform(95) as u8;
    }
}
