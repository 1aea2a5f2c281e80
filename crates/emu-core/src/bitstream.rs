//! Repeating bit reader over a byte buffer.

/// Reads bits least-significant first within each byte, wrapping back to
/// the start after the last valid bit.
///
/// The valid length can be shorter than the buffer, which models a partial
/// final byte. An empty stream reads as an endless run of zeros.
#[derive(Debug, Clone)]
pub struct BitStream {
    bytes: Vec<u8>,
    num_bits: usize,
    index: usize,
}

impl BitStream {
    /// A stream over every bit of `data`.
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Self::with_bits(data, data.len() * 8)
    }

    /// A stream over the first `num_bits` bits of `data`.
    ///
    /// # Panics
    ///
    /// If `num_bits` is longer than the buffer.
    #[must_use]
    pub fn with_bits(data: &[u8], num_bits: usize) -> Self {
        if num_bits == 0 {
            return Self {
                bytes: vec![0],
                num_bits: 1,
                index: 0,
            };
        }
        assert!(
            num_bits <= data.len() * 8,
            "bit length {num_bits} exceeds a {}-byte buffer",
            data.len()
        );
        Self {
            bytes: data.to_vec(),
            num_bits,
            index: 0,
        }
    }

    /// Current bit offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn next_bit(&mut self) -> bool {
        let bit = (self.bytes[self.index >> 3] >> (self.index & 7)) & 1 == 1;
        self.index += 1;
        if self.index == self.num_bits {
            self.index = 0;
        }
        bit
    }

    /// Read `count` bits, composing them most-significant first.
    ///
    /// # Panics
    ///
    /// If `count` exceeds 32.
    pub fn next_bits(&mut self, count: u32) -> u32 {
        assert!(count <= 32, "can't compose {count} bits into a u32");
        let mut result = 0u32;
        for _ in 0..count {
            result = (result << 1) | u32::from(self.next_bit());
        }
        result
    }

    /// Like [`next_bits`](Self::next_bits) without advancing.
    pub fn peek_bits(&mut self, count: u32) -> u32 {
        let saved = self.index;
        let result = self.next_bits(count);
        self.index = saved;
        result
    }
}
