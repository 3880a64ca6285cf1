//! Binary packing and text encoding of embedded tables.
//!
//! Tables are flattened into two word streams and laid out as
//!
//! ```text
//! [u64 n][n x u64][m x u32]        all little-endian
//! ```
//!
//! where `m` follows from the remaining length. The bytes are deflated
//! twice in a row and then base64-encoded so they can be stored as a string.
//! Encoding verifies itself by decoding the text again.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::bitboard::Bitboard;
use crate::constants::{MAX_BLOB_BYTES, WORDS};

/// Data-integrity failures while packing or unpacking a table.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("compression stream failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob truncated: {0}")]
    Truncated(String),

    #[error("declared {declared} u64 words but only {available} bytes follow")]
    WordCount { declared: u64, available: usize },

    #[error("u32 section length {0} is not a multiple of 4")]
    Misaligned(usize),

    #[error("first compression pass expanded {original} bytes to {compressed}")]
    Expanded { original: usize, compressed: usize },

    #[error("inflated data exceeds {0} bytes")]
    TooLarge(u64),

    #[error("round trip mismatch: {0}")]
    RoundTrip(String),

    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Two flat word streams: 64-bit masks and 32-bit scalars.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordPack {
    pub u64s: Vec<u64>,
    pub u32s: Vec<u32>,
}

impl WordPack {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push_u64(&mut self, w: u64) {
        self.u64s.push(w);
    }

    #[inline]
    pub fn push_u32(&mut self, w: u32) {
        self.u32s.push(w);
    }

    pub fn push_bitboard(&mut self, b: &Bitboard) {
        self.u64s.extend_from_slice(&b.0);
    }

    /// Serialize to the length-prefixed byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.u64s.len() * 8 + self.u32s.len() * 4);
        out.extend_from_slice(&(self.u64s.len() as u64).to_le_bytes());
        for w in &self.u64s {
            out.extend_from_slice(&w.to_le_bytes());
        }
        for w in &self.u32s {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }

    /// Parse the length-prefixed byte layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let header: [u8; 8] = bytes
            .get(..8)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| CodecError::Truncated(format!("{} byte header", bytes.len())))?;
        let n = u64::from_le_bytes(header);
        let rest = &bytes[8..];

        let u64_bytes = n
            .checked_mul(8)
            .filter(|&len| len <= rest.len() as u64)
            .ok_or(CodecError::WordCount {
                declared: n,
                available: rest.len(),
            })? as usize;

        let (wide, narrow) = rest.split_at(u64_bytes);
        if narrow.len() % 4 != 0 {
            return Err(CodecError::Misaligned(narrow.len()));
        }

        let u64s = wide
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().expect("chunk of 8")))
            .collect();
        let u32s = narrow
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().expect("chunk of 4")))
            .collect();

        Ok(WordPack { u64s, u32s })
    }

    /// Sequential reader over both streams.
    pub fn reader(&self) -> WordReader<'_> {
        WordReader {
            pack: self,
            pos64: 0,
            pos32: 0,
        }
    }
}

/// Cursor over a [`WordPack`].
pub struct WordReader<'a> {
    pack: &'a WordPack,
    pos64: usize,
    pos32: usize,
}

impl WordReader<'_> {
    pub fn next_u64(&mut self) -> Result<u64, CodecError> {
        let w = *self
            .pack
            .u64s
            .get(self.pos64)
            .ok_or_else(|| CodecError::Truncated(format!("u64 word {}", self.pos64)))?;
        self.pos64 += 1;
        Ok(w)
    }

    pub fn next_u32(&mut self) -> Result<u32, CodecError> {
        let w = *self
            .pack
            .u32s
            .get(self.pos32)
            .ok_or_else(|| CodecError::Truncated(format!("u32 word {}", self.pos32)))?;
        self.pos32 += 1;
        Ok(w)
    }

    pub fn next_bitboard(&mut self) -> Result<Bitboard, CodecError> {
        let mut words = [0u64; WORDS];
        for w in &mut words {
            *w = self.next_u64()?;
        }
        Ok(Bitboard(words))
    }

    /// Fail unless both streams were consumed exactly.
    pub fn finish(self) -> Result<(), CodecError> {
        let left64 = self.pack.u64s.len() - self.pos64;
        let left32 = self.pack.u32s.len() - self.pos32;
        if left64 != 0 || left32 != 0 {
            return Err(CodecError::Malformed(format!(
                "{left64} u64 and {left32} u32 words left over"
            )));
        }
        Ok(())
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    DeflateDecoder::new(data)
        .take(MAX_BLOB_BYTES + 1)
        .read_to_end(&mut out)?;
    if out.len() as u64 > MAX_BLOB_BYTES {
        return Err(CodecError::TooLarge(MAX_BLOB_BYTES));
    }
    Ok(out)
}

/// Compress twice in succession.
///
/// The first pass must not grow the data.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let once = deflate(data)?;
    if once.len() > data.len() {
        return Err(CodecError::Expanded {
            original: data.len(),
            compressed: once.len(),
        });
    }
    deflate(&once)
}

/// Undo [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    inflate(&inflate(data)?)
}

/// Pack, compress and base64-encode, then verify the text decodes back to
/// an identical pack.
pub fn encode_text(pack: &WordPack) -> Result<String, CodecError> {
    let bytes = pack.to_bytes();
    let text = STANDARD.encode(compress(&bytes)?);

    let restored = decompress(&STANDARD.decode(&text)?)?;
    if restored.len() != bytes.len() {
        return Err(CodecError::RoundTrip(format!(
            "{} bytes in, {} bytes out",
            bytes.len(),
            restored.len()
        )));
    }
    if WordPack::from_bytes(&restored)? != *pack {
        return Err(CodecError::RoundTrip("word streams differ".to_string()));
    }
    Ok(text)
}

/// Decode text produced by [`encode_text`].
pub fn decode_text(text: &str) -> Result<WordPack, CodecError> {
    let compressed = STANDARD.decode(text.trim())?;
    WordPack::from_bytes(&decompress(&compressed)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WordPack {
        let mut pack = WordPack::new();
        for i in 0..200u64 {
            pack.push_u64(i.wrapping_mul(0x9e37_79b9) & 0xffff_0000);
            pack.push_u32((i % 7) as u32);
        }
        pack
    }

    #[test]
    fn test_byte_layout() {
        let mut pack = WordPack::new();
        pack.push_u64(0x0102);
        pack.push_u32(7);
        let bytes = pack.to_bytes();
        assert_eq!(bytes.len(), 8 + 8 + 4);
        assert_eq!(&bytes[..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &0x0102u64.to_le_bytes());
        assert_eq!(&bytes[16..], &7u32.to_le_bytes());
        assert_eq!(WordPack::from_bytes(&bytes).unwrap(), pack);
    }

    #[test]
    fn test_declared_count_too_large() {
        let mut bytes = 5u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            WordPack::from_bytes(&bytes),
            Err(CodecError::WordCount { declared: 5, .. })
        ));
    }

    #[test]
    fn test_misaligned_tail() {
        let mut bytes = 0u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            WordPack::from_bytes(&bytes),
            Err(CodecError::Misaligned(3))
        ));
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            WordPack::from_bytes(&[1, 2, 3]),
            Err(CodecError::Truncated(_))
        ));
    }

    #[test]
    fn test_text_round_trip() {
        let pack = sample();
        let text = encode_text(&pack).unwrap();
        assert!(text.is_ascii());
        assert_eq!(decode_text(&text).unwrap(), pack);
    }

    #[test]
    fn test_first_pass_shrinks_repetitive_data() {
        let bytes = sample().to_bytes();
        assert!(deflate(&bytes).unwrap().len() <= bytes.len());
    }

    #[test]
    fn test_garbage_text_is_rejected() {
        assert!(decode_text("not base64 at all!").is_err());
        let bogus = STANDARD.encode([0xffu8; 32]);
        assert!(decode_text(&bogus).is_err());
    }

    #[test]
    fn test_reader_finish_detects_leftovers() {
        let pack = sample();
        let mut r = pack.reader();
        r.next_u64().unwrap();
        assert!(r.finish().is_err());
    }
}
