//! On-disk payload encoding.
//!
//! Records are either raw UTF-8 (`.txt`) or a gzip stream of UTF-8 (`.gz`).
//! The codec is chosen once per manager and also decides the file suffix.

use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::Error;

/// Payload encoding for disk records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Plain,
}

impl Codec {
    pub fn from_compression(enabled: bool) -> Self {
        if enabled { Codec::Gzip } else { Codec::Plain }
    }

    /// File suffix, including the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            Codec::Gzip => ".gz",
            Codec::Plain => ".txt",
        }
    }

    pub fn is_compressed(self) -> bool {
        self == Codec::Gzip
    }

    /// Encode text into the bytes stored on disk.
    pub fn encode(self, content: &str) -> Result<Vec<u8>, Error> {
        match self {
            Codec::Plain => Ok(content.as_bytes().to_vec()),
            Codec::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(content.as_bytes())
                    .map_err(|e| Error::Corrupt(format!("gzip encode failed: {e}")))?;
                encoder
                    .finish()
                    .map_err(|e| Error::Corrupt(format!("gzip encode failed: {e}")))
            }
        }
    }

    /// Decode stored bytes back into text.
    ///
    /// Fails with [`Error::Corrupt`] if the gzip stream is invalid or the
    /// result is not UTF-8.
    pub fn decode(self, bytes: Vec<u8>) -> Result<String, Error> {
        let raw = match self {
            Codec::Plain => bytes,
            Codec::Gzip => {
                let mut decoder = GzDecoder::new(bytes.as_slice());
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| Error::Corrupt(format!("gzip decode failed: {e}")))?;
                out
            }
        };

        String::from_utf8(raw).map_err(|e| Error::Corrupt(format!("invalid utf-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixes() {
        assert_eq!(Codec::from_compression(true).suffix(), ".gz");
        assert_eq!(Codec::from_compression(false).suffix(), ".txt");
    }

    #[test]
    fn test_gzip_output_is_gzip_stream() {
        let bytes = Codec::Gzip.encode("<html><body>hello</body></html>").unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(
            Codec::Gzip.decode(bytes).unwrap(),
            "<html><body>hello</body></html>"
        );
    }

    #[test]
    fn test_plain_is_identity() {
        let bytes = Codec::Plain.encode("héllo wörld").unwrap();
        assert_eq!(bytes, "héllo wörld".as_bytes());
    }

    #[test]
    fn test_gzip_rejects_garbage() {
        let result = Codec::Gzip.decode(b"definitely not gzip".to_vec());
        assert!(matches!(result, Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_plain_rejects_invalid_utf8() {
        let result = Codec::Plain.decode(vec![0xff, 0xfe, 0xfd]);
        assert!(matches!(result, Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_gzip_rejects_invalid_utf8_payload() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0xc3, 0x28]).unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(matches!(Codec::Gzip.decode(bytes), Err(Error::Corrupt(_))));
    }
}
