/// Failure of the injected text transform.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("compression library is not loaded")]
    Unavailable,
    #[error("codec error: {0}")]
    Codec(String),
}

/// Lossless string-to-string transform used when the catalog outgrows the quota.
///
/// Injected at startup; a store that never needs compression can use
/// [`NoCompression`].
pub trait Compressor {
    /// Whether the transform can run right now. Browser codecs may load late.
    fn is_available(&self) -> bool {
        true
    }

    fn compress(&self, text: &str) -> Result<String, CompressionError>;
    fn decompress(&self, packed: &str) -> Result<String, CompressionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn is_available(&self) -> bool {
        false
    }

    fn compress(&self, _text: &str) -> Result<String, CompressionError> {
        Err(CompressionError::Unavailable)
    }

    fn decompress(&self, _packed: &str) -> Result<String, CompressionError> {
        Err(CompressionError::Unavailable)
    }
}

/// zstd frame, base64 encoded so the result stays a string value.
#[cfg(feature = "zstd")]
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

#[cfg(feature = "zstd")]
impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 3 }
    }
}

#[cfg(feature = "zstd")]
impl ZstdCompressor {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

#[cfg(feature = "zstd")]
impl Compressor for ZstdCompressor {
    fn compress(&self, text: &str) -> Result<String, CompressionError> {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        let frame = zstd::encode_all(text.as_bytes(), self.level)
            .map_err(|err| CompressionError::Codec(err.to_string()))?;
        Ok(STANDARD.encode(frame))
    }

    fn decompress(&self, packed: &str) -> Result<String, CompressionError> {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        let frame = STANDARD
            .decode(packed.as_bytes())
            .map_err(|err| CompressionError::Codec(err.to_string()))?;
        let raw = zstd::decode_all(frame.as_slice())
            .map_err(|err| CompressionError::Codec(err.to_string()))?;
        String::from_utf8(raw).map_err(|err| CompressionError::Codec(err.to_string()))
    }
}
