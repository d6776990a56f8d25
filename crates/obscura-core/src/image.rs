//! Image metadata and plaintext carriers

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// Width and height of an image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Reject images with a zero width or height
    pub fn validate(&self) -> Result<(), ConversionError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConversionError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Image bytes produced by a pixel transform, ready to be sealed
///
/// The byte layout is opaque to Obscura; only the dimensions are inspected.
#[derive(Clone, PartialEq, Eq)]
pub struct TransformedImage {
    bytes: Vec<u8>,
    dimensions: Dimensions,
}

impl TransformedImage {
    /// Wrap image bytes, rejecting empty buffers and zero dimensions
    pub fn new(bytes: Vec<u8>, dimensions: Dimensions) -> Result<Self, ConversionError> {
        dimensions.validate()?;
        if bytes.is_empty() {
            return Err(ConversionError::EmptyPlaintext);
        }
        Ok(Self { bytes, dimensions })
    }

    /// A solid-color RGBA image, handy for fixtures
    pub fn solid_rgba(dimensions: Dimensions, rgba: [u8; 4]) -> Result<Self, ConversionError> {
        let pixels = usize::try_from(dimensions.pixel_count())
            .map_err(|_| ConversionError::malformed("image too large for this platform"))?;
        let bytes = rgba.repeat(pixels);
        Self::new(bytes, dimensions)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl std::fmt::Debug for TransformedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformedImage")
            .field("dimensions", &self.dimensions)
            .field("len", &self.bytes.len())
            .finish()
    }
}
