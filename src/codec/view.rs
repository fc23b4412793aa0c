//! Length-checked fixed-offset access to received bytes.
//!
//! The serial protocols place their fields at fixed offsets. [`ByteView`]
//! keeps those offsets explicit at the call site while turning any read past
//! the end of the buffer into a [`CodecError::OutOfRange`].

use crate::error::CodecError;

/// Borrowed, bounds-checked view over a received frame or line.
///
/// # Example
///
/// ```rust
/// use relay_bridge::codec::ByteView;
///
/// let view = ByteView::new(&[0x02, 0x08, 0x66]);
/// assert_eq!(view.u8_at(0), Ok(0x02));
/// assert_eq!(view.u16_be_at(1), Ok(2150));
/// assert!(view.u16_be_at(2).is_err());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ByteView<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Wrap a byte slice.
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Number of bytes in view.
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the view holds no bytes.
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when the view begins with `prefix`.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.bytes.starts_with(prefix)
    }

    /// `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], CodecError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(CodecError::OutOfRange {
                offset,
                len,
                available: self.bytes.len(),
            })
    }

    /// Single byte at `offset`.
    pub fn u8_at(&self, offset: usize) -> Result<u8, CodecError> {
        self.slice(offset, 1).map(|b| b[0])
    }

    /// Big-endian `u16` at `offset`.
    pub fn u16_be_at(&self, offset: usize) -> Result<u16, CodecError> {
        self.slice(offset, 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    /// Big-endian `i16` at `offset`.
    pub fn i16_be_at(&self, offset: usize) -> Result<i16, CodecError> {
        self.u16_be_at(offset).map(|v| v as i16)
    }

    /// ASCII text of `len` bytes at `offset`.
    ///
    /// Non UTF-8 content is reported as out of range of valid text.
    pub fn str_at(&self, offset: usize, len: usize) -> Result<&'a str, CodecError> {
        let bytes = self.slice(offset, len)?;
        core::str::from_utf8(bytes).map_err(|_| CodecError::OutOfRange {
            offset,
            len,
            available: self.bytes.len(),
        })
    }
}
