//! # VarInt Codec
//!
//! Variable-length encoding for the signed 32-bit fields of the connless
//! protocol, plus the NUL-terminated strings that sit between them.
//!
//! ## Wire Format
//! ```text
//! ESDDDDDD EDDDDDDD EDDDDDDD EDDDDDDD EDDDDDDD
//! E: another byte of this integer follows
//! S: sign, the magnitude was complemented
//! D: magnitude bits, least significant group first
//! ```
//!
//! The first byte carries 6 data bits, every following byte 7, so any
//! `i32` fits in at most [`MAX_BYTES_IN_VARINT`] bytes. Small magnitudes of
//! either sign take a single byte.
//!
//! The buffer is a one-directional cursor: packing appends, unpacking
//! consumes from the front and the consumed bytes are gone.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{BrowserError, Result};

/// Maximum number of bytes a single packed integer occupies
pub const MAX_BYTES_IN_VARINT: usize = 5;

const EXTEND_BIT: u8 = 0b1000_0000;
const SIGN_BIT: u8 = 0b0100_0000;
const FIRST_DATA_MASK: u8 = 0b0011_1111;
const DATA_MASK: u8 = 0b0111_1111;

/// Buffer of packed integers and strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarInt {
    compressed: BytesMut,
}

impl VarInt {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            compressed: BytesMut::with_capacity(MAX_BYTES_IN_VARINT),
        }
    }

    /// Wrap already packed data, e.g. the payload of a received datagram
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            compressed: BytesMut::from(bytes),
        }
    }

    /// Number of bytes that have not been unpacked yet
    pub fn len(&self) -> usize {
        self.compressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compressed.is_empty()
    }

    /// The unread part of the buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.compressed
    }

    /// Consume the buffer, returning the unread bytes
    pub fn into_bytes(self) -> Bytes {
        self.compressed.freeze()
    }

    pub fn clear(&mut self) {
        self.compressed.clear();
    }

    /// Reserve room for another `additional` bytes
    pub fn reserve(&mut self, additional: usize) {
        self.compressed.reserve(additional);
    }

    /// Append `value` to the buffer
    pub fn pack(&mut self, value: i32) {
        let mut data = [0u8; MAX_BYTES_IN_VARINT];
        let mut index = 0;

        // all ones for negative values, zero otherwise
        let sign = value >> 31;
        let mut magnitude = (value ^ sign) as u32;

        if sign != 0 {
            data[index] = SIGN_BIT;
        }
        data[index] |= (magnitude as u8) & FIRST_DATA_MASK;
        magnitude >>= 6;

        while magnitude != 0 {
            data[index] |= EXTEND_BIT;
            index += 1;
            data[index] = (magnitude as u8) & DATA_MASK;
            magnitude >>= 7;
        }

        self.compressed.put_slice(&data[..=index]);
    }

    /// Append a value that is not statically known to fit 32 bits.
    ///
    /// # Panics
    /// Panics when `value` lies outside `[-2147483648, 2147483647]`. Such a
    /// value is a caller bug and is never truncated.
    pub fn pack_i64(&mut self, value: i64) {
        match i32::try_from(value) {
            Ok(value) => self.pack(value),
            Err(_) => panic!(
                "value to pack is out of bounds: {value}, should be within range [-2147483648:2147483647] (32bit)"
            ),
        }
    }

    /// Remove and decode the integer at the front of the buffer.
    ///
    /// # Errors
    /// - [`BrowserError::NoDataToUnpack`] if the buffer is empty
    /// - [`BrowserError::TruncatedVarInt`] if the last available byte still
    ///   announces a continuation
    ///
    /// The buffer is left untouched on error.
    pub fn unpack(&mut self) -> Result<i32> {
        let data = &self.compressed[..];
        let first = *data.first().ok_or(BrowserError::NoDataToUnpack)?;

        let negative = first & SIGN_BIT != 0;
        let mut value = u32::from(first & FIRST_DATA_MASK);

        let mut index = 0;
        while data[index] & EXTEND_BIT != 0 && index < MAX_BYTES_IN_VARINT - 1 {
            index += 1;
            let byte = *data.get(index).ok_or(BrowserError::TruncatedVarInt)?;
            value |= u32::from(byte & DATA_MASK).wrapping_shl(6 + 7 * (index as u32 - 1));
        }

        let mut value = value as i32;
        if negative {
            value = !value;
        }

        self.compressed.advance(index + 1);
        Ok(value)
    }

    /// Append `value` followed by a NUL byte
    pub fn pack_str(&mut self, value: &str) {
        self.compressed.reserve(value.len() + 1);
        self.compressed.put_slice(value.as_bytes());
        self.compressed.put_u8(0);
    }

    /// Remove and return the NUL-terminated string at the front of the
    /// buffer. Invalid UTF-8 is replaced rather than rejected, server names
    /// in the wild are not always clean.
    pub fn unpack_str(&mut self) -> Result<String> {
        if self.compressed.is_empty() {
            return Err(BrowserError::NoDataToUnpack);
        }

        let end = self
            .compressed
            .iter()
            .position(|&b| b == 0)
            .ok_or(BrowserError::UnterminatedString)?;

        let value = String::from_utf8_lossy(&self.compressed[..end]).into_owned();
        self.compressed.advance(end + 1);
        Ok(value)
    }
}

impl From<Vec<u8>> for VarInt {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            compressed: BytesMut::from(&bytes[..]),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn packed(value: i32) -> Vec<u8> {
        let mut v = VarInt::new();
        v.pack(value);
        v.as_bytes().to_vec()
    }

    #[test]
    fn small_values_take_one_byte() {
        assert_eq!(packed(0), vec![0x00]);
        assert_eq!(packed(1), vec![0x01]);
        assert_eq!(packed(63), vec![0x3F]);
        assert_eq!(packed(-1), vec![0x40]);
        assert_eq!(packed(-64), vec![0x7F]);
    }

    #[test]
    fn first_byte_holds_six_bits() {
        // 64 = 0b1_000000, low six bits zero, one bit in the second byte
        assert_eq!(packed(64), vec![0x80, 0x01]);
        assert_eq!(packed(-65), vec![0xC0, 0x01]);
    }

    #[test]
    fn extremes_take_five_bytes() {
        assert_eq!(packed(i32::MAX).len(), MAX_BYTES_IN_VARINT);
        assert_eq!(packed(i32::MIN).len(), MAX_BYTES_IN_VARINT);
        assert_eq!(packed(i32::MAX), vec![0xBF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(packed(i32::MIN), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn pack_appends() {
        let mut v = VarInt::from_bytes(&[0xAA]);
        v.pack(5);
        assert_eq!(v.as_bytes(), &[0xAA, 0x05]);
    }

    #[test]
    fn unpack_consumes_prefix_only() {
        let mut v = VarInt::new();
        v.pack(1000);
        v.pack(-7);
        assert_eq!(v.unpack().unwrap(), 1000);
        assert_eq!(v.len(), 1);
        assert_eq!(v.unpack().unwrap(), -7);
        assert!(v.is_empty());
    }

    #[test]
    fn empty_unpack_fails_without_mutation() {
        let mut v = VarInt::new();
        assert!(matches!(v.unpack(), Err(BrowserError::NoDataToUnpack)));
        assert!(v.is_empty());
    }

    #[test]
    fn truncated_unpack_leaves_buffer() {
        let mut v = VarInt::from_bytes(&[0x80, 0x80]);
        assert!(matches!(v.unpack(), Err(BrowserError::TruncatedVarInt)));
        assert_eq!(v.as_bytes(), &[0x80, 0x80]);
    }

    #[test]
    fn fifth_byte_stops_decoding() {
        // the fifth byte's continuation flag is ignored, a sixth byte is
        // left for the next unpack
        let mut v = VarInt::from_bytes(&[0xBF, 0xFF, 0xFF, 0xFF, 0x8F, 0x01]);
        v.unpack().unwrap();
        assert_eq!(v.as_bytes(), &[0x01]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn pack_i64_rejects_overflow() {
        VarInt::new().pack_i64(i64::from(i32::MAX) + 1);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn pack_i64_rejects_underflow() {
        VarInt::new().pack_i64(i64::from(i32::MIN) - 1);
    }

    #[test]
    fn strings_and_ints_interleave() {
        let mut v = VarInt::new();
        v.pack_str("0.7.5");
        v.pack(16);
        v.pack_str("");
        assert_eq!(v.unpack_str().unwrap(), "0.7.5");
        assert_eq!(v.unpack().unwrap(), 16);
        assert_eq!(v.unpack_str().unwrap(), "");
        assert!(v.is_empty());
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let mut v = VarInt::from_bytes(b"abc");
        assert!(matches!(v.unpack_str(), Err(BrowserError::UnterminatedString)));
        assert_eq!(v.len(), 3);
    }
}
