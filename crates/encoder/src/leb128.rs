//! LEB128 integer encoding.
//!
//! The binary module format length-prefixes every section and body and
//! encodes all integer immediates as LEB128: unsigned values carry 7 data
//! bits per byte with the high bit as a continuation marker, signed values
//! use the same framing with two's-complement data bits and a sign rule on
//! the final byte. The writers below always produce the canonical (shortest)
//! form; the readers exist so tests and tooling can round-trip what was
//! written.

use thiserror::Error;

/// Failure while reading a LEB128 value back out of a byte stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The stream ended inside an encoding.
    #[error("unexpected end of LEB128 input")]
    UnexpectedEof,
    /// More than five bytes carried a continuation bit; a 32-bit value
    /// never needs them.
    #[error("LEB128 encoding exceeds five bytes")]
    TooLong,
    /// The final byte carried data bits beyond the 32-bit range.
    #[error("LEB128 encoding overflows 32 bits")]
    Overflow,
}

/// Appends the canonical ULEB128 encoding of `value`.
pub fn write_uleb128(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            return;
        }
    }
}

/// Appends the canonical SLEB128 encoding of `value`.
pub fn write_sleb128(out: &mut Vec<u8>, mut value: i32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        // Done once the remaining bits are pure sign extension and the
        // sign bit of this byte agrees with them.
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Number of bytes `write_uleb128` emits for `value`.
pub fn uleb128_len(value: u32) -> usize {
    let mut len = 1;
    let mut value = value >> 7;
    while value != 0 {
        len += 1;
        value >>= 7;
    }
    len
}

/// Number of bytes `write_sleb128` emits for `value`.
pub fn sleb128_len(value: i32) -> usize {
    let mut len = 1;
    let mut value = value;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0) {
            return len;
        }
        len += 1;
    }
}

/// Reads a ULEB128 value from the front of `bytes`, returning the value and
/// the number of bytes consumed.
pub fn read_uleb128(bytes: &[u8]) -> Result<(u32, usize), DecodeError> {
    let mut result: u32 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i == 5 {
            return Err(DecodeError::TooLong);
        }
        if i == 4 && byte & 0x70 != 0 {
            return Err(DecodeError::Overflow);
        }
        result |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }
    Err(DecodeError::UnexpectedEof)
}

/// Reads an SLEB128 value from the front of `bytes`, returning the value and
/// the number of bytes consumed.
pub fn read_sleb128(bytes: &[u8]) -> Result<(i32, usize), DecodeError> {
    let mut result: u32 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i == 5 {
            return Err(DecodeError::TooLong);
        }
        let shift = 7 * i;
        result |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            if shift < 25 && byte & 0x40 != 0 {
                // Sign-extend from the final data bit.
                result |= u32::MAX << (shift + 7);
            }
            return Ok((result as i32, i + 1));
        }
    }
    Err(DecodeError::UnexpectedEof)
}
