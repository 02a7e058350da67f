//-
// Copyright 2017, Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Low-level definitions for working with the wire format.
//!
//! External code generally should not use things from this module; instead,
//! prefer the `stream` module if you want to do lower-level streaming.

use io::ByteCursor;
use stream::{Error, Result};

/// The largest field number the wire format can carry.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// The number of bytes needed by the longest possible varint.
pub const MAX_VARINT_LEN: usize = 10;

/// How the payload following a field header is framed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Interprets the low three bits of a raw header, if they name a wire
    /// type this crate supports.
    ///
    /// Groups (3 and 4) are deprecated in the wire format and are not
    /// accepted.
    pub fn from_bits(bits: u8) -> Option<Self> {
        use self::WireType::*;

        match bits {
            0 => Some(Varint),
            1 => Some(Fixed64),
            2 => Some(LengthDelimited),
            5 => Some(Fixed32),
            _ => None,
        }
    }
}

/// A decoded field header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldHeader {
    /// The field number, in `1..=MAX_FIELD_NUMBER`.
    pub number: u32,
    /// The framing of the payload that follows.
    pub wire_type: WireType,
}

impl FieldHeader {
    /// Splits a raw header value into its field number and wire type.
    ///
    /// `pos` is only used to annotate errors.
    pub fn parse(raw: u64, pos: u64) -> Result<Self> {
        let wire_type = WireType::from_bits((raw & 7) as u8).ok_or(
            Error::InvalidWireType(pos, (raw & 7) as u8))?;
        let number = raw >> 3;
        if 0 == number || number > MAX_FIELD_NUMBER as u64 {
            return Err(Error::InvalidFieldNumber(pos, number));
        }

        Ok(FieldHeader { number: number as u32, wire_type: wire_type })
    }

    /// Returns the raw header value, as written before varint encoding.
    pub fn raw(&self) -> u32 {
        debug_assert!(self.number >= 1 && self.number <= MAX_FIELD_NUMBER);
        (self.number << 3) | self.wire_type as u32
    }
}

/// Appends `i` as a varint to `dst`.
pub fn encode_varint64(dst: &mut Vec<u8>, mut i: u64) {
    while i >= 0x80 {
        dst.push((i & 0x7F) as u8 | 0x80);
        i >>= 7;
    }
    dst.push(i as u8);
}

/// Appends `i` as a varint to `dst`, without widening to 64 bits.
pub fn encode_varint32(dst: &mut Vec<u8>, mut i: u32) {
    while i >= 0x80 {
        dst.push((i & 0x7F) as u8 | 0x80);
        i >>= 7;
    }
    dst.push(i as u8);
}

/// Returns the number of bytes `encode_varint64` would produce for `i`.
pub fn varint_len(i: u64) -> usize {
    let mut len = 1;
    let mut i = i >> 7;
    while i != 0 {
        len += 1;
        i >>= 7;
    }
    len
}

/// Reads one varint from `src`.
///
/// The value may use at most `bit_limit` (32 or 64) significant bits, or
/// `Error::VarintTooLong` results; this also rejects denormalised varints
/// that run past the maximum length.
///
/// If `eof_allowed` is true and `src` is exhausted before the first byte,
/// `Ok(None)` is returned. Any other truncation is `Error::UnexpectedEof`.
pub fn decode_varint(src: &mut ByteCursor, bit_limit: u32, eof_allowed: bool)
                     -> Result<Option<u64>> {
    debug_assert!(bit_limit > 0 && bit_limit <= 64);

    let start = src.pos();
    let mut accum = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = match src.read_byte_opt() {
            Some(byte) => byte,
            None if eof_allowed && 0 == shift => return Ok(None),
            None => return Err(Error::UnexpectedEof(src.pos())),
        };

        let bits = (byte & 0x7F) as u64;
        let fits = shift < bit_limit && if bit_limit >= 64 {
            (bits << shift) >> shift == bits
        } else {
            (bits << shift) >> bit_limit == 0
        };
        if !fits {
            return Err(Error::VarintTooLong(start, bit_limit));
        }

        accum |= bits << shift;
        if 0 == byte & 0x80 {
            return Ok(Some(accum));
        }
        shift += 7;
    }
}

/// Like `decode_varint()`, but end of input is always an error.
pub fn read_varint(src: &mut ByteCursor, bit_limit: u32) -> Result<u64> {
    match decode_varint(src, bit_limit, false)? {
        Some(v) => Ok(v),
        None => Err(Error::UnexpectedEof(src.pos())),
    }
}

/// Appends `i` to `dst` as 4 little-endian bytes.
pub fn encode_fixed32(dst: &mut Vec<u8>, i: u32) {
    dst.extend_from_slice(&i.to_le_bytes());
}

/// Appends `i` to `dst` as 8 little-endian bytes.
pub fn encode_fixed64(dst: &mut Vec<u8>, i: u64) {
    dst.extend_from_slice(&i.to_le_bytes());
}

/// Reads a 4-byte little-endian value from `src`.
pub fn read_fixed32(src: &mut ByteCursor) -> Result<u32> {
    let mut buf = [0u8;4];
    buf.copy_from_slice(src.read_bytes(4)?);
    Ok(u32::from_le_bytes(buf))
}

/// Reads an 8-byte little-endian value from `src`.
pub fn read_fixed64(src: &mut ByteCursor) -> Result<u64> {
    let mut buf = [0u8;8];
    buf.copy_from_slice(src.read_bytes(8)?);
    Ok(u64::from_le_bytes(buf))
}

/// Maps a signed integer onto an unsigned one so that values of small
/// magnitude stay small.
#[inline]
pub fn zigzag32(i: i32) -> u32 {
    ((i << 1) ^ (i >> 31)) as u32
}

/// Inverts `zigzag32()`.
#[inline]
pub fn unzigzag32(i: u32) -> i32 {
    ((i >> 1) as i32) ^ -((i & 1) as i32)
}

/// 64-bit version of `zigzag32()`.
#[inline]
pub fn zigzag64(i: i64) -> u64 {
    ((i << 1) ^ (i >> 63)) as u64
}

/// Inverts `zigzag64()`.
#[inline]
pub fn unzigzag64(i: u64) -> i64 {
    ((i >> 1) as i64) ^ -((i & 1) as i64)
}

#[cfg(test)]
mod test {
    use std::{i32, i64, u32, u64};

    use proptest::prelude::*;

    use io::ByteCursor;
    use stream::Error;
    use super::*;

    #[test]
    fn varint_encoding_and_decoding() {
        macro_rules! test {
            ($v:expr, $vec:expr) => { {
                let mut output = Vec::new();
                encode_varint64(&mut output, $v);
                assert_eq!(&$vec[..], &output[..]);
                assert_eq!(output.len(), varint_len($v));

                let mut input = ByteCursor::new(&output);
                let decoded = read_varint(&mut input, 64).unwrap();
                assert!(input.is_empty());
                assert_eq!($v, decoded);
            } }
        }

        test!(0, [0]);
        test!(1, [1]);
        test!(127, [127]);
        test!(128, [128, 1]);
        test!(150, [0x96, 0x01]);
        test!(256, [128, 2]);
        test!(u32::MAX as u64, [255, 255, 255, 255, 15]);
        test!(u64::MAX,
              [255, 255, 255, 255, 255, 255, 255, 255, 255, 1]);
    }

    #[test]
    fn varint32_matches_varint64() {
        for &v in &[0u32, 1, 127, 128, 300, 1 << 21, u32::MAX] {
            let mut narrow = Vec::new();
            let mut wide = Vec::new();
            encode_varint32(&mut narrow, v);
            encode_varint64(&mut wide, v as u64);
            assert_eq!(wide, narrow);

            let mut input = ByteCursor::new(&narrow);
            assert_eq!(v as u64, read_varint(&mut input, 32).unwrap());
        }
    }

    #[test]
    fn varint_overflow_detected() {
        // Eleven bytes can never be valid.
        let data = [255u8, 255, 255, 255, 255, 255, 255, 255, 255, 255, 1];
        match read_varint(&mut ByteCursor::new(&data), 64) {
            Err(Error::VarintTooLong(0, 64)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }

        // Ten bytes, but the last carries more than the one remaining bit.
        let data = [255u8, 255, 255, 255, 255, 255, 255, 255, 255, 2];
        match read_varint(&mut ByteCursor::new(&data), 64) {
            Err(Error::VarintTooLong(0, 64)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }

        // 2^32 does not fit a 32-bit varint.
        let data = [128u8, 128, 128, 128, 16];
        match read_varint(&mut ByteCursor::new(&data), 32) {
            Err(Error::VarintTooLong(0, 32)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn varint_eof_handling() {
        let mut empty = ByteCursor::new(&[]);
        assert_eq!(None, decode_varint(&mut empty, 64, true).unwrap());

        match decode_varint(&mut ByteCursor::new(&[]), 64, false) {
            Err(Error::UnexpectedEof(0)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }

        // Truncation after the first byte is never allowed.
        match decode_varint(&mut ByteCursor::new(&[0x80]), 64, true) {
            Err(Error::UnexpectedEof(1)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn zigzag_known_values() {
        assert_eq!(0, zigzag32(0));
        assert_eq!(1, zigzag32(-1));
        assert_eq!(2, zigzag32(1));
        assert_eq!(3, zigzag32(-2));
        assert_eq!(u32::MAX - 1, zigzag32(i32::MAX));
        assert_eq!(u32::MAX, zigzag32(i32::MIN));
        assert_eq!(u64::MAX, zigzag64(i64::MIN));
        assert_eq!(u64::MAX - 1, zigzag64(i64::MAX));

        for &n in &[0, -1, 1, i32::MIN, i32::MAX] {
            assert_eq!(n, unzigzag32(zigzag32(n)));
        }
        for &n in &[0, -1, 1, i32::MIN as i64, i32::MAX as i64,
                    i64::MIN, i64::MAX] {
            assert_eq!(n, unzigzag64(zigzag64(n)));
        }
    }

    #[test]
    fn fixed_values_are_little_endian() {
        let mut output = Vec::new();
        encode_fixed32(&mut output, 0x01020304);
        encode_fixed64(&mut output, 0x0102030405060708);
        assert_eq!(vec![4, 3, 2, 1, 8, 7, 6, 5, 4, 3, 2, 1], output);

        let mut input = ByteCursor::new(&output);
        assert_eq!(0x01020304, read_fixed32(&mut input).unwrap());
        assert_eq!(0x0102030405060708, read_fixed64(&mut input).unwrap());
        match read_fixed32(&mut input) {
            Err(Error::UnexpectedEof(12)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn header_parsing() {
        assert_eq!(FieldHeader { number: 1, wire_type: WireType::Varint },
                   FieldHeader::parse(0x08, 0).unwrap());
        assert_eq!(FieldHeader { number: 2,
                                 wire_type: WireType::LengthDelimited },
                   FieldHeader::parse(0x12, 0).unwrap());
        assert_eq!(0x12, FieldHeader::parse(0x12, 0).unwrap().raw());

        match FieldHeader::parse(0x0B, 7) {
            Err(Error::InvalidWireType(7, 3)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
        match FieldHeader::parse(0x00, 7) {
            Err(Error::InvalidFieldNumber(7, 0)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    proptest! {
        #[test]
        fn varint_round_trips(v in any::<u64>()) {
            let mut output = Vec::new();
            encode_varint64(&mut output, v);
            prop_assert!(output.len() <= MAX_VARINT_LEN);
            let mut input = ByteCursor::new(&output);
            prop_assert_eq!(v, read_varint(&mut input, 64).unwrap());
        }

        #[test]
        fn zigzag_round_trips(n in any::<i64>(), m in any::<i32>()) {
            prop_assert_eq!(n, unzigzag64(zigzag64(n)));
            prop_assert_eq!(m, unzigzag32(zigzag32(m)));
        }
    }
}
