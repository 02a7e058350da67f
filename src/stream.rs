//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Functionality for encoding and decoding a protobuf stream in terms of
//! tag/value pairs.
//!
//! `Writer` appends fields to an in-memory buffer; `Reader` walks a byte
//! slice one field at a time. Neither knows anything about the shape of the
//! message being processed. That is the job of the `ser` and `de` modules.

use std::result;
use std::str;

use wire::{self, WireType};

mod dec;
pub use self::dec::Reader;

quick_error! {
    /// Errors raised by the wire layer.
    ///
    /// Every variant carries the absolute byte offset at which the problem
    /// was detected.
    #[derive(Debug)]
    pub enum Error {
        /// A varint did not terminate within the given number of bits.
        VarintTooLong(pos: u64, bits: u32) {
            display("varint at offset {} exceeds {} bits", pos, bits)
        }
        /// The input ended in the middle of a value.
        UnexpectedEof(pos: u64) {
            display("unexpected end of input at offset {}", pos)
        }
        /// The field at `pos` was framed differently than its reader
        /// requires.
        UnexpectedWireType(pos: u64, expected: WireType, actual: WireType) {
            display("expected wire type {:?}, but found {:?} at offset {}",
                    expected, actual, pos)
        }
        /// A header named a wire type this crate does not support.
        InvalidWireType(pos: u64, raw: u8) {
            display("unsupported wire type {} at offset {}", raw, pos)
        }
        /// A header carried field number zero, or one above the maximum.
        InvalidFieldNumber(pos: u64, number: u64) {
            display("invalid field number {} at offset {}", number, pos)
        }
        /// A string field did not hold valid UTF-8.
        InvalidUtf8(pos: u64, err: str::Utf8Error) {
            display("invalid UTF-8 at offset {}: {}", pos, err)
            cause(err)
        }
    }
}

/// Result type for wire-level operations.
pub type Result<T> = result::Result<T, Error>;

/// How integer values of a field are represented on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberEncoding {
    /// Plain varint. Negative values take the full ten bytes.
    Default,
    /// Zigzag-mapped varint, for fields that are often negative.
    Signed,
    /// Little-endian fixed width, 4 or 8 bytes depending on the type.
    Fixed,
}

impl Default for NumberEncoding {
    fn default() -> Self {
        NumberEncoding::Default
    }
}

impl NumberEncoding {
    /// Returns the wire type used by 32-bit integers in this encoding.
    #[inline]
    pub fn wire_type_32(self) -> WireType {
        match self {
            NumberEncoding::Fixed => WireType::Fixed32,
            _ => WireType::Varint,
        }
    }

    /// Returns the wire type used by 64-bit integers in this encoding.
    #[inline]
    pub fn wire_type_64(self) -> WireType {
        match self {
            NumberEncoding::Fixed => WireType::Fixed64,
            _ => WireType::Varint,
        }
    }
}

/// The field number and number encoding assigned to one element of a
/// message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldTag {
    /// The field number written in each header.
    pub number: u32,
    /// How integer payloads are represented.
    pub encoding: NumberEncoding,
    /// Whether repeated scalar values under this tag are packed into a
    /// single length-delimited field.
    pub packed: bool,
}

impl FieldTag {
    /// Creates a tag with the default encoding and no packing.
    pub fn new(number: u32) -> Self {
        FieldTag {
            number: number,
            encoding: NumberEncoding::Default,
            packed: false,
        }
    }

    /// Returns this tag with its number encoding replaced.
    pub fn with_encoding(self, encoding: NumberEncoding) -> Self {
        FieldTag { encoding: encoding, .. self }
    }

    /// Returns this tag with its packing flag replaced.
    pub fn with_packed(self, packed: bool) -> Self {
        FieldTag { packed: packed, .. self }
    }
}

/// An append-only buffer of encoded fields.
///
/// Each message level being encoded owns one of these. A nested message is
/// built up in its own `Writer`, then spliced into the parent with
/// `write_message()` once its length is known.
///
/// A writer made with `sizing()` only counts. Length-delimited payloads are
/// added to the count without being copied, so `len()` is exact but the
/// bytes are not kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Writer {
    buf: Vec<u8>,
    sizing: bool,
    counted: usize,
}

macro_rules! write_scalar {
    ($name:ident, $value:ident, $t:ty, $wire:ident) => {
        /// Writes a field header for `tag` followed by `v`, framed
        /// according to the tag's number encoding.
        pub fn $name(&mut self, tag: FieldTag, v: $t) {
            self.write_header(tag.number, tag.encoding.$wire());
            self.$value(tag.encoding, v);
        }
    }
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Writer::default()
    }

    /// Creates a writer which only measures what would be written.
    pub fn sizing() -> Self {
        Writer { sizing: true, .. Writer::default() }
    }

    /// Creates an empty writer for a nested message, sizing if this one is.
    pub fn nested(&self) -> Self {
        Writer { sizing: self.sizing, .. Writer::default() }
    }

    /// Returns whether this writer only measures.
    pub fn is_sizing(&self) -> bool {
        self.sizing
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.counted + self.buf.len()
    }

    /// Returns whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }

    /// Returns the bytes written so far.
    ///
    /// A sizing writer does not keep everything it is given, so this is
    /// only a tail of its output.
    pub fn as_bytes(&self) -> &[u8] {
        debug_assert!(!self.sizing);
        &self.buf
    }

    /// Consumes the writer, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        debug_assert!(!self.sizing);
        self.buf
    }

    /// Writes a field header.
    ///
    /// `number` must be a valid field number; this is only checked in debug
    /// builds.
    pub fn write_header(&mut self, number: u32, wire_type: WireType) {
        debug_assert!(number >= 1 && number <= wire::MAX_FIELD_NUMBER);
        wire::encode_varint32(&mut self.buf, (number << 3) | wire_type as u32);
    }

    /// Writes an `i32` payload without a header.
    ///
    /// Under the default encoding negative values are sign-extended to 64
    /// bits, as other protobuf implementations expect.
    pub fn write_i32_value(&mut self, encoding: NumberEncoding, v: i32) {
        match encoding {
            NumberEncoding::Default =>
                wire::encode_varint64(&mut self.buf, v as i64 as u64),
            NumberEncoding::Signed =>
                wire::encode_varint32(&mut self.buf, wire::zigzag32(v)),
            NumberEncoding::Fixed =>
                wire::encode_fixed32(&mut self.buf, v as u32),
        }
    }

    /// Writes an `i64` payload without a header.
    pub fn write_i64_value(&mut self, encoding: NumberEncoding, v: i64) {
        match encoding {
            NumberEncoding::Default =>
                wire::encode_varint64(&mut self.buf, v as u64),
            NumberEncoding::Signed =>
                wire::encode_varint64(&mut self.buf, wire::zigzag64(v)),
            NumberEncoding::Fixed =>
                wire::encode_fixed64(&mut self.buf, v as u64),
        }
    }

    /// Writes a `u32` payload without a header.
    ///
    /// Unsigned values have no zigzag form, so `Signed` behaves like
    /// `Default`.
    pub fn write_u32_value(&mut self, encoding: NumberEncoding, v: u32) {
        match encoding {
            NumberEncoding::Fixed => wire::encode_fixed32(&mut self.buf, v),
            _ => wire::encode_varint32(&mut self.buf, v),
        }
    }

    /// Writes a `u64` payload without a header.
    pub fn write_u64_value(&mut self, encoding: NumberEncoding, v: u64) {
        match encoding {
            NumberEncoding::Fixed => wire::encode_fixed64(&mut self.buf, v),
            _ => wire::encode_varint64(&mut self.buf, v),
        }
    }

    /// Writes an `f32` payload without a header. Floats are always fixed
    /// width.
    pub fn write_f32_value(&mut self, _: NumberEncoding, v: f32) {
        wire::encode_fixed32(&mut self.buf, v.to_bits());
    }

    /// Writes an `f64` payload without a header.
    pub fn write_f64_value(&mut self, _: NumberEncoding, v: f64) {
        wire::encode_fixed64(&mut self.buf, v.to_bits());
    }

    write_scalar!(write_i32, write_i32_value, i32, wire_type_32);
    write_scalar!(write_i64, write_i64_value, i64, wire_type_64);
    write_scalar!(write_u32, write_u32_value, u32, wire_type_32);
    write_scalar!(write_u64, write_u64_value, u64, wire_type_64);

    /// Writes a field holding an `f32`.
    pub fn write_f32(&mut self, tag: FieldTag, v: f32) {
        self.write_header(tag.number, WireType::Fixed32);
        self.write_f32_value(tag.encoding, v);
    }

    /// Writes a field holding an `f64`.
    pub fn write_f64(&mut self, tag: FieldTag, v: f64) {
        self.write_header(tag.number, WireType::Fixed64);
        self.write_f64_value(tag.encoding, v);
    }

    /// Writes a length-delimited field holding `data`.
    pub fn write_length_delimited(&mut self, tag: FieldTag, data: &[u8]) {
        self.write_header(tag.number, WireType::LengthDelimited);
        if self.sizing {
            self.count_delimited(data.len());
        } else {
            wire::encode_varint64(&mut self.buf, data.len() as u64);
            self.buf.extend_from_slice(data);
        }
    }

    fn count_delimited(&mut self, len: usize) {
        self.counted += self.buf.len() + wire::varint_len(len as u64) + len;
        self.buf.clear();
    }

    /// Writes a string field.
    pub fn write_str(&mut self, tag: FieldTag, s: &str) {
        self.write_length_delimited(tag, s.as_bytes());
    }

    /// Splices a completed nested message in as a field of this one.
    pub fn write_message(&mut self, tag: FieldTag, nested: &Writer) {
        if self.sizing {
            self.write_header(tag.number, WireType::LengthDelimited);
            self.count_delimited(nested.len());
        } else {
            self.write_length_delimited(tag, &nested.buf);
        }
    }
}
