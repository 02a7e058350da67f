//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Functionality for decoding a protobuf stream in terms of tag/value pairs.

use std::str;

use io::ByteCursor;
use wire::{self, FieldHeader, WireType};
use super::{Error, NumberEncoding, Result};

/// Streaming protobuf parser.
///
/// The reader always holds the header of the field it is about to read:
/// the first header is parsed on construction, and every method that
/// consumes a value parses the following header before returning. Callers
/// therefore decide what to do with a field by looking at `current()`
/// without consuming anything, then call exactly one of the `next_*`
/// methods or `skip_field()`.
///
/// A reader only ever sees the bytes of one message. Nested messages are
/// read through a new `Reader` returned by `next_message()`, which stops at
/// the end of the nested message no matter what its contents say.
///
/// A reader may also be created in packed mode over the payload of a packed
/// repeated field. In that mode there are no headers; every value is
/// reported under the same synthetic header until the payload runs out.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    input: ByteCursor<'a>,
    /// The header of the next field, or `None` at end of message.
    current: Option<FieldHeader>,
    /// Offset of the header in `current`.
    field_pos: u64,
    /// If set, the header every value of a packed payload is reported under.
    packed: Option<FieldHeader>,
}

impl<'a> Reader<'a> {
    /// Creates a reader over all of `input`, reading the first header.
    ///
    /// Empty input is valid and simply yields no fields.
    pub fn new(input: ByteCursor<'a>) -> Result<Self> {
        let mut this = Reader {
            input: input,
            current: None,
            field_pos: 0,
            packed: None,
        };
        this.advance()?;
        Ok(this)
    }

    /// Convenience for `Reader::new(ByteCursor::new(data))`.
    pub fn from_slice(data: &'a [u8]) -> Result<Self> {
        Reader::new(ByteCursor::new(data))
    }

    fn new_packed(input: ByteCursor<'a>, header: FieldHeader) -> Self {
        let mut this = Reader {
            field_pos: input.pos(),
            current: None,
            input: input,
            packed: Some(header),
        };
        this.current = if this.input.is_empty() { None } else { Some(header) };
        this
    }

    fn advance(&mut self) -> Result<()> {
        self.field_pos = self.input.pos();
        if let Some(header) = self.packed {
            self.current = if self.input.is_empty() {
                None
            } else {
                Some(header)
            };
            return Ok(());
        }

        self.current = match wire::decode_varint(&mut self.input, 32, true)? {
            Some(raw) => Some(FieldHeader::parse(raw, self.field_pos)?),
            None => None,
        };
        Ok(())
    }

    /// Returns the header of the field about to be read, or `None` if the
    /// message has no more fields.
    #[inline]
    pub fn current(&self) -> Option<FieldHeader> {
        self.current
    }

    /// Returns the offset of the current field's header.
    #[inline]
    pub fn field_pos(&self) -> u64 {
        self.field_pos
    }

    /// Returns whether this reader is walking a packed payload.
    pub fn is_packed(&self) -> bool {
        self.packed.is_some()
    }

    fn expect(&self, wire_type: WireType) -> Result<()> {
        match self.current {
            Some(header) if header.wire_type == wire_type => Ok(()),
            Some(header) => Err(Error::UnexpectedWireType(
                self.field_pos, wire_type, header.wire_type)),
            None => Err(Error::UnexpectedEof(self.field_pos)),
        }
    }

    fn finish<T>(&mut self, value: T) -> Result<T> {
        self.advance()?;
        Ok(value)
    }

    /// Reads the current field as an `i32`.
    ///
    /// Default-encoded values are read as 64-bit varints and truncated, so
    /// sign-extended negative numbers from other implementations decode
    /// correctly.
    pub fn next_i32(&mut self, encoding: NumberEncoding) -> Result<i32> {
        self.expect(encoding.wire_type_32())?;
        let v = match encoding {
            NumberEncoding::Default =>
                wire::read_varint(&mut self.input, 64)? as i32,
            NumberEncoding::Signed =>
                wire::unzigzag32(wire::read_varint(&mut self.input, 32)?
                                 as u32),
            NumberEncoding::Fixed =>
                wire::read_fixed32(&mut self.input)? as i32,
        };
        self.finish(v)
    }

    /// Reads the current field as an `i64`.
    pub fn next_i64(&mut self, encoding: NumberEncoding) -> Result<i64> {
        self.expect(encoding.wire_type_64())?;
        let v = match encoding {
            NumberEncoding::Default =>
                wire::read_varint(&mut self.input, 64)? as i64,
            NumberEncoding::Signed =>
                wire::unzigzag64(wire::read_varint(&mut self.input, 64)?),
            NumberEncoding::Fixed =>
                wire::read_fixed64(&mut self.input)? as i64,
        };
        self.finish(v)
    }

    /// Reads the current field as a `u32`.
    pub fn next_u32(&mut self, encoding: NumberEncoding) -> Result<u32> {
        self.expect(encoding.wire_type_32())?;
        let v = match encoding {
            NumberEncoding::Fixed => wire::read_fixed32(&mut self.input)?,
            _ => wire::read_varint(&mut self.input, 64)? as u32,
        };
        self.finish(v)
    }

    /// Reads the current field as a `u64`.
    pub fn next_u64(&mut self, encoding: NumberEncoding) -> Result<u64> {
        self.expect(encoding.wire_type_64())?;
        let v = match encoding {
            NumberEncoding::Fixed => wire::read_fixed64(&mut self.input)?,
            _ => wire::read_varint(&mut self.input, 64)?,
        };
        self.finish(v)
    }

    /// Reads the current field as an `f32`.
    pub fn next_f32(&mut self) -> Result<f32> {
        self.expect(WireType::Fixed32)?;
        let bits = wire::read_fixed32(&mut self.input)?;
        self.finish(f32::from_bits(bits))
    }

    /// Reads the current field as an `f64`.
    pub fn next_f64(&mut self) -> Result<f64> {
        self.expect(WireType::Fixed64)?;
        let bits = wire::read_fixed64(&mut self.input)?;
        self.finish(f64::from_bits(bits))
    }

    fn next_delimited(&mut self) -> Result<ByteCursor<'a>> {
        self.expect(WireType::LengthDelimited)?;
        let len = wire::read_varint(&mut self.input, 32)?;
        let payload = self.input.split(len as usize)?;
        self.advance()?;
        Ok(payload)
    }

    /// Reads the raw payload of the current length-delimited field.
    pub fn next_bytes(&mut self) -> Result<&'a [u8]> {
        let mut payload = self.next_delimited()?;
        let len = payload.remaining();
        payload.read_bytes(len)
    }

    /// Reads the current field as a UTF-8 string.
    pub fn next_str(&mut self) -> Result<&'a str> {
        let pos = self.field_pos;
        let data = self.next_bytes()?;
        str::from_utf8(data).map_err(|err| Error::InvalidUtf8(pos, err))
    }

    /// Reads the current field as a nested message.
    ///
    /// The returned reader covers exactly the bytes of the nested message,
    /// and this reader has already moved on to the field after it.
    pub fn next_message(&mut self) -> Result<Reader<'a>> {
        let payload = self.next_delimited()?;
        Reader::new(payload)
    }

    /// Reads the current field as a packed run of values of the given wire
    /// type, all reported under the current field number.
    pub fn next_packed(&mut self, element: WireType) -> Result<Reader<'a>> {
        let number = match self.current {
            Some(header) => header.number,
            None => return Err(Error::UnexpectedEof(self.field_pos)),
        };
        let payload = self.next_delimited()?;
        Ok(Reader::new_packed(payload, FieldHeader {
            number: number,
            wire_type: element,
        }))
    }

    /// Skips over the current field without interpreting it.
    ///
    /// This only looks at the wire type, so it works for fields the caller
    /// knows nothing about.
    pub fn skip_field(&mut self) -> Result<()> {
        let header = match self.current {
            Some(header) => header,
            None => return Err(Error::UnexpectedEof(self.field_pos)),
        };

        match header.wire_type {
            WireType::Varint => {
                wire::read_varint(&mut self.input, 64)?;
            },
            WireType::Fixed64 => {
                self.input.read_bytes(8)?;
            },
            WireType::Fixed32 => {
                self.input.read_bytes(4)?;
            },
            WireType::LengthDelimited => {
                let len = wire::read_varint(&mut self.input, 32)?;
                self.input.read_bytes(len as usize)?;
            },
        }
        self.advance()
    }
}
