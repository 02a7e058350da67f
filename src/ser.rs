//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Defines traits and utilities for high-level serialisation.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::io::Write;

use descriptor::{Descriptor, FieldIndex, Schema, SerialKind, Slot};
use error::{Error, Result};
use io;
use stream::{FieldTag, NumberEncoding, Writer};

/// Serialises `value` into a new byte vector.
///
/// `value` must be a message type; scalars and collections have no
/// representation of their own at top level.
pub fn to_vec<T : Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    value.serialize(Encoder::top_level(&mut writer))?;
    Ok(writer.into_bytes())
}

/// Serialises `value` and writes the result to `dst`.
pub fn to_writer<W : Write, T : Serialize + ?Sized>
    (dst: &mut W, value: &T) -> Result<()>
{
    dst.write_all(&to_vec(value)?)?;
    Ok(())
}

/// Returns the number of bytes `to_vec(value)` would produce.
///
/// Nested messages are measured rather than built, so string and byte
/// payloads are never copied.
pub fn serialized_size<T : Serialize + ?Sized>(value: &T) -> Result<usize> {
    let mut writer = Writer::sizing();
    value.serialize(Encoder::top_level(&mut writer))?;
    Ok(writer.len())
}

/// Serialises `value` and writes it to `dst` preceded by its length, so that
/// it can be read back with `de::from_reader_delimited`.
pub fn to_writer_delimited<W : Write, T : Serialize + ?Sized>
    (dst: &mut W, value: &T) -> Result<()>
{
    io::write_delimited(dst, &to_vec(value)?)?;
    Ok(())
}

/// Trait for types which can be encoded to the wire format.
///
/// Note that `u8` does not implement this trait deliberately, so that `[u8]`
/// and so forth can serialise as byte strings instead of lists.
pub trait Serialize : Schema {
    /// Serialises this value through `encoder`.
    ///
    /// The encoder knows where the value sits; the implementation only picks
    /// the matching `encode_*` method or opens a structure.
    fn serialize(&self, encoder: Encoder) -> Result<()>;
}

/// Encodes the single value at one position of a message.
pub struct Encoder<'p> {
    writer: &'p mut Writer,
    slot: Slot,
}

impl<'p> Encoder<'p> {
    /// Creates an encoder for a top-level message written to `writer`.
    pub fn top_level(writer: &'p mut Writer) -> Self {
        Encoder { writer: writer, slot: Slot::TopLevel }
    }

    fn scalar<T, F, G>(self, kind: SerialKind, v: T,
                       tagged: F, untagged: G) -> Result<()>
    where F : FnOnce (&mut Writer, FieldTag, T),
          G : FnOnce (&mut Writer, NumberEncoding, T) {
        match self.slot {
            Slot::TopLevel => return Err(Error::PrimitiveAtTopLevel(kind)),
            Slot::Field(tag) | Slot::Repeated(tag) =>
                tagged(self.writer, tag, v),
            Slot::Packed(encoding) => untagged(self.writer, encoding, v),
        }
        Ok(())
    }

    fn delimited(self, kind: SerialKind, data: &[u8]) -> Result<()> {
        match self.slot {
            Slot::TopLevel => Err(Error::PrimitiveAtTopLevel(kind)),
            Slot::Packed(_) => Err(Error::UnsupportedKind(
                "packed field".to_owned(), kind)),
            Slot::Field(tag) | Slot::Repeated(tag) => {
                self.writer.write_length_delimited(tag, data);
                Ok(())
            },
        }
    }

    /// Encodes a `bool` as 0 or 1.
    pub fn encode_bool(self, v: bool) -> Result<()> {
        self.scalar(SerialKind::Bool, v as i32,
                    Writer::write_i32, Writer::write_i32_value)
    }

    /// Encodes an `i8`.
    pub fn encode_i8(self, v: i8) -> Result<()> {
        self.scalar(SerialKind::I8, v as i32,
                    Writer::write_i32, Writer::write_i32_value)
    }

    /// Encodes an `i16`.
    pub fn encode_i16(self, v: i16) -> Result<()> {
        self.scalar(SerialKind::I16, v as i32,
                    Writer::write_i32, Writer::write_i32_value)
    }

    /// Encodes an `i32`.
    pub fn encode_i32(self, v: i32) -> Result<()> {
        self.scalar(SerialKind::I32, v,
                    Writer::write_i32, Writer::write_i32_value)
    }

    /// Encodes an `i64`.
    pub fn encode_i64(self, v: i64) -> Result<()> {
        self.scalar(SerialKind::I64, v,
                    Writer::write_i64, Writer::write_i64_value)
    }

    /// Encodes a `u16` as a `u32`.
    pub fn encode_u16(self, v: u16) -> Result<()> {
        self.scalar(SerialKind::U32, v as u32,
                    Writer::write_u32, Writer::write_u32_value)
    }

    /// Encodes a `u32`.
    pub fn encode_u32(self, v: u32) -> Result<()> {
        self.scalar(SerialKind::U32, v,
                    Writer::write_u32, Writer::write_u32_value)
    }

    /// Encodes a `u64`.
    pub fn encode_u64(self, v: u64) -> Result<()> {
        self.scalar(SerialKind::U64, v,
                    Writer::write_u64, Writer::write_u64_value)
    }

    /// Encodes a `char` as its code point.
    pub fn encode_char(self, v: char) -> Result<()> {
        self.scalar(SerialKind::Char, v as u32,
                    Writer::write_u32, Writer::write_u32_value)
    }

    /// Encodes an `f32`.
    pub fn encode_f32(self, v: f32) -> Result<()> {
        self.scalar(SerialKind::F32, v,
                    Writer::write_f32, Writer::write_f32_value)
    }

    /// Encodes an `f64`.
    pub fn encode_f64(self, v: f64) -> Result<()> {
        self.scalar(SerialKind::F64, v,
                    Writer::write_f64, Writer::write_f64_value)
    }

    /// Encodes a string.
    pub fn encode_str(self, v: &str) -> Result<()> {
        self.delimited(SerialKind::String, v.as_bytes())
    }

    /// Encodes a byte string.
    pub fn encode_bytes(self, v: &[u8]) -> Result<()> {
        self.delimited(SerialKind::Bytes, v)
    }

    /// Encodes the enum entry at `ordinal` as its number.
    ///
    /// Enums are always plain varints; the tag's number encoding does not
    /// apply to them.
    pub fn encode_enum(self, descriptor: &Descriptor, ordinal: usize)
                       -> Result<()> {
        let number = descriptor.enum_number(ordinal).ok_or_else(
            || Error::NoSuchElement(descriptor.name().to_owned(), ordinal))?;
        self.scalar(SerialKind::Enum, number as i32,
                    |w, tag, v| w.write_i32(
                        tag.with_encoding(NumberEncoding::Default), v),
                    |w, _, v| w.write_i32_value(NumberEncoding::Default, v))
    }

    /// Encodes an absent value.
    ///
    /// Only a message field can be absent, in which case nothing is
    /// written. Anywhere else there would be no way to tell on decode that
    /// the value was ever there.
    pub fn encode_none(self) -> Result<()> {
        match self.slot {
            Slot::Field(_) => Ok(()),
            Slot::TopLevel => Err(Error::AbsentValue("top level".to_owned())),
            Slot::Repeated(tag) => Err(Error::AbsentValue(
                format!("repeated field {}", tag.number))),
            Slot::Packed(_) => Err(Error::AbsentValue(
                "packed field".to_owned())),
        }
    }

    /// Opens a structure at this position.
    ///
    /// The layout depends on the structure's kind and where it sits:
    ///
    /// - A message at top level is written directly; anywhere else it is
    ///   framed as a length-delimited field.
    ///
    /// - A list or map in a message field writes each element as its own
    ///   field, all with the field's tag. If the tag is packed and the
    ///   elements are numeric, they are instead packed into one
    ///   length-delimited field, which is omitted if the list is empty.
    ///
    /// - A list or map that is an element of another list is framed as a
    ///   message whose elements all have field number 1.
    ///
    /// - A map entry is framed as a message with the key as field 1 and the
    ///   value as field 2.
    ///
    /// Lists and maps cannot be at top level.
    pub fn begin_structure(self, descriptor: Descriptor)
                           -> Result<CompositeEncoder<'p>> {
        let kind = descriptor.kind();
        let composition = match (kind, self.slot) {
            (k, Slot::TopLevel) if k.is_message() =>
                Composition::Message { parent_tag: None },
            (k, Slot::Field(tag)) | (k, Slot::Repeated(tag))
            if k.is_message() =>
                Composition::Message { parent_tag: Some(tag) },

            (SerialKind::List, Slot::Field(tag)) => {
                let packable = descriptor.element_kind()
                    .and_then(|k| k.packed_wire_type(tag.encoding))
                    .is_some();
                if tag.packed && packable {
                    Composition::Packed { tag: tag }
                } else {
                    Composition::Repeated { tag: tag }
                }
            },
            (SerialKind::Map, Slot::Field(tag)) =>
                Composition::Repeated { tag: tag },

            (SerialKind::List, Slot::Repeated(tag)) |
            (SerialKind::Map, Slot::Repeated(tag)) =>
                Composition::NestedRepeated { parent_tag: tag },

            (SerialKind::MapEntry, Slot::Field(tag)) |
            (SerialKind::MapEntry, Slot::Repeated(tag)) =>
                Composition::MapEntry { parent_tag: tag },

            (SerialKind::List, Slot::TopLevel) |
            (SerialKind::Map, Slot::TopLevel) |
            (SerialKind::MapEntry, Slot::TopLevel) =>
                return Err(Error::CollectionAtTopLevel(kind)),

            (k, Slot::TopLevel) => return Err(Error::PrimitiveAtTopLevel(k)),

            (k, _) => return Err(Error::UnsupportedKind(
                descriptor.name().to_owned(), k)),
        };

        if kind.is_message() {
            FieldIndex::build(&descriptor)?;
        }

        let scratch = match composition {
            Composition::Message { parent_tag: None } |
            Composition::Repeated { .. } => None,
            Composition::Message { parent_tag: Some(tag) } |
            Composition::Packed { tag } |
            Composition::NestedRepeated { parent_tag: tag } |
            Composition::MapEntry { parent_tag: tag } =>
                Some((tag, self.writer.nested())),
        };

        Ok(CompositeEncoder {
            descriptor: descriptor,
            composition: composition,
            parent: self.writer,
            scratch: scratch,
        })
    }
}

#[derive(Clone, Copy, Debug)]
enum Composition {
    Message { parent_tag: Option<FieldTag> },
    Repeated { tag: FieldTag },
    Packed { tag: FieldTag },
    NestedRepeated { parent_tag: FieldTag },
    MapEntry { parent_tag: FieldTag },
}

/// Encodes the elements of one structure.
///
/// Elements are written in the order they are encoded. Structures that end
/// up length-delimited are built in a scratch buffer and spliced into the
/// parent by `end_structure()`, which must therefore always be called.
pub struct CompositeEncoder<'p> {
    descriptor: Descriptor,
    composition: Composition,
    parent: &'p mut Writer,
    scratch: Option<(FieldTag, Writer)>,
}

impl<'p> CompositeEncoder<'p> {
    /// Returns the descriptor the structure was opened with.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn slot_for(&self, index: usize) -> Result<Slot> {
        let no_such = || Error::NoSuchElement(
            self.descriptor.name().to_owned(), index);
        Ok(match self.composition {
            Composition::Message { .. } =>
                Slot::Field(self.descriptor.tag_for(index).ok_or_else(no_such)?),
            Composition::MapEntry { parent_tag } => {
                if index > 1 {
                    return Err(no_such());
                }
                Slot::Field(FieldTag::new(index as u32 + 1)
                            .with_encoding(parent_tag.encoding))
            },
            Composition::Repeated { tag } => Slot::Repeated(tag),
            Composition::NestedRepeated { .. } =>
                Slot::Repeated(FieldTag::new(1)),
            Composition::Packed { tag } => Slot::Packed(tag.encoding),
        })
    }

    /// Returns an encoder for the element at `index`.
    pub fn element(&mut self, index: usize) -> Result<Encoder> {
        let slot = self.slot_for(index)?;
        let writer = match self.scratch {
            Some((_, ref mut scratch)) => scratch,
            None => &mut *self.parent,
        };
        Ok(Encoder { writer: writer, slot: slot })
    }

    /// Encodes `value` as the element at `index`.
    pub fn encode_element<T : Serialize + ?Sized>(&mut self, index: usize,
                                                  value: &T) -> Result<()> {
        value.serialize(self.element(index)?)
    }

    /// Closes the structure, splicing it into the parent if it was framed.
    pub fn end_structure(self) -> Result<()> {
        let CompositeEncoder { composition, parent, scratch, .. } = self;
        if let Some((tag, scratch)) = scratch {
            let omitted = match composition {
                Composition::Packed { .. } => scratch.is_empty(),
                _ => false,
            };
            if !omitted {
                parent.write_message(tag, &scratch);
            }
        }
        Ok(())
    }
}

macro_rules! ser_direct {
    ($t:ty, $method:ident) => {
        impl Serialize for $t {
            fn serialize(&self, encoder: Encoder) -> Result<()> {
                encoder.$method(*self)
            }
        }
    }
}

ser_direct!(bool, encode_bool);
ser_direct!(i8, encode_i8);
ser_direct!(i16, encode_i16);
ser_direct!(i32, encode_i32);
ser_direct!(i64, encode_i64);
ser_direct!(u16, encode_u16);
ser_direct!(u32, encode_u32);
ser_direct!(u64, encode_u64);
ser_direct!(char, encode_char);
ser_direct!(f32, encode_f32);
ser_direct!(f64, encode_f64);

impl Serialize for str {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        encoder.encode_str(self)
    }
}

impl Serialize for String {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        encoder.encode_str(self)
    }
}

impl Serialize for [u8] {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        encoder.encode_bytes(self)
    }
}

impl Serialize for Vec<u8> {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        encoder.encode_bytes(self)
    }
}

impl<T : Serialize> Serialize for [T] {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        let mut list = encoder.begin_structure(<[T]>::descriptor())?;
        for (index, element) in self.iter().enumerate() {
            list.encode_element(index, element)?;
        }
        list.end_structure()
    }
}

impl<T : Serialize> Serialize for Vec<T> {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        (**self).serialize(encoder)
    }
}

/// An absent optional field writes nothing at all. `None` cannot be an
/// element of a list.
impl<T : Serialize> Serialize for Option<T> {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        match *self {
            Some(ref value) => value.serialize(encoder),
            None => encoder.encode_none(),
        }
    }
}

impl<T : Serialize + ?Sized> Serialize for Box<T> {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        (**self).serialize(encoder)
    }
}

struct EntryRef<'e, K : 'e, V : 'e>(&'e K, &'e V);

impl<'e, K : Schema, V : Schema> Schema for EntryRef<'e, K, V> {
    fn kind() -> SerialKind {
        SerialKind::MapEntry
    }

    fn descriptor() -> Descriptor {
        Descriptor::map_entry(K::kind(), V::kind())
    }
}

impl<'e, K : Serialize, V : Serialize> Serialize for EntryRef<'e, K, V> {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        let mut entry = encoder.begin_structure(Self::descriptor())?;
        entry.encode_element(0, self.0)?;
        entry.encode_element(1, self.1)?;
        entry.end_structure()
    }
}

fn serialize_map<'e, K, V, I>(encoder: Encoder, descriptor: Descriptor,
                              entries: I) -> Result<()>
where K : Serialize + 'e, V : Serialize + 'e,
      I : Iterator<Item = (&'e K, &'e V)> {
    let mut map = encoder.begin_structure(descriptor)?;
    for (index, (key, value)) in entries.enumerate() {
        map.encode_element(index, &EntryRef(key, value))?;
    }
    map.end_structure()
}

impl<K : Serialize + Eq + Hash, V : Serialize, S : BuildHasher>
Serialize for HashMap<K, V, S> {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        serialize_map(encoder, Self::descriptor(), self.iter())
    }
}

impl<K : Serialize + Ord, V : Serialize> Serialize for BTreeMap<K, V> {
    fn serialize(&self, encoder: Encoder) -> Result<()> {
        serialize_map(encoder, Self::descriptor(), self.iter())
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use descriptor::{Descriptor, ElementDescriptor, SerialKind};
    use error::Error;
    use stream::{FieldTag, NumberEncoding, Writer};
    use test_helpers::hex;
    use super::*;

    fn field(tag: FieldTag, f: &Fn (Encoder) -> Result<()>) -> Vec<u8> {
        let mut writer = Writer::new();
        f(Encoder { writer: &mut writer, slot: Slot::Field(tag) }).unwrap();
        writer.into_bytes()
    }

    #[test]
    fn scalars_follow_tag_encoding() {
        assert_eq!(hex("08 96 01"),
                   field(FieldTag::new(1), &|e| e.encode_i32(150)));
        assert_eq!(hex("10 03"),
                   field(FieldTag::new(2)
                         .with_encoding(NumberEncoding::Signed),
                         &|e| e.encode_i64(-2)));
        assert_eq!(hex("0D 01 00 00 00"),
                   field(FieldTag::new(1)
                         .with_encoding(NumberEncoding::Fixed),
                         &|e| e.encode_u32(1)));
        assert_eq!(hex("08 FF FF FF FF FF FF FF FF FF 01"),
                   field(FieldTag::new(1), &|e| e.encode_i8(-1)));
        assert_eq!(hex("08 01"), field(FieldTag::new(1), &|e| e.encode_bool(true)));
        assert_eq!(hex("0A 02 'hi'"),
                   field(FieldTag::new(1), &|e| e.encode_str("hi")));
    }

    #[test]
    fn enums_write_their_number() {
        let desc = Descriptor::new("E", SerialKind::Enum)
            .element(ElementDescriptor::new("A", SerialKind::Enum))
            .element(ElementDescriptor::new("B", SerialKind::Enum).number(9));
        assert_eq!(hex("18 09"),
                   field(FieldTag::new(3), &|e| e.encode_enum(&desc, 1)));
        assert_eq!(hex("18 09"),
                   field(FieldTag::new(3)
                         .with_encoding(NumberEncoding::Fixed),
                         &|e| e.encode_enum(&desc, 1)));
        assert_eq!(hex("18 09"),
                   field(FieldTag::new(3)
                         .with_encoding(NumberEncoding::Signed),
                         &|e| e.encode_enum(&desc, 1)));
    }

    #[test]
    fn scalars_rejected_at_top_level() {
        match to_vec(&5i32) {
            Err(Error::PrimitiveAtTopLevel(SerialKind::I32)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
        match to_vec("x") {
            Err(Error::PrimitiveAtTopLevel(SerialKind::String)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn collections_rejected_at_top_level() {
        match to_vec(&vec![1i32, 2]) {
            Err(Error::CollectionAtTopLevel(SerialKind::List)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
        let mut map = BTreeMap::new();
        map.insert(1u32, 2u32);
        match to_vec(&map) {
            Err(Error::CollectionAtTopLevel(SerialKind::Map)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn list_fields_repeat_the_tag() {
        assert_eq!(hex("08 01 08 02 08 03"),
                   field(FieldTag::new(1), &|e| vec![1i32, 2, 3].serialize(e)));
        assert_eq!(Vec::<u8>::new(),
                   field(FieldTag::new(1), &|e| Vec::<i32>::new().serialize(e)));
    }

    #[test]
    fn packed_lists_share_one_field() {
        let tag = FieldTag::new(4).with_packed(true);
        assert_eq!(hex("22 06 03 8E 02 9E A7 05"),
                   field(tag, &|e| vec![3i32, 270, 86942].serialize(e)));
        assert_eq!(Vec::<u8>::new(),
                   field(tag, &|e| Vec::<i32>::new().serialize(e)));
        // Strings cannot be packed, so the flag is ignored.
        assert_eq!(hex("22 01 'a' 22 01 'b'"),
                   field(tag, &|e| vec!["a".to_owned(), "b".to_owned()]
                         .serialize(e)));
    }

    #[test]
    fn nested_lists_are_framed() {
        assert_eq!(hex("0A 04 08 01 08 02 0A 00 0A 02 08 03"),
                   field(FieldTag::new(1),
                         &|e| vec![vec![1i32, 2], vec![], vec![3]]
                         .serialize(e)));
    }

    #[test]
    fn map_entries_use_fields_one_and_two() {
        let mut map = BTreeMap::new();
        map.insert(1i32, "x".to_owned());
        map.insert(2i32, "y".to_owned());
        assert_eq!(hex("2A 05 08 01 12 01 'x' 2A 05 08 02 12 01 'y'"),
                   field(FieldTag::new(5), &|e| map.serialize(e)));
    }

    #[test]
    fn absent_option_writes_nothing() {
        assert_eq!(Vec::<u8>::new(),
                   field(FieldTag::new(1), &|e| None::<i32>.serialize(e)));
        assert_eq!(hex("08 07"),
                   field(FieldTag::new(1), &|e| Some(7i32).serialize(e)));
    }

    #[test]
    fn absent_list_elements_rejected() {
        let mut writer = Writer::new();
        let encoder = Encoder { writer: &mut writer,
                                slot: Slot::Field(FieldTag::new(1)) };
        match vec![Some(1i32), None, Some(2)].serialize(encoder) {
            Err(Error::AbsentValue(ref wo)) if "repeated field 1" == wo => (),
            r => panic!("Unexpected result: {:?}", r),
        }

        let mut writer = Writer::new();
        let encoder = Encoder {
            writer: &mut writer,
            slot: Slot::Field(FieldTag::new(2).with_packed(true)),
        };
        match vec![None, Some(1i32)].serialize(encoder) {
            Err(Error::AbsentValue(ref wo)) if "packed field" == wo => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }
}
