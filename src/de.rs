//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Defines traits and utilities for high-level deserialisation.
//!
//! Decoding is driven by the type being built. A `Deserialize`
//! implementation is handed a `Decoder` for its position in the message,
//! and either pulls a scalar out of it or opens a `CompositeDecoder` and
//! asks it for element indices until the structure is exhausted.

use std::char;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::io::Read;
use std::{i8, i16, u16};

use quick_error::ResultExt;

use descriptor::{Descriptor, FieldIndex, Schema, SerialKind, Slot};
use error::{Error, Result};
use io;
use stream::{FieldTag, NumberEncoding, Reader};
use wire::{FieldHeader, WireType};

/// Deserialises an instance of `T` from the given byte slice.
///
/// `bytes` must hold exactly one message; there is no way to tell where a
/// message ends other than the end of its input. Use `from_reader_delimited`
/// for streams of several messages.
pub fn from_slice<T : Deserialize>(bytes: &[u8], config: &Config)
                                   -> Result<T> {
    let context = Context::top(config);
    let mut reader = Reader::from_slice(bytes).context(&context)?;
    T::deserialize(Decoder::top_level(&mut reader, &context))
}

/// Reads one length-prefixed message from `src` and deserialises it.
///
/// Returns `Ok(None)` if `src` was already at end of input.
pub fn from_reader_delimited<R : Read, T : Deserialize>
    (src: &mut R, config: &Config) -> Result<Option<T>>
{
    match io::read_delimited(src, config.max_delimited_len)? {
        Some(message) => from_slice(&message, config).map(Some),
        None => {
            debug!("end of delimited stream");
            Ok(None)
        },
    }
}

/// Run-time configuration for deserialisation.
#[derive(Debug, Clone)]
pub struct Config {
    /// The maximum recursion level to allow.
    pub recursion_limit: usize,
    /// If true, fields with numbers the target message does not know are
    /// skipped silently. If false, they raise `Error::UnknownField`.
    pub ignore_unknown_fields: bool,
    /// The largest message `from_reader_delimited` will buffer.
    ///
    /// The default is 64MB.
    pub max_delimited_len: u64,
    _non_public: (),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            recursion_limit: 100,
            ignore_unknown_fields: true,
            max_delimited_len: 64 * 1024 * 1024,
            _non_public: (),
        }
    }
}

/// Tracks contextual information during deserialisation.
///
/// This is used for constructing helpful error messages and controlling
/// recursion depth.
///
/// `Context` objects are typically constructed on the stack and passed to
/// sub-deserialisers by reference.
///
/// A `Context` can be formatted with `Display` to show the path to the current
/// location, including both field names and offsets.
#[derive(Debug, Clone)]
pub struct Context<'a> {
    /// The context for the "container" of this level of deserialisation, if
    /// any.
    pub next: Option<&'a Context<'a>>,
    /// The name of the field being deserialised at this level.
    pub field: &'a str,
    /// The position of the field being deserialised at this level.
    pub pos: u64,
    /// The recursion depth.
    pub depth: usize,
    /// The configuration to use when deserialising this level's immediate
    /// children.
    pub config: &'a Config,
    _non_public: (),
}

impl<'a> Context<'a> {
    /// Returns a "top-level" context referencing the given config.
    pub fn top(config: &'a Config) -> Self {
        Context {
            next: None,
            field: "",
            pos: 0,
            depth: 0,
            config: config,
            _non_public: (),
        }
    }

    /// Creates a context subordinate to this one for the given field, provided
    /// it does not exceed the recursion limit.
    pub fn push(&'a self, field: &'a str, pos: u64) -> Result<Self> {
        if self.depth >= self.config.recursion_limit {
            Err(Error::RecursionLimitExceeded(self.to_string()))
        } else {
            Ok(Context {
                next: Some(self),
                field: field,
                pos: pos,
                depth: self.depth + 1,
                config: self.config,
                _non_public: (),
            })
        }
    }

    /// If unknown fields are to result in an error, return such an error.
    /// Otherwise, return `Ok(())`.
    pub fn unknown_field(&self, number: u32, pos: u64) -> Result<()> {
        if self.config.ignore_unknown_fields {
            Ok(())
        } else {
            Err(Error::UnknownField(self.to_string(), number, pos))
        }
    }

    /// Returns an `InvalidValue` error located at this context.
    pub fn invalid_value<S : Into<String>>(&self, msg: S) -> Error {
        Error::InvalidValue(self.to_string(), msg.into())
    }
}

impl<'a> fmt::Display for Context<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref next) = self.next {
            write!(f, "{}.{}{{{}}}", next, self.field, self.pos)
        } else {
            write!(f, "{}{{{}}}", self.field, self.pos)
        }
    }
}

/// Trait for types which can be decoded from the wire format.
///
/// A value is built in two steps. Every occurrence of the value's field is
/// fed into an accumulator with `deserialize_field`, then `finish` turns the
/// accumulator into the value once the enclosing message has ended. This is
/// what lets a repeated field whose elements are interleaved with other
/// fields come back as one list. For any other field that occurs more than
/// once, the last occurrence wins.
pub trait Deserialize : Schema + Sized {
    /// The accumulator for occurrences of this value.
    type Accum : Default;

    /// Folds one occurrence of this value into `accum`.
    fn deserialize_field(accum: &mut Self::Accum, decoder: Decoder)
                         -> Result<()>;

    /// Produces the final value once no more occurrences are possible.
    ///
    /// `context` identifies the field, for use in errors about it being
    /// absent.
    fn finish(accum: Self::Accum, context: &Context) -> Result<Self>;

    /// Decodes a single complete value.
    fn deserialize(decoder: Decoder) -> Result<Self> {
        let context = decoder.context();
        let mut accum: Self::Accum = Default::default();
        Self::deserialize_field(&mut accum, decoder)?;
        Self::finish(accum, context)
    }
}

/// Decodes the single value at one position of a message.
///
/// Scalars are read with one of the `decode_*` methods; structures are
/// opened with `begin_structure()`. Either way the decoder is consumed.
pub struct Decoder<'p, 'a : 'p> {
    reader: &'p mut Reader<'a>,
    slot: Slot,
    context: &'p Context<'p>,
}

impl<'p, 'a : 'p> Decoder<'p, 'a> {
    /// Creates a decoder for the outermost message in `reader`.
    pub fn top_level(reader: &'p mut Reader<'a>, context: &'p Context<'p>)
                     -> Self {
        Decoder {
            reader: reader,
            slot: Slot::TopLevel,
            context: context,
        }
    }

    /// Returns the context of the value being decoded.
    pub fn context(&self) -> &'p Context<'p> {
        self.context
    }

    fn encoding(&self, kind: SerialKind) -> Result<NumberEncoding> {
        match self.slot {
            Slot::TopLevel => Err(Error::PrimitiveAtTopLevel(kind)),
            Slot::Field(tag) | Slot::Repeated(tag) => Ok(tag.encoding),
            Slot::Packed(encoding) => Ok(encoding),
        }
    }

    fn delimited(&self, kind: SerialKind) -> Result<()> {
        match self.slot {
            Slot::TopLevel => Err(Error::PrimitiveAtTopLevel(kind)),
            Slot::Packed(_) => Err(Error::UnsupportedKind(
                self.context.to_string(), kind)),
            Slot::Field(_) | Slot::Repeated(_) => Ok(()),
        }
    }

    /// Decodes an `i32`.
    pub fn decode_i32(self) -> Result<i32> {
        let encoding = self.encoding(SerialKind::I32)?;
        Ok(self.reader.next_i32(encoding).context(self.context)?)
    }

    /// Decodes an `i64`.
    pub fn decode_i64(self) -> Result<i64> {
        let encoding = self.encoding(SerialKind::I64)?;
        Ok(self.reader.next_i64(encoding).context(self.context)?)
    }

    /// Decodes a `u32`.
    pub fn decode_u32(self) -> Result<u32> {
        let encoding = self.encoding(SerialKind::U32)?;
        Ok(self.reader.next_u32(encoding).context(self.context)?)
    }

    /// Decodes a `u64`.
    pub fn decode_u64(self) -> Result<u64> {
        let encoding = self.encoding(SerialKind::U64)?;
        Ok(self.reader.next_u64(encoding).context(self.context)?)
    }

    /// Decodes an `f32`.
    pub fn decode_f32(self) -> Result<f32> {
        self.encoding(SerialKind::F32)?;
        Ok(self.reader.next_f32().context(self.context)?)
    }

    /// Decodes an `f64`.
    pub fn decode_f64(self) -> Result<f64> {
        self.encoding(SerialKind::F64)?;
        Ok(self.reader.next_f64().context(self.context)?)
    }

    /// Decodes a `bool`, which must have been written as 0 or 1.
    pub fn decode_bool(self) -> Result<bool> {
        let context = self.context;
        match self.decode_i32()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(context.invalid_value(
                format!("boolean must be 0 or 1, found {}", v))),
        }
    }

    /// Decodes an `i8`, rejecting values outside its range.
    pub fn decode_i8(self) -> Result<i8> {
        let context = self.context;
        let v = self.decode_i32()?;
        if v < i8::MIN as i32 || v > i8::MAX as i32 {
            return Err(context.invalid_value(
                format!("{} is out of range for i8", v)));
        }
        Ok(v as i8)
    }

    /// Decodes an `i16`, rejecting values outside its range.
    pub fn decode_i16(self) -> Result<i16> {
        let context = self.context;
        let v = self.decode_i32()?;
        if v < i16::MIN as i32 || v > i16::MAX as i32 {
            return Err(context.invalid_value(
                format!("{} is out of range for i16", v)));
        }
        Ok(v as i16)
    }

    /// Decodes a `u16`, rejecting values outside its range.
    pub fn decode_u16(self) -> Result<u16> {
        let context = self.context;
        let v = self.decode_u32()?;
        if v > u16::MAX as u32 {
            return Err(context.invalid_value(
                format!("{} is out of range for u16", v)));
        }
        Ok(v as u16)
    }

    /// Decodes a `char` from its code point.
    pub fn decode_char(self) -> Result<char> {
        let context = self.context;
        let v = self.decode_u32()?;
        char::from_u32(v).ok_or_else(|| context.invalid_value(
            format!("{:#x} is not a valid char", v)))
    }

    /// Decodes a string.
    pub fn decode_str(self) -> Result<&'a str> {
        self.delimited(SerialKind::String)?;
        Ok(self.reader.next_str().context(self.context)?)
    }

    /// Decodes a byte string.
    pub fn decode_bytes(self) -> Result<&'a [u8]> {
        self.delimited(SerialKind::Bytes)?;
        Ok(self.reader.next_bytes().context(self.context)?)
    }

    /// Decodes an enum, returning the ordinal of the entry whose number was
    /// found on the wire.
    pub fn decode_enum(self, descriptor: &Descriptor) -> Result<usize> {
        self.encoding(SerialKind::Enum)?;
        let context = self.context;
        let number = self.reader.next_i32(NumberEncoding::Default)
            .context(context)?;
        if number >= 0 {
            if let Some(ordinal) = descriptor.enum_ordinal(number as u32) {
                return Ok(ordinal);
            }
        }
        Err(context.invalid_value(
            format!("{} is not a known value of {}",
                    number, descriptor.name())))
    }

    /// Opens the structure at this position.
    ///
    /// How the structure is found on the wire depends on both its kind and
    /// where it sits; see `CompositeEncoder` for the layouts.
    pub fn begin_structure(self, descriptor: Descriptor)
                           -> Result<CompositeDecoder<'p, 'a>> {
        let kind = descriptor.kind();
        let Decoder { reader, slot, context } = self;

        let (composition, source) = match (kind, slot) {
            (k, Slot::TopLevel) if k.is_message() =>
                (Composition::Message(FieldIndex::build(&descriptor)?),
                 Source::Borrowed(reader)),

            (k, Slot::Field(_)) | (k, Slot::Repeated(_)) if k.is_message() => {
                let index = FieldIndex::build(&descriptor)?;
                let nested = reader.next_message().context(context)?;
                (Composition::Message(index), Source::Owned(nested))
            },

            (SerialKind::List, Slot::Field(tag)) => {
                let packed = match (reader.current(),
                                    descriptor.element_kind()) {
                    (Some(header), Some(element))
                    if WireType::LengthDelimited == header.wire_type =>
                        element.packed_wire_type(tag.encoding),
                    _ => None,
                };

                match packed {
                    Some(wire_type) => {
                        debug!("reading packed field {} as {:?} at {}",
                               tag.number, wire_type, reader.field_pos());
                        let payload = reader.next_packed(wire_type)
                            .context(context)?;
                        (Composition::Packed(tag), Source::Owned(payload))
                    },
                    None => (Composition::Repeated(tag),
                             Source::Borrowed(reader)),
                }
            },

            (SerialKind::Map, Slot::Field(tag)) =>
                (Composition::Repeated(tag), Source::Borrowed(reader)),

            // A list or map that is itself an element of a list gets a
            // message of its own, with its elements under field 1.
            (SerialKind::List, Slot::Repeated(_)) |
            (SerialKind::Map, Slot::Repeated(_)) => {
                let nested = reader.next_message().context(context)?;
                (Composition::Repeated(FieldTag::new(1)),
                 Source::Owned(nested))
            },

            (SerialKind::MapEntry, Slot::Field(tag)) |
            (SerialKind::MapEntry, Slot::Repeated(tag)) => {
                let nested = reader.next_message().context(context)?;
                (Composition::MapEntry(tag), Source::Owned(nested))
            },

            (SerialKind::List, Slot::TopLevel) |
            (SerialKind::Map, Slot::TopLevel) |
            (SerialKind::MapEntry, Slot::TopLevel) =>
                return Err(Error::CollectionAtTopLevel(kind)),

            (k, Slot::TopLevel) => return Err(Error::PrimitiveAtTopLevel(k)),

            (k, _) => return Err(Error::UnsupportedKind(
                context.to_string(), k)),
        };

        Ok(CompositeDecoder {
            descriptor: descriptor,
            composition: composition,
            source: source,
            context: context,
            count: 0,
        })
    }
}

enum Composition {
    Message(FieldIndex),
    Repeated(FieldTag),
    Packed(FieldTag),
    MapEntry(FieldTag),
}

enum Source<'p, 'a : 'p> {
    Borrowed(&'p mut Reader<'a>),
    Owned(Reader<'a>),
}

/// Decodes the elements of one structure.
///
/// The usual pattern is to call `decode_element_index()` until it returns
/// `None`, handling each index it does return with exactly one call to
/// `decode_element()`, `decode_element_into()` or `skip_element()`, and
/// finally to call `end_structure()`.
pub struct CompositeDecoder<'p, 'a : 'p> {
    descriptor: Descriptor,
    composition: Composition,
    source: Source<'p, 'a>,
    context: &'p Context<'p>,
    count: usize,
}

impl<'p, 'a : 'p> CompositeDecoder<'p, 'a> {
    fn reader(&mut self) -> &mut Reader<'a> {
        match self.source {
            Source::Borrowed(ref mut reader) => &mut **reader,
            Source::Owned(ref mut reader) => reader,
        }
    }

    fn reader_ref(&self) -> &Reader<'a> {
        match self.source {
            Source::Borrowed(ref reader) => &**reader,
            Source::Owned(ref reader) => reader,
        }
    }

    /// Returns the context of the structure itself.
    pub fn context(&self) -> &'p Context<'p> {
        self.context
    }

    /// Returns the descriptor the structure was opened with.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Returns the index of the next element present on the wire, or `None`
    /// once the structure has no more elements.
    ///
    /// Fields of a message that the descriptor does not know are skipped
    /// here, or rejected if `Config::ignore_unknown_fields` is false. For
    /// lists and maps, indices simply count up from 0.
    pub fn decode_element_index(&mut self) -> Result<Option<usize>> {
        loop {
            let header = match self.reader_ref().current() {
                Some(header) => header,
                None => return Ok(None),
            };

            let found = match self.composition {
                Composition::Message(ref index) => index.lookup(header.number),
                Composition::MapEntry(_) => match header.number {
                    1 => Some(0),
                    2 => Some(1),
                    _ => None,
                },
                Composition::Repeated(tag) => {
                    if header.number != tag.number ||
                        self.switches_to_packed(tag, header)
                    {
                        return Ok(None);
                    }
                    self.count += 1;
                    return Ok(Some(self.count - 1));
                },
                Composition::Packed(_) => {
                    self.count += 1;
                    return Ok(Some(self.count - 1));
                },
            };

            match found {
                Some(index) => return Ok(Some(index)),
                None => self.skip_unknown(header)?,
            }
        }
    }

    // A run of unpacked elements may be followed by a packed occurrence of
    // the same field. Ending the run here lets the parent reopen the list,
    // which then reads the packed payload.
    fn switches_to_packed(&self, tag: FieldTag, header: FieldHeader) -> bool {
        match self.source {
            Source::Owned(_) => false,
            Source::Borrowed(_) =>
                WireType::LengthDelimited == header.wire_type &&
                self.descriptor.element_kind()
                    .and_then(|k| k.packed_wire_type(tag.encoding))
                    .is_some(),
        }
    }

    fn skip_unknown(&mut self, header: FieldHeader) -> Result<()> {
        let pos = self.reader_ref().field_pos();
        self.context.unknown_field(header.number, pos)?;
        trace!("skipping unknown field {} ({:?}) at {} in {}",
               header.number, header.wire_type, pos, self.descriptor.name());
        self.skip_element()
    }

    /// Skips the current element without decoding it.
    pub fn skip_element(&mut self) -> Result<()> {
        let context = self.context;
        self.reader().skip_field().context(context)?;
        Ok(())
    }

    fn slot_for(&self, index: usize) -> Result<Slot> {
        let no_such = || Error::NoSuchElement(
            self.descriptor.name().to_owned(), index);
        Ok(match self.composition {
            Composition::Message(_) =>
                Slot::Field(self.descriptor.tag_for(index).ok_or_else(no_such)?),
            Composition::MapEntry(parent) => {
                if index > 1 {
                    return Err(no_such());
                }
                Slot::Field(FieldTag::new(index as u32 + 1)
                            .with_encoding(parent.encoding))
            },
            Composition::Repeated(tag) => Slot::Repeated(tag),
            Composition::Packed(tag) => Slot::Packed(tag.encoding),
        })
    }

    fn element_name(&self, index: usize) -> &'static str {
        match self.composition {
            Composition::Repeated(_) | Composition::Packed(_) =>
                self.descriptor.element_name(0),
            _ => self.descriptor.element_name(index),
        }
    }

    /// Decodes the element at `index` into an accumulator, which must later
    /// be passed to `finish_element()`.
    pub fn decode_element_into<T : Deserialize>
        (&mut self, index: usize, accum: &mut T::Accum) -> Result<()>
    {
        let slot = self.slot_for(index)?;
        let name = self.element_name(index);
        let pos = self.reader_ref().field_pos();
        let parent = self.context;
        let context = parent.push(name, pos)?;
        T::deserialize_field(accum, Decoder {
            reader: self.reader(),
            slot: slot,
            context: &context,
        })
    }

    /// Decodes the complete element at `index`.
    pub fn decode_element<T : Deserialize>(&mut self, index: usize)
                                           -> Result<T> {
        let mut accum: T::Accum = Default::default();
        self.decode_element_into::<T>(index, &mut accum)?;
        self.finish_element::<T>(self.element_name(index), accum)
    }

    /// Turns an accumulator filled by `decode_element_into()` into the
    /// element's value.
    pub fn finish_element<T : Deserialize>(&self, name: &'static str,
                                           accum: T::Accum) -> Result<T> {
        let context = self.context.push(name, self.reader_ref().field_pos())?;
        T::finish(accum, &context)
    }

    /// Closes the structure.
    pub fn end_structure(self) -> Result<()> {
        Ok(())
    }
}

macro_rules! des_direct {
    ($t:ty, $method:ident) => {
        impl Deserialize for $t {
            type Accum = Option<$t>;

            fn deserialize_field(accum: &mut Option<$t>, decoder: Decoder)
                                 -> Result<()> {
                *accum = Some(decoder.$method()?);
                Ok(())
            }

            fn finish(accum: Option<$t>, context: &Context) -> Result<$t> {
                accum.ok_or_else(
                    || Error::RequiredFieldMissing(context.to_string()))
            }
        }
    }
}

des_direct!(bool, decode_bool);
des_direct!(i8, decode_i8);
des_direct!(i16, decode_i16);
des_direct!(i32, decode_i32);
des_direct!(i64, decode_i64);
des_direct!(u16, decode_u16);
des_direct!(u32, decode_u32);
des_direct!(u64, decode_u64);
des_direct!(char, decode_char);
des_direct!(f32, decode_f32);
des_direct!(f64, decode_f64);

impl Deserialize for String {
    type Accum = Option<String>;

    fn deserialize_field(accum: &mut Option<String>, decoder: Decoder)
                         -> Result<()> {
        *accum = Some(decoder.decode_str()?.to_owned());
        Ok(())
    }

    fn finish(accum: Option<String>, context: &Context) -> Result<String> {
        accum.ok_or_else(|| Error::RequiredFieldMissing(context.to_string()))
    }
}

impl Deserialize for Vec<u8> {
    type Accum = Option<Vec<u8>>;

    fn deserialize_field(accum: &mut Option<Vec<u8>>, decoder: Decoder)
                         -> Result<()> {
        *accum = Some(decoder.decode_bytes()?.to_vec());
        Ok(())
    }

    fn finish(accum: Option<Vec<u8>>, context: &Context) -> Result<Vec<u8>> {
        accum.ok_or_else(|| Error::RequiredFieldMissing(context.to_string()))
    }
}

impl<T : Deserialize> Deserialize for Vec<T> {
    type Accum = Vec<T>;

    fn deserialize_field(accum: &mut Vec<T>, decoder: Decoder)
                         -> Result<()> {
        let mut list = decoder.begin_structure(Self::descriptor())?;
        while let Some(index) = list.decode_element_index()? {
            let element = list.decode_element::<T>(index)?;
            accum.push(element);
        }
        list.end_structure()
    }

    fn finish(accum: Vec<T>, _: &Context) -> Result<Vec<T>> {
        Ok(accum)
    }
}

impl<T : Deserialize> Deserialize for Option<T> {
    type Accum = Option<T::Accum>;

    fn deserialize_field(accum: &mut Option<T::Accum>, decoder: Decoder)
                         -> Result<()> {
        T::deserialize_field(accum.get_or_insert_with(Default::default),
                             decoder)
    }

    fn finish(accum: Option<T::Accum>, context: &Context)
              -> Result<Option<T>> {
        match accum {
            Some(accum) => T::finish(accum, context).map(Some),
            None => Ok(None),
        }
    }
}

impl<T : Deserialize> Deserialize for Box<T> {
    type Accum = T::Accum;

    fn deserialize_field(accum: &mut T::Accum, decoder: Decoder)
                         -> Result<()> {
        T::deserialize_field(accum, decoder)
    }

    fn finish(accum: T::Accum, context: &Context) -> Result<Box<T>> {
        T::finish(accum, context).map(Box::new)
    }
}

/// One decoded pair of a map.
struct Entry<K, V>(K, V);

impl<K : Schema, V : Schema> Schema for Entry<K, V> {
    fn kind() -> SerialKind {
        SerialKind::MapEntry
    }

    fn descriptor() -> Descriptor {
        Descriptor::map_entry(K::kind(), V::kind())
    }
}

impl<K : Deserialize, V : Deserialize> Deserialize for Entry<K, V> {
    type Accum = Option<Self>;

    fn deserialize_field(accum: &mut Option<Self>, decoder: Decoder)
                         -> Result<()> {
        let mut entry = decoder.begin_structure(Self::descriptor())?;
        let mut key: K::Accum = Default::default();
        let mut value: V::Accum = Default::default();
        while let Some(index) = entry.decode_element_index()? {
            if 0 == index {
                entry.decode_element_into::<K>(0, &mut key)?;
            } else {
                entry.decode_element_into::<V>(1, &mut value)?;
            }
        }

        let key = entry.finish_element::<K>("key", key)?;
        let value = entry.finish_element::<V>("value", value)?;
        entry.end_structure()?;
        *accum = Some(Entry(key, value));
        Ok(())
    }

    fn finish(accum: Option<Self>, context: &Context) -> Result<Self> {
        accum.ok_or_else(|| Error::RequiredFieldMissing(context.to_string()))
    }
}

fn deserialize_map<K, V, F>(decoder: Decoder, descriptor: Descriptor,
                            mut insert: F) -> Result<()>
where K : Deserialize, V : Deserialize, F : FnMut (K, V) {
    let mut map = decoder.begin_structure(descriptor)?;
    while let Some(index) = map.decode_element_index()? {
        let Entry(key, value) = map.decode_element::<Entry<K, V>>(index)?;
        insert(key, value);
    }
    map.end_structure()
}

impl<K : Deserialize + Eq + Hash, V : Deserialize,
     S : BuildHasher + Default> Deserialize for HashMap<K, V, S> {
    type Accum = HashMap<K, V, S>;

    fn deserialize_field(accum: &mut Self, decoder: Decoder) -> Result<()> {
        deserialize_map(decoder, Self::descriptor(),
                        |k, v| { accum.insert(k, v); })
    }

    fn finish(accum: Self, _: &Context) -> Result<Self> {
        Ok(accum)
    }
}

impl<K : Deserialize + Ord, V : Deserialize> Deserialize for BTreeMap<K, V> {
    type Accum = BTreeMap<K, V>;

    fn deserialize_field(accum: &mut Self, decoder: Decoder) -> Result<()> {
        deserialize_map(decoder, Self::descriptor(),
                        |k, v| { accum.insert(k, v); })
    }

    fn finish(accum: Self, _: &Context) -> Result<Self> {
        Ok(accum)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::io;

    use error::Error;
    use test_helpers::hex;
    use super::*;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn context_display_shows_path() {
        let config = config();
        let top = Context::top(&config);
        let a = top.push("a", 3).unwrap();
        let b = a.push("b", 7).unwrap();
        assert_eq!("{0}.a{3}.b{7}", b.to_string());
    }

    #[test]
    fn context_push_enforces_recursion_limit() {
        let mut config = config();
        config.recursion_limit = 1;
        let top = Context::top(&config);
        let a = top.push("a", 0).unwrap();
        match a.push("b", 1) {
            Err(Error::RecursionLimitExceeded(_)) => (),
            r => panic!("Unexpected result: {:?}", r.map(|c| c.depth)),
        }
    }

    #[test]
    fn top_level_primitives_rejected() {
        match from_slice::<i32>(&hex("08 01"), &config()) {
            Err(Error::PrimitiveAtTopLevel(SerialKind::I32)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
        match from_slice::<String>(&[], &config()) {
            Err(Error::PrimitiveAtTopLevel(SerialKind::String)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn top_level_collections_rejected() {
        match from_slice::<Vec<i32>>(&hex("08 01"), &config()) {
            Err(Error::CollectionAtTopLevel(SerialKind::List)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
        match from_slice::<BTreeMap<String, i32>>(&[], &config()) {
            Err(Error::CollectionAtTopLevel(SerialKind::Map)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn truncated_header_reports_location() {
        match from_slice::<Vec<i32>>(&hex("80"), &config()) {
            Err(Error::Stream(..)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn delimited_reader_stops_cleanly() {
        let mut input = io::Cursor::new(Vec::<u8>::new());
        match from_reader_delimited::<_, Vec<i32>>(&mut input, &config()) {
            Ok(None) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }

    #[test]
    fn delimited_reader_honours_limit() {
        let mut config = config();
        config.max_delimited_len = 2;
        let mut input = io::Cursor::new(hex("03 08 01 10"));
        match from_reader_delimited::<_, Vec<i32>>(&mut input, &config) {
            Err(Error::Io(_)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }
    }
}
