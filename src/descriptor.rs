//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Descriptions of the shape of serialisable types.
//!
//! The codec never inspects a Rust type directly. Instead, each type hands
//! out a `Descriptor` through the `Schema` trait, and the codec asks that
//! descriptor what kind of structure it is looking at and which field tag
//! each element gets.

use std::collections::{BTreeMap, HashMap};

use error::{Error, Result};
use stream::{FieldTag, NumberEncoding};
use wire::{self, WireType};

/// The structural kind of a serialisable type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SerialKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U32,
    U64,
    Char,
    F32,
    F64,
    String,
    Bytes,
    /// A fieldless enum, encoded as the number of the selected entry.
    Enum,
    /// A struct with named elements.
    Class,
    /// A type with exactly one value and no elements.
    Object,
    /// A closed set of alternatives, encoded as discriminator plus value.
    Sealed,
    /// An open set of alternatives. Framed exactly like `Sealed`.
    Polymorphic,
    /// A sequence of values sharing one element kind.
    List,
    /// A collection of key/value pairs.
    Map,
    /// One key/value pair of a `Map`.
    MapEntry,
}

impl SerialKind {
    /// Returns whether values of this kind are framed as a nested message.
    pub fn is_message(self) -> bool {
        match self {
            SerialKind::Class | SerialKind::Object |
            SerialKind::Sealed | SerialKind::Polymorphic => true,
            _ => false,
        }
    }

    /// Returns the wire type of each value when a repeated field of this
    /// kind is packed, or `None` if the kind cannot be packed.
    pub fn packed_wire_type(self, encoding: NumberEncoding)
                            -> Option<WireType> {
        match self {
            SerialKind::Bool | SerialKind::I8 | SerialKind::I16 |
            SerialKind::I32 | SerialKind::U32 | SerialKind::Char =>
                Some(encoding.wire_type_32()),
            SerialKind::Enum => Some(WireType::Varint),
            SerialKind::I64 | SerialKind::U64 =>
                Some(encoding.wire_type_64()),
            SerialKind::F32 => Some(WireType::Fixed32),
            SerialKind::F64 => Some(WireType::Fixed64),
            _ => None,
        }
    }
}

/// Describes one element of a structure: a field of a message, the element
/// type of a list, or an entry of an enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementDescriptor {
    name: &'static str,
    kind: SerialKind,
    number: Option<u32>,
    encoding: Option<NumberEncoding>,
    packed: bool,
}

impl ElementDescriptor {
    /// Creates an element with default numbering and encoding.
    pub fn new(name: &'static str, kind: SerialKind) -> Self {
        ElementDescriptor {
            name: name,
            kind: kind,
            number: None,
            encoding: None,
            packed: false,
        }
    }

    /// Overrides the field number (or, for enum entries, the entry number).
    pub fn number(self, number: u32) -> Self {
        ElementDescriptor { number: Some(number), .. self }
    }

    /// Overrides the number encoding.
    pub fn encoding(self, encoding: NumberEncoding) -> Self {
        ElementDescriptor { encoding: Some(encoding), .. self }
    }

    /// Sets whether a repeated scalar element is written packed.
    pub fn packed(self, packed: bool) -> Self {
        ElementDescriptor { packed: packed, .. self }
    }

    /// Returns the element's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the kind of the element's type.
    pub fn kind(&self) -> SerialKind {
        self.kind
    }

    /// Returns the tag this element gets when it is at `index` in its
    /// parent.
    pub fn tag(&self, index: usize) -> FieldTag {
        FieldTag {
            number: self.number.unwrap_or(index as u32 + 1),
            encoding: self.encoding.unwrap_or_default(),
            packed: self.packed,
        }
    }
}

/// Describes the shape of one serialisable type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    name: &'static str,
    kind: SerialKind,
    elements: Vec<ElementDescriptor>,
}

impl Descriptor {
    /// Creates a descriptor with no elements.
    pub fn new(name: &'static str, kind: SerialKind) -> Self {
        Descriptor { name: name, kind: kind, elements: Vec::new() }
    }

    /// Appends an element.
    pub fn element(mut self, element: ElementDescriptor) -> Self {
        self.elements.push(element);
        self
    }

    /// Describes a list whose values are of kind `element`.
    pub fn list(element: SerialKind) -> Self {
        Descriptor::new("List", SerialKind::List)
            .element(ElementDescriptor::new("element", element))
    }

    /// Describes a map. On the wire this is a list of `map_entry()`
    /// messages.
    pub fn map(key: SerialKind, value: SerialKind) -> Self {
        Descriptor::new("Map", SerialKind::Map)
            .element(ElementDescriptor::new("entry", SerialKind::MapEntry))
            .element(ElementDescriptor::new("key", key))
            .element(ElementDescriptor::new("value", value))
    }

    /// Describes one key/value pair of a map.
    pub fn map_entry(key: SerialKind, value: SerialKind) -> Self {
        Descriptor::new("MapEntry", SerialKind::MapEntry)
            .element(ElementDescriptor::new("key", key))
            .element(ElementDescriptor::new("value", value))
    }

    /// Returns the type's name, used in error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the structural kind.
    pub fn kind(&self) -> SerialKind {
        self.kind
    }

    /// Returns the number of elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Returns the field tag of the element at `index`.
    pub fn tag_for(&self, index: usize) -> Option<FieldTag> {
        self.elements.get(index).map(|e| e.tag(index))
    }

    /// Returns the name of the element at `index`, or a placeholder.
    pub fn element_name(&self, index: usize) -> &'static str {
        self.elements.get(index).map_or("?", |e| e.name)
    }

    /// For lists, returns the element kind.
    pub fn element_kind(&self) -> Option<SerialKind> {
        self.elements.first().map(|e| e.kind)
    }

    /// For enums, returns the number written for the entry at `ordinal`.
    ///
    /// Entries without an explicit number are numbered by position,
    /// starting from zero.
    pub fn enum_number(&self, ordinal: usize) -> Option<u32> {
        self.elements.get(ordinal)
            .map(|e| e.number.unwrap_or(ordinal as u32))
    }

    /// For enums, inverts `enum_number()`.
    pub fn enum_ordinal(&self, number: u32) -> Option<usize> {
        (0..self.elements.len())
            .find(|&ordinal| Some(number) == self.enum_number(ordinal))
    }
}

/// Maps incoming field numbers to element indices for one message type.
///
/// Built once per decoded message. Small, densely numbered messages use a
/// direct table; anything else falls back to binary search.
#[derive(Clone, Debug)]
pub enum FieldIndex {
    /// `table[number]` is the index of the element with that number.
    Dense(Vec<Option<usize>>),
    /// `(number, index)` pairs sorted by number.
    Sparse(Vec<(u32, usize)>),
}

const DENSE_LIMIT: u32 = 32;

impl FieldIndex {
    /// Builds the index for `descriptor`, checking that every field number
    /// is valid and unique.
    pub fn build(descriptor: &Descriptor) -> Result<Self> {
        let mut pairs = Vec::with_capacity(descriptor.element_count());
        for (index, element) in descriptor.elements.iter().enumerate() {
            let number = element.tag(index).number;
            if 0 == number || number > wire::MAX_FIELD_NUMBER {
                return Err(Error::InvalidFieldNumber(
                    descriptor.name.to_owned(), number));
            }
            pairs.push((number, index));
        }
        pairs.sort();
        for w in pairs.windows(2) {
            if w[0].0 == w[1].0 {
                return Err(Error::DuplicateFieldNumber(
                    descriptor.name.to_owned(), w[0].0));
            }
        }

        let max = pairs.last().map_or(0, |&(number, _)| number);
        if max <= DENSE_LIMIT {
            let mut table = vec![None; max as usize + 1];
            for &(number, index) in &pairs {
                table[number as usize] = Some(index);
            }
            Ok(FieldIndex::Dense(table))
        } else {
            Ok(FieldIndex::Sparse(pairs))
        }
    }

    /// Returns the index of the element numbered `number`.
    pub fn lookup(&self, number: u32) -> Option<usize> {
        match *self {
            FieldIndex::Dense(ref table) =>
                table.get(number as usize).and_then(|&ix| ix),
            FieldIndex::Sparse(ref pairs) =>
                pairs.binary_search_by_key(&number, |&(n, _)| n)
                    .ok().map(|ix| pairs[ix].1),
        }
    }
}

/// Trait for types which can describe their own shape.
///
/// This is implemented for the built-in types supported by `ser` and `de`;
/// the macros in this crate implement it for user types.
pub trait Schema {
    /// Returns the structural kind of this type.
    ///
    /// The default implementation builds the whole descriptor, so types
    /// with many elements should override it.
    fn kind() -> SerialKind {
        Self::descriptor().kind()
    }

    /// Returns the full descriptor of this type.
    fn descriptor() -> Descriptor;
}

macro_rules! schema_direct {
    ($($t:ty => $kind:ident),*) => { $(
        impl Schema for $t {
            fn kind() -> SerialKind {
                SerialKind::$kind
            }

            fn descriptor() -> Descriptor {
                Descriptor::new(stringify!($t), SerialKind::$kind)
            }
        }
    )* }
}

// Note that `u8` deliberately has no schema so that `[u8]` and `Vec<u8>`
// can be byte strings rather than lists.
schema_direct!(bool => Bool, i8 => I8, i16 => I16, i32 => I32, i64 => I64,
               u16 => U32, u32 => U32, u64 => U64, char => Char,
               f32 => F32, f64 => F64,
               str => String, String => String,
               [u8] => Bytes, Vec<u8> => Bytes);

impl<T : Schema> Schema for [T] {
    fn kind() -> SerialKind {
        SerialKind::List
    }

    fn descriptor() -> Descriptor {
        Descriptor::list(T::kind())
    }
}

impl<T : Schema> Schema for Vec<T> {
    fn kind() -> SerialKind {
        SerialKind::List
    }

    fn descriptor() -> Descriptor {
        Descriptor::list(T::kind())
    }
}

impl<T : Schema> Schema for Option<T> {
    fn kind() -> SerialKind {
        T::kind()
    }

    fn descriptor() -> Descriptor {
        T::descriptor()
    }
}

impl<T : Schema + ?Sized> Schema for Box<T> {
    fn kind() -> SerialKind {
        T::kind()
    }

    fn descriptor() -> Descriptor {
        T::descriptor()
    }
}

impl<K : Schema, V : Schema, S> Schema for HashMap<K, V, S> {
    fn kind() -> SerialKind {
        SerialKind::Map
    }

    fn descriptor() -> Descriptor {
        Descriptor::map(K::kind(), V::kind())
    }
}

impl<K : Schema, V : Schema> Schema for BTreeMap<K, V> {
    fn kind() -> SerialKind {
        SerialKind::Map
    }

    fn descriptor() -> Descriptor {
        Descriptor::map(K::kind(), V::kind())
    }
}

/// Where a value sits relative to the structure containing it. This decides
/// how scalars are tagged and how structures are framed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The outermost value of an encode or decode call.
    TopLevel,
    /// A field of a message or map entry.
    Field(FieldTag),
    /// An element of a repeated field; every element shares the tag.
    Repeated(FieldTag),
    /// An element of a packed field, written without any header.
    Packed(NumberEncoding),
}
