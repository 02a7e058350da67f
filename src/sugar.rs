//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Implements `Schema`, `Serialize` and `Deserialize` for a struct, encoding
/// it as a message.
///
/// Fields are numbered from 1 in the order listed. Each field may carry
/// `#[proto(...)]` attributes naming `ElementDescriptor` builder calls:
///
/// ```
/// #[macro_use] extern crate protoleaf;
///
/// struct Sample { id: u32, delta: i64, samples: Vec<i32> }
/// protoleaf_message!(Sample {
///     #[proto(number = 4)] id: u32,
///     #[proto(encoding = Signed)] delta: i64,
///     #[proto(packed = true)] samples: Vec<i32>,
/// });
/// # fn main() { }
/// ```
///
/// The encodings `Default`, `Signed` and `Fixed` may be written unqualified.
///
/// Every field must be present on decode unless its type is an `Option` or
/// a `Vec`. Fields the struct does not list are skipped.
#[macro_export]
macro_rules! protoleaf_message {
    ($name:ident {
        $($(#[proto($($opt:ident = $val:expr),* $(,)*)])*
          $field:ident : $t:ty),* $(,)*
    }) => {
        impl $crate::descriptor::Schema for $name {
            fn kind() -> $crate::descriptor::SerialKind {
                $crate::descriptor::SerialKind::Class
            }

            #[allow(unused_imports)]
            fn descriptor() -> $crate::descriptor::Descriptor {
                use $crate::stream::NumberEncoding::{Default, Signed, Fixed};
                $crate::descriptor::Descriptor::new(
                    stringify!($name), $crate::descriptor::SerialKind::Class)
                $(.element(
                    $crate::descriptor::ElementDescriptor::new(
                        stringify!($field),
                        <$t as $crate::descriptor::Schema>::kind())
                    $($(.$opt($val))*)*))*
            }
        }

        impl $crate::ser::Serialize for $name {
            #[allow(unused_mut, unused_assignments)]
            fn serialize(&self, encoder: $crate::ser::Encoder)
                         -> $crate::error::Result<()> {
                let mut _message = encoder.begin_structure(
                    <Self as $crate::descriptor::Schema>::descriptor())?;
                let mut _index = 0usize;
                $(
                    _message.encode_element(_index, &self.$field)?;
                    _index += 1;
                )*
                _message.end_structure()
            }
        }

        impl $crate::de::Deserialize for $name {
            type Accum = Option<Self>;

            #[allow(unused_mut, unused_assignments)]
            fn deserialize_field(accum: &mut Option<Self>,
                                 decoder: $crate::de::Decoder)
                                 -> $crate::error::Result<()> {
                $(let mut $field =
                  <<$t as $crate::de::Deserialize>::Accum
                   as ::std::default::Default>::default();)*

                let mut _message = decoder.begin_structure(
                    <Self as $crate::descriptor::Schema>::descriptor())?;
                while let Some(_found) = _message.decode_element_index()? {
                    let mut _index = 0usize;
                    $(
                        if _found == _index {
                            _message.decode_element_into::<$t>(
                                _index, &mut $field)?;
                            continue;
                        }
                        _index += 1;
                    )*
                    _message.skip_element()?;
                }

                $(let $field = _message.finish_element::<$t>(
                    stringify!($field), $field)?;)*
                _message.end_structure()?;
                *accum = Some($name { $($field: $field),* });
                Ok(())
            }

            fn finish(accum: Option<Self>, context: &$crate::de::Context)
                      -> $crate::error::Result<Self> {
                accum.ok_or_else(|| $crate::error::Error::RequiredFieldMissing(
                    context.to_string()))
            }
        }
    }
}

/// Implements `Schema`, `Serialize` and `Deserialize` for a fieldless enum.
///
/// Entries are written as their number, which defaults to their position
/// starting from 0 and may be overridden with `#[proto(number = n)]`.
#[macro_export]
macro_rules! protoleaf_enum {
    ($name:ident {
        $($(#[proto($($opt:ident = $val:expr),* $(,)*)])*
          $variant:ident),* $(,)*
    }) => {
        impl $crate::descriptor::Schema for $name {
            fn kind() -> $crate::descriptor::SerialKind {
                $crate::descriptor::SerialKind::Enum
            }

            fn descriptor() -> $crate::descriptor::Descriptor {
                $crate::descriptor::Descriptor::new(
                    stringify!($name), $crate::descriptor::SerialKind::Enum)
                $(.element(
                    $crate::descriptor::ElementDescriptor::new(
                        stringify!($variant),
                        $crate::descriptor::SerialKind::Enum)
                    $($(.$opt($val))*)*))*
            }
        }

        impl $crate::ser::Serialize for $name {
            #[allow(unused_mut, unused_assignments)]
            fn serialize(&self, encoder: $crate::ser::Encoder)
                         -> $crate::error::Result<()> {
                let descriptor =
                    <Self as $crate::descriptor::Schema>::descriptor();
                let mut _ordinal = 0usize;
                $(
                    if let $name::$variant = *self {
                        return encoder.encode_enum(&descriptor, _ordinal);
                    }
                    _ordinal += 1;
                )*
                Err($crate::error::Error::NoSuchElement(
                    stringify!($name).to_owned(), _ordinal))
            }
        }

        impl $crate::de::Deserialize for $name {
            type Accum = Option<Self>;

            #[allow(unused_mut, unused_assignments)]
            fn deserialize_field(accum: &mut Option<Self>,
                                 decoder: $crate::de::Decoder)
                                 -> $crate::error::Result<()> {
                let context = decoder.context();
                let ordinal = decoder.decode_enum(
                    &<Self as $crate::descriptor::Schema>::descriptor())?;
                let mut _index = 0usize;
                $(
                    if ordinal == _index {
                        *accum = Some($name::$variant);
                        return Ok(());
                    }
                    _index += 1;
                )*
                Err(context.invalid_value(
                    format!("no entry at ordinal {}", ordinal)))
            }

            fn finish(accum: Option<Self>, context: &$crate::de::Context)
                      -> $crate::error::Result<Self> {
                accum.ok_or_else(|| $crate::error::Error::RequiredFieldMissing(
                    context.to_string()))
            }
        }
    }
}

/// Implements `Schema`, `Serialize` and `Deserialize` for an enum whose
/// variants each wrap one value.
///
/// The enum is written as a message with the variant name as a string in
/// field 1 and the wrapped value in field 2.
#[macro_export]
macro_rules! protoleaf_sealed {
    ($name:ident { $($variant:ident($t:ty)),* $(,)* }) => {
        impl $crate::descriptor::Schema for $name {
            fn kind() -> $crate::descriptor::SerialKind {
                $crate::descriptor::SerialKind::Sealed
            }

            fn descriptor() -> $crate::descriptor::Descriptor {
                $crate::descriptor::Descriptor::new(
                    stringify!($name), $crate::descriptor::SerialKind::Sealed)
                    .element($crate::descriptor::ElementDescriptor::new(
                        "type", $crate::descriptor::SerialKind::String))
                    .element($crate::descriptor::ElementDescriptor::new(
                        "value", $crate::descriptor::SerialKind::Polymorphic))
            }
        }

        impl $crate::ser::Serialize for $name {
            fn serialize(&self, encoder: $crate::ser::Encoder)
                         -> $crate::error::Result<()> {
                let mut _message = encoder.begin_structure(
                    <Self as $crate::descriptor::Schema>::descriptor())?;
                match *self {
                    $($name::$variant(ref value) => {
                        _message.encode_element(0, stringify!($variant))?;
                        _message.encode_element(1, value)?;
                    },)*
                }
                _message.end_structure()
            }
        }

        impl $crate::de::Deserialize for $name {
            type Accum = Option<Self>;

            fn deserialize_field(accum: &mut Option<Self>,
                                 decoder: $crate::de::Decoder)
                                 -> $crate::error::Result<()> {
                let mut _message = decoder.begin_structure(
                    <Self as $crate::descriptor::Schema>::descriptor())?;
                let mut _type: Option<String> = None;
                let mut _value: Option<Self> = None;
                while let Some(_found) = _message.decode_element_index()? {
                    match _found {
                        0 => _type = Some(
                            _message.decode_element::<String>(0)?),
                        1 => {
                            let _name = match _type {
                                Some(ref name) => name.clone(),
                                None => return Err(
                                    _message.context().invalid_value(
                                        "value precedes its type")),
                            };
                            $(
                                if _name == stringify!($variant) {
                                    _value = Some($name::$variant(
                                        _message.decode_element::<$t>(1)?));
                                    continue;
                                }
                            )*
                            return Err($crate::error::Error::UnknownVariant(
                                _message.context().to_string(), _name));
                        },
                        _ => _message.skip_element()?,
                    }
                }

                let _value = match _value {
                    Some(value) => value,
                    None => return Err(
                        $crate::error::Error::RequiredFieldMissing(
                            format!("{}.value", _message.context()))),
                };
                _message.end_structure()?;
                *accum = Some(_value);
                Ok(())
            }

            fn finish(accum: Option<Self>, context: &$crate::de::Context)
                      -> $crate::error::Result<Self> {
                accum.ok_or_else(|| $crate::error::Error::RequiredFieldMissing(
                    context.to_string()))
            }
        }
    }
}

/// Implements `Schema`, `Serialize` and `Deserialize` for a unit struct,
/// which is written as an empty message.
#[macro_export]
macro_rules! protoleaf_object {
    ($name:ident) => {
        impl $crate::descriptor::Schema for $name {
            fn kind() -> $crate::descriptor::SerialKind {
                $crate::descriptor::SerialKind::Object
            }

            fn descriptor() -> $crate::descriptor::Descriptor {
                $crate::descriptor::Descriptor::new(
                    stringify!($name), $crate::descriptor::SerialKind::Object)
            }
        }

        impl $crate::ser::Serialize for $name {
            fn serialize(&self, encoder: $crate::ser::Encoder)
                         -> $crate::error::Result<()> {
                encoder.begin_structure(
                    <Self as $crate::descriptor::Schema>::descriptor())?
                    .end_structure()
            }
        }

        impl $crate::de::Deserialize for $name {
            type Accum = Option<Self>;

            fn deserialize_field(accum: &mut Option<Self>,
                                 decoder: $crate::de::Decoder)
                                 -> $crate::error::Result<()> {
                let mut _message = decoder.begin_structure(
                    <Self as $crate::descriptor::Schema>::descriptor())?;
                while let Some(_) = _message.decode_element_index()? {
                    _message.skip_element()?;
                }
                _message.end_structure()?;
                *accum = Some($name);
                Ok(())
            }

            fn finish(accum: Option<Self>, context: &$crate::de::Context)
                      -> $crate::error::Result<Self> {
                accum.ok_or_else(|| $crate::error::Error::RequiredFieldMissing(
                    context.to_string()))
            }
        }
    }
}
