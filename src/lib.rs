//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Encoding and decoding of the Protocol Buffers wire format, driven by
//! descriptors rather than generated code.
//!
//! Every serialisable type implements `Schema`, which hands out a
//! `Descriptor` naming its structure kind and, for messages, the field
//! number and number encoding of each element. `Serialize` and
//! `Deserialize` then walk the value one element at a time; the codec picks
//! how each element is framed on the wire from the descriptor alone.
//!
//! The `protoleaf_message!` family of macros in this crate writes those
//! three impls for ordinary structs and enums.
//!
//! ```
//! #[macro_use] extern crate protoleaf;
//!
//! #[derive(Debug, PartialEq)]
//! struct Point { x: i32, y: i32 }
//! protoleaf_message!(Point { x: i32, y: i32 });
//!
//! # fn main() {
//! let bytes = protoleaf::to_vec(&Point { x: 1, y: 150 }).unwrap();
//! assert_eq!(vec![0x08, 0x01, 0x10, 0x96, 0x01], bytes);
//! let back: Point = protoleaf::from_slice(
//!     &bytes, &protoleaf::Config::default()).unwrap();
//! assert_eq!(Point { x: 1, y: 150 }, back);
//! # }
//! ```

#![deny(missing_docs)]

#[macro_use] extern crate log;
#[macro_use] extern crate quick_error;
#[cfg(test)] #[macro_use] extern crate proptest;

pub mod wire;
pub mod io;
pub mod stream;
pub mod descriptor;
pub mod error;
pub mod ser;
pub mod de;
#[macro_use] mod sugar;

#[cfg(test)] mod test_helpers;

pub use descriptor::{Descriptor, ElementDescriptor, Schema, SerialKind};
pub use de::{Config, Deserialize, from_slice};
pub use error::{Error, Result};
pub use ser::{Serialize, serialized_size, to_vec};
pub use stream::{FieldTag, NumberEncoding};
