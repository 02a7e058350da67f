//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The error type shared by encoding and decoding.

use std::io;

use de::Context;
use descriptor::SerialKind;
use stream;

quick_error! {
    /// Errors that can be produced while encoding or decoding.
    ///
    /// Variants raised while decoding begin with a string indicating the
    /// field names and positions that led to the error. Variants raised by
    /// an invalid descriptor name the descriptor instead.
    #[derive(Debug)]
    pub enum Error {
        /// An error was returned by the wire layer.
        Stream(wo: String, err: stream::Error) {
            display("{} at {}", err, wo)
            cause(err)
            context(wo: &'a Context<'a>, err: stream::Error) ->
                (wo.to_string(), err)
        }
        /// A scalar was encoded or decoded with no enclosing message.
        PrimitiveAtTopLevel(kind: SerialKind) {
            display("{:?} cannot be encoded at top level; \
                     protobuf messages must be structured", kind)
        }
        /// A list or map was encoded or decoded with no enclosing message.
        /// Repeated fields only exist inside a message.
        CollectionAtTopLevel(kind: SerialKind) {
            display("{:?} cannot be encoded at top level; \
                     wrap it in a message", kind)
        }
        /// A value of the given kind cannot occupy the position it was
        /// found in, such as a structure inside a packed field.
        UnsupportedKind(wo: String, kind: SerialKind) {
            display("{:?} is not supported at {}", kind, wo)
        }
        /// `None` was encoded somewhere other than a message field, such as
        /// an element of a list, where leaving it out would lose it.
        AbsentValue(wo: String) {
            display("None cannot be encoded as {}", wo)
        }
        /// A descriptor assigned a field number outside the valid range.
        InvalidFieldNumber(descriptor: String, number: u32) {
            display("field number {} in {} is outside 1..2^29-1",
                    number, descriptor)
        }
        /// A descriptor assigned the same field number twice.
        DuplicateFieldNumber(descriptor: String, number: u32) {
            display("field number {} is used twice in {}", number, descriptor)
        }
        /// An element index was used that the descriptor does not have.
        NoSuchElement(descriptor: String, index: usize) {
            display("{} has no element {}", descriptor, index)
        }
        /// Decoding recursed too deeply.
        ///
        /// See `Config::recursion_limit` to control the cut-off point.
        RecursionLimitExceeded(wo: String) {
            display("recursion limit exceeded at {}", wo)
        }
        /// An unknown field was encountered and
        /// `Config::ignore_unknown_fields` was false.
        UnknownField(wo: String, number: u32, pos: u64) {
            display("unknown field {} encountered at {}.{{{}}}",
                    number, wo, pos)
        }
        /// A field which is required in a message was not found by the time
        /// the end of the message was reached. The location includes the
        /// name of the missing field.
        RequiredFieldMissing(wo: String) {
            display("required field missing at {}", wo)
        }
        /// A field was read successfully from the wire, but its value is not
        /// acceptable for the field type.
        InvalidValue(wo: String, msg: String) {
            display("{} at {}", msg, wo)
        }
        /// A sealed type's discriminator did not name any known variant.
        UnknownVariant(wo: String, name: String) {
            display("unknown variant \"{}\" at {}", name, wo)
        }
        /// Reading or writing a delimited stream failed.
        Io(err: io::Error) {
            from()
            display("I/O error: {}", err)
            cause(err)
        }
    }
}

/// The general result type returned by encoding and decoding functions.
pub type Result<T> = ::std::result::Result<T, Error>;
