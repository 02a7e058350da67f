//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Specialised adapters for doing IO.

use std::io::{self, Read, Write};

use stream::{Error, Result};
use wire;

/// A bounded, forward-only view over a byte slice.
///
/// Positions reported by the cursor are absolute offsets into the input the
/// outermost cursor was created from, so errors raised deep inside a nested
/// message still point at the right byte.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    off: usize,
    base: u64,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor over all of `data`, starting at offset 0.
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data: data, off: 0, base: 0 }
    }

    /// Returns the absolute offset of the next byte to be read.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.base + self.off as u64
    }

    /// Returns the number of bytes left in this cursor's range.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.off
    }

    /// Returns whether the whole range has been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        0 == self.remaining()
    }

    /// Reads one byte, or returns `None` at the end of the range.
    #[inline]
    pub fn read_byte_opt(&mut self) -> Option<u8> {
        let byte = self.data.get(self.off).cloned();
        if byte.is_some() {
            self.off += 1;
        }
        byte
    }

    /// Reads exactly `n` bytes.
    ///
    /// Nothing is consumed if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::UnexpectedEof(self.pos()));
        }

        let data = self.data;
        let start = self.off;
        self.off += n;
        Ok(&data[start..start + n])
    }

    /// Carves the next `n` bytes off into a cursor of their own, advancing
    /// this cursor past them.
    ///
    /// The new cursor cannot see anything outside those `n` bytes.
    pub fn split(&mut self, n: usize) -> Result<ByteCursor<'a>> {
        let base = self.pos();
        let data = self.read_bytes(n)?;
        Ok(ByteCursor { data: data, off: 0, base: base })
    }
}

fn read_byte<R : Read>(r: &mut R) -> io::Result<Option<u8>> {
    let mut buf = [0u8;1];
    loop {
        match r.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(ref e) if io::ErrorKind::Interrupted == e.kind() => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Writes `message` to `dst` preceded by its length as a varint.
///
/// This is the usual way of putting several messages in one byte stream,
/// since the wire format itself has no end-of-message marker.
pub fn write_delimited<W : Write>(dst: &mut W, message: &[u8])
                                  -> io::Result<()> {
    let mut prefix = Vec::with_capacity(wire::MAX_VARINT_LEN);
    wire::encode_varint64(&mut prefix, message.len() as u64);
    dst.write_all(&prefix)?;
    dst.write_all(message)
}

/// Reads one message written by `write_delimited()` from `src`.
///
/// Returns `Ok(None)` if `src` is at end of input before the length prefix.
/// Lengths above `max_len` are rejected with `InvalidData` before anything
/// is allocated.
pub fn read_delimited<R : Read>(src: &mut R, max_len: u64)
                                -> io::Result<Option<Vec<u8>>> {
    let mut len = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = match read_byte(src)? {
            Some(byte) => byte,
            None if 0 == shift => return Ok(None),
            None => return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof, "truncated length prefix")),
        };

        if shift >= 32 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData, "length prefix too long"));
        }
        len |= ((byte & 0x7F) as u64) << shift;
        if 0 == byte & 0x80 {
            break;
        }
        shift += 7;
    }

    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message of {} bytes exceeds limit of {}", len, max_len)));
    }

    let mut message = vec![0u8; len as usize];
    src.read_exact(&mut message)?;
    Ok(Some(message))
}
