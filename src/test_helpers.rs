//-
// Copyright 2017 Jason Lingle
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Parse the given text into a binary value.
///
/// Whitespace is ignored and bytes are written as pairs of hex digits. Text
/// between single quotes is added verbatim, one byte per character.
pub fn hex(text: &str) -> Vec<u8> {
    let mut data = Vec::new();
    let mut high: Option<u8> = None;
    let mut quoted = false;

    for c in text.chars() {
        if quoted {
            if '\'' == c {
                quoted = false;
            } else {
                data.push(c as u8);
            }
            continue;
        }

        if '\'' == c {
            assert!(high.is_none(), "quote splits a byte in {:?}", text);
            quoted = true;
        } else if !c.is_whitespace() {
            let nybble = c.to_digit(16).unwrap_or_else(
                || panic!("invalid hex digit {:?} in {:?}", c, text)) as u8;
            match high.take() {
                Some(h) => data.push(h << 4 | nybble),
                None => high = Some(nybble),
            }
        }
    }

    assert!(!quoted, "unterminated quote in {:?}", text);
    assert!(high.is_none(), "odd number of hex digits in {:?}", text);
    data
}

#[test]
fn hex_parses_digits_and_quotes() {
    assert_eq!(vec![0x0Au8, 0x02, b'h', b'i', 0xFF],
               hex("0a 02 'hi' FF"));
    assert_eq!(Vec::<u8>::new(), hex("  "));
}
