// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Canonical dictionary encoding for chain actions.
//!
//! Actions staged on the Nine Chronicles chain are expressed as plain values
//! in a deterministic ordered-key binary form: integers as ASCII decimal
//! (`i...e`), byte strings length-prefixed (`N:`), unicode strings with a
//! `u` marker (`uN:`), lists (`l...e`) and dictionaries (`d...e`) whose keys
//! are sorted with byte-string keys before unicode keys, each class ordered
//! bytewise. Two encoders producing the same value always produce the same
//! bytes, which is what makes the staged transaction content addressable.

use std::collections::BTreeMap;

/// A dictionary key. The derived ordering (binary before text, bytewise
/// within each class) is exactly the canonical key order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BencodexKey {
    Binary(Vec<u8>),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BencodexValue {
    Null,
    Boolean(bool),
    Integer(i128),
    Binary(Vec<u8>),
    Text(String),
    List(Vec<BencodexValue>),
    Dictionary(BTreeMap<BencodexKey, BencodexValue>),
}

impl BencodexValue {
    pub fn text(s: impl Into<String>) -> Self {
        BencodexValue::Text(s.into())
    }

    pub fn binary(b: impl Into<Vec<u8>>) -> Self {
        BencodexValue::Binary(b.into())
    }
}

pub fn encode(value: &BencodexValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &BencodexValue, out: &mut Vec<u8>) {
    match value {
        BencodexValue::Null => out.push(b'n'),
        BencodexValue::Boolean(true) => out.push(b't'),
        BencodexValue::Boolean(false) => out.push(b'f'),
        BencodexValue::Integer(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        BencodexValue::Binary(bytes) => encode_binary(bytes, out),
        BencodexValue::Text(text) => encode_text(text, out),
        BencodexValue::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        BencodexValue::Dictionary(entries) => {
            out.push(b'd');
            // BTreeMap iteration order is the canonical key order.
            for (key, item) in entries {
                match key {
                    BencodexKey::Binary(bytes) => encode_binary(bytes, out),
                    BencodexKey::Text(text) => encode_text(text, out),
                }
                encode_into(item, out);
            }
            out.push(b'e');
        }
    }
}

fn encode_binary(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

fn encode_text(text: &str, out: &mut Vec<u8>) {
    out.push(b'u');
    out.extend_from_slice(text.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(text.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: Vec<(BencodexKey, BencodexValue)>) -> BencodexValue {
        BencodexValue::Dictionary(entries.into_iter().collect())
    }

    #[test]
    fn test_encode_primitives() {
        assert_eq!(encode(&BencodexValue::Null), b"n");
        assert_eq!(encode(&BencodexValue::Boolean(true)), b"t");
        assert_eq!(encode(&BencodexValue::Boolean(false)), b"f");
        assert_eq!(encode(&BencodexValue::Integer(123)), b"i123e");
        assert_eq!(encode(&BencodexValue::Integer(0)), b"i0e");
        assert_eq!(encode(&BencodexValue::Integer(-45)), b"i-45e");
        assert_eq!(encode(&BencodexValue::binary(vec![0xde, 0xad])), b"2:\xde\xad");
        assert_eq!(encode(&BencodexValue::binary(Vec::new())), b"0:");
        assert_eq!(encode(&BencodexValue::text("hello")), b"u5:hello");
        assert_eq!(encode(&BencodexValue::text("")), b"u0:");
    }

    #[test]
    fn test_text_length_counts_utf8_bytes() {
        // "단위" is six UTF-8 bytes, not two characters
        let encoded = encode(&BencodexValue::text("단위"));
        assert_eq!(&encoded[..3], b"u6:");
        assert_eq!(encoded.len(), 3 + 6);
    }

    #[test]
    fn test_encode_list() {
        let value = BencodexValue::List(vec![
            BencodexValue::Integer(1),
            BencodexValue::text("a"),
            BencodexValue::binary(vec![0xff]),
        ]);
        assert_eq!(encode(&value), b"li1eu1:a1:\xff");
        // lists terminate with 'e'
        let value = BencodexValue::List(vec![]);
        assert_eq!(encode(&value), b"le");
    }

    #[test]
    fn test_dictionary_key_order_binary_before_text() {
        // insertion order deliberately scrambled; encoding must sort
        let value = dict(vec![
            (BencodexKey::Text("b".into()), BencodexValue::Integer(2)),
            (BencodexKey::Binary(vec![0xff]), BencodexValue::Integer(4)),
            (BencodexKey::Text("a".into()), BencodexValue::Integer(1)),
            (BencodexKey::Binary(vec![0x00]), BencodexValue::Integer(3)),
        ]);
        let mut expected: Vec<u8> = Vec::new();
        expected.push(b'd');
        expected.extend_from_slice(b"1:\x00i3e");
        expected.extend_from_slice(b"1:\xffi4e");
        expected.extend_from_slice(b"u1:ai1e");
        expected.extend_from_slice(b"u1:bi2e");
        expected.push(b'e');
        assert_eq!(encode(&value), expected);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = dict(vec![
            (BencodexKey::Text("x".into()), BencodexValue::Integer(1)),
            (BencodexKey::Text("y".into()), BencodexValue::Integer(2)),
        ]);
        let b = dict(vec![
            (BencodexKey::Text("y".into()), BencodexValue::Integer(2)),
            (BencodexKey::Text("x".into()), BencodexValue::Integer(1)),
        ]);
        assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn test_nested_dictionary() {
        let inner = dict(vec![(
            BencodexKey::Text("k".into()),
            BencodexValue::text("v"),
        )]);
        let value = dict(vec![(BencodexKey::Text("outer".into()), inner)]);
        assert_eq!(encode(&value), b"du5:outerdu1:ku1:vee");
    }
}
