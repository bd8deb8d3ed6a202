//! Bencode Decoder
//!
//! Decodes bencoded buffers into a [`BencodeValue`] tree. Every failure is a
//! [`ClientError::Decode`] carrying the byte offset where decoding stopped;
//! there is no recovery.
//!
//! Bencode format:
//! - Integers:   `i<number>e`        Example: `i42e`
//! - Strings:    `<length>:<data>`   Example: `4:spam`
//! - Lists:      `l<items>e`         Example: `l4:spami42ee`
//! - Dicts:      `d<pairs>e`         Example: `d3:cow3:moo4:spam4:eggse`
//!
//! Dictionary keys keep their encounter order. A repeated key overwrites the
//! earlier value in place.

use num_bigint::BigInt;
use std::fmt;

use crate::error::{ClientError, Result};

/// Nesting limit for lists and dicts
const MAX_DEPTH: usize = 512;

/// A bencode value
#[derive(Clone, PartialEq, Eq)]
pub enum BencodeValue {
    /// Integer value, unbounded width
    Integer(BigInt),
    /// Byte string (not necessarily valid UTF-8)
    Bytes(Vec<u8>),
    /// List of values
    List(Vec<BencodeValue>),
    /// Dictionary with byte string keys, in encounter order
    Dict(BencodeDict),
}

/// Insertion-ordered mapping of byte-string keys to values
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BencodeDict {
    entries: Vec<(Vec<u8>, BencodeValue)>,
}

impl BencodeDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, overwriting (in place) any earlier value for the key
    pub fn insert(&mut self, key: Vec<u8>, value: BencodeValue) -> Option<BencodeValue> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|(k, _)| k.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &BencodeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for BencodeDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(k, v)| (String::from_utf8_lossy(k), v)),
            )
            .finish()
    }
}

impl fmt::Debug for BencodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "Integer({})", n),
            Self::Bytes(b) => {
                // Try to display as UTF-8 if valid, otherwise show length
                if let Ok(s) = std::str::from_utf8(b) {
                    if s.chars().count() <= 50 {
                        write!(f, "Bytes({:?})", s)
                    } else {
                        let head: String = s.chars().take(50).collect();
                        write!(f, "Bytes({:?}... [{} bytes])", head, b.len())
                    }
                } else {
                    write!(f, "Bytes([{} bytes])", b.len())
                }
            }
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Dict(d) => f.debug_tuple("Dict").field(d).finish(),
        }
    }
}

/// Result of decoding a whole buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Buffer started with `d` or `l`: a single container value
    Value(BencodeValue),
    /// Anything else: the buffer is a run of consecutive values
    Sequence(Vec<BencodeValue>),
}

impl Decoded {
    /// The single container value, if the buffer held one
    pub fn into_value(self) -> Option<BencodeValue> {
        match self {
            Self::Value(v) => Some(v),
            Self::Sequence(_) => None,
        }
    }
}

/// Decode a bencoded buffer.
///
/// If the first byte is `d` or `l` the buffer is decoded as one value and any
/// bytes after it are ignored. Otherwise the whole buffer is read as a
/// sequence of consecutive values.
pub fn decode(data: &[u8]) -> Result<Decoded> {
    let mut decoder = Decoder::new(data);
    match data.first() {
        Some(b'd') | Some(b'l') => decoder.parse(0).map(Decoded::Value),
        _ => {
            let mut values = Vec::new();
            while decoder.pos < data.len() {
                values.push(decoder.parse(0)?);
            }
            Ok(Decoded::Sequence(values))
        }
    }
}

/// Cursor over the input buffer
struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Take exactly `len` bytes
    fn read(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                ClientError::decode(
                    start,
                    format!(
                        "Expected {} bytes but only {} remain, possible unexpected end of file",
                        len,
                        self.data.len() - start
                    ),
                )
            })?;
        self.pos = end;
        Ok(&self.data[start..end])
    }

    /// Take bytes up to (not including) `terminator`, consuming the terminator
    fn read_to(&mut self, terminator: u8) -> Result<&'a [u8]> {
        let start = self.pos;
        let rel = self.data[start..]
            .iter()
            .position(|&c| c == terminator)
            .ok_or_else(|| {
                ClientError::decode(
                    start,
                    format!(
                        "Unable to locate terminator {:?} after offset {}",
                        terminator as char, start
                    ),
                )
            })?;
        self.pos = start + rel + 1;
        Ok(&self.data[start..start + rel])
    }

    fn parse(&mut self, depth: usize) -> Result<BencodeValue> {
        if depth > MAX_DEPTH {
            return Err(ClientError::decode(self.pos, "Nesting too deep"));
        }

        match self.peek() {
            Some(b'0'..=b'9') => self.parse_bytes().map(BencodeValue::Bytes),
            Some(b'i') => self.parse_integer(),
            Some(b'l') => self.parse_list(depth),
            Some(b'd') => self.parse_dict(depth),
            Some(c) => Err(ClientError::decode(
                self.pos,
                format!("Invalid token character {:?}", c as char),
            )),
            None => Err(ClientError::decode(self.pos, "Unexpected end of file")),
        }
    }

    fn parse_bytes(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        let digits = self.read_to(b':')?;
        let len = ascii_number(digits)
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| {
                ClientError::decode(
                    start,
                    format!("Invalid string length {:?}", String::from_utf8_lossy(digits)),
                )
            })?;
        Ok(self.read(len)?.to_vec())
    }

    fn parse_integer(&mut self) -> Result<BencodeValue> {
        let start = self.pos;
        self.pos += 1; // 'i'
        let digits = self.read_to(b'e')?;
        let value = ascii_number(digits)
            .and_then(|s| s.parse::<BigInt>().ok())
            .ok_or_else(|| {
                ClientError::decode(
                    start,
                    format!("Invalid integer {:?}", String::from_utf8_lossy(digits)),
                )
            })?;
        Ok(BencodeValue::Integer(value))
    }

    fn parse_list(&mut self, depth: usize) -> Result<BencodeValue> {
        self.pos += 1; // 'l'
        let mut items = Vec::new();
        while self.peek() != Some(b'e') {
            items.push(self.parse(depth + 1)?);
        }
        self.pos += 1;
        Ok(BencodeValue::List(items))
    }

    fn parse_dict(&mut self, depth: usize) -> Result<BencodeValue> {
        self.pos += 1; // 'd'
        let mut dict = BencodeDict::new();
        while self.peek() != Some(b'e') {
            let key = match self.peek() {
                Some(b'0'..=b'9') => self.parse_bytes()?,
                None => return Err(ClientError::decode(self.pos, "Unexpected end of file")),
                Some(_) => {
                    return Err(ClientError::decode(
                        self.pos,
                        "Dictionary key must be a byte string",
                    ))
                }
            };
            let value = self.parse(depth + 1)?;
            dict.insert(key, value);
        }
        self.pos += 1;
        Ok(BencodeValue::Dict(dict))
    }
}

/// Digits with an optional leading '-', as text
fn ascii_number(raw: &[u8]) -> Option<&str> {
    let digits = raw.strip_prefix(b"-").unwrap_or(raw);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(raw).ok()
}

impl BencodeValue {
    /// Decode exactly one value, rejecting trailing bytes
    pub fn parse_exact(data: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let value = decoder.parse(0)?;
        if decoder.pos != data.len() {
            return Err(ClientError::decode(
                decoder.pos,
                format!("Trailing data: {} bytes", data.len() - decoder.pos),
            ));
        }
        Ok(value)
    }

    /// Get as UTF-8 string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Self::Integer(n) => Some(n),
            _ => None,
        }
    }

    /// Get as i64, if it fits
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|n| i64::try_from(n).ok())
    }

    /// Get as u64, if non-negative and it fits
    pub fn as_u64(&self) -> Option<u64> {
        self.as_integer().and_then(|n| u64::try_from(n).ok())
    }

    /// Get as list
    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get as dict
    pub fn as_dict(&self) -> Option<&BencodeDict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Get dict value by key
    pub fn get(&self, key: &str) -> Option<&BencodeValue> {
        self.as_dict().and_then(|d| d.get(key.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> BencodeValue {
        BencodeValue::Bytes(s.as_bytes().to_vec())
    }

    fn int(n: i64) -> BencodeValue {
        BencodeValue::Integer(BigInt::from(n))
    }

    fn single(data: &[u8]) -> BencodeValue {
        match decode(data).unwrap() {
            Decoded::Sequence(mut values) if values.len() == 1 => values.remove(0),
            Decoded::Value(v) => v,
            other => panic!("Expected one value, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(single(b"4:spam"), bytes("spam"));
        assert_eq!(single(b"i42e"), int(42));
        assert_eq!(single(b"i-3e"), int(-3));
        assert_eq!(single(b"0:"), bytes(""));
    }

    #[test]
    fn test_decode_list() {
        assert_eq!(
            decode(b"l4:spam4:eggse").unwrap(),
            Decoded::Value(BencodeValue::List(vec![bytes("spam"), bytes("eggs")]))
        );
        assert_eq!(
            single(b"le"),
            BencodeValue::List(vec![])
        );
    }

    #[test]
    fn test_decode_dict_keeps_order() {
        let value = single(b"d4:spam4:eggs3:cow3:mooe");
        let dict = value.as_dict().unwrap();
        let keys: Vec<&[u8]> = dict.keys().collect();
        assert_eq!(keys, vec![b"spam".as_slice(), b"cow".as_slice()]);
        assert_eq!(value.get("cow"), Some(&bytes("moo")));
        assert_eq!(value.get("spam"), Some(&bytes("eggs")));
    }

    #[test]
    fn test_decode_dict_duplicate_key_overwrites() {
        let value = single(b"d3:cow3:moo4:spam4:eggs3:cowi1ee");
        let dict = value.as_dict().unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get(b"cow"), Some(&int(1)));
        assert_eq!(dict.keys().next(), Some(b"cow".as_slice()));
    }

    #[test]
    fn test_top_level_sequence() {
        let decoded = decode(b"i1e4:spami-2e").unwrap();
        assert_eq!(
            decoded,
            Decoded::Sequence(vec![int(1), bytes("spam"), int(-2)])
        );
        assert_eq!(decode(b"").unwrap(), Decoded::Sequence(vec![]));
    }

    #[test]
    fn test_container_ignores_trailing_bytes() {
        let decoded = decode(b"le4:junk").unwrap();
        assert_eq!(decoded, Decoded::Value(BencodeValue::List(vec![])));
        assert!(BencodeValue::parse_exact(b"le4:junk").is_err());
    }

    #[test]
    fn test_big_integer() {
        let value = single(b"i123456789012345678901234567890e");
        let expected: BigInt = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(value.as_integer(), Some(&expected));
        assert_eq!(value.as_i64(), None);
    }

    #[test]
    fn test_truncated_string_offset() {
        match decode(b"4:sp") {
            Err(ClientError::Decode { offset, message }) => {
                assert_eq!(offset, 2);
                assert!(message.contains("end of file"));
            }
            other => panic!("Expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_terminators() {
        match decode(b"i42") {
            Err(ClientError::Decode { offset, .. }) => assert_eq!(offset, 1),
            other => panic!("Expected decode error, got {:?}", other),
        }
        match decode(b"l4:spam") {
            Err(ClientError::Decode { offset, .. }) => assert_eq!(offset, 7),
            other => panic!("Expected decode error, got {:?}", other),
        }
        match decode(b"d3:cow") {
            Err(ClientError::Decode { offset, .. }) => assert_eq!(offset, 6),
            other => panic!("Expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_token() {
        match decode(b"l4:spamxe") {
            Err(err @ ClientError::Decode { offset: 7, .. }) => {
                assert!(err.to_string().contains("offset 7"));
            }
            other => panic!("Expected decode error, got {:?}", other),
        }
        assert!(decode(b"ixe").is_err());
        assert!(decode(b"i-e").is_err());
        assert!(decode(b"d i1ee").is_err());
    }

    #[test]
    fn test_deterministic() {
        let data = b"d4:infod4:name4:test6:lengthi10eee";
        assert_eq!(decode(data).unwrap(), decode(data).unwrap());
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = vec![b'l'; MAX_DEPTH + 2];
        data.extend(std::iter::repeat(b'e').take(MAX_DEPTH + 2));
        assert!(decode(&data).is_err());
    }
}
