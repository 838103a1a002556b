//! Bencode encoding and decoding ([BEP-3]).
//!
//! Every message this crate exchanges with trackers and peers that is not a
//! fixed binary layout is bencoded: HTTP tracker responses, the BEP-10
//! extension handshake and the BEP-9 ut_metadata headers.
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! ```
//! use magnet_resolve::bencode::{decode, encode, Value};
//!
//! let value = decode(b"d8:msg_typei1e5:piecei0ee").unwrap();
//! assert_eq!(value.get(b"msg_type"), Some(&Value::Integer(1)));
//! assert_eq!(encode(&value).unwrap(), b"d8:msg_typei1e5:piecei0ee");
//! ```
//!
//! Decoding distinguishes three failures:
//!
//! - [`DecodeError::Truncated`] - input ended inside a value
//! - [`DecodeError::Malformed`] - invalid marker, digit, key or nesting depth
//! - [`DecodeError::TrailingData`] - [`decode`] found bytes after the value
//!
//! [`decode_prefix`] is the embedded variant: it stops after the first value
//! and reports how many bytes it used.
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_prefix};
pub use encode::{encode, encode_to, encoded_len};
pub use error::{DecodeError, EncodeError};
pub use value::Value;
