use std::io::Write;

use super::error::EncodeError;
use super::value::Value;

/// Encodes `value` in canonical form.
///
/// Integers carry no leading zeros, and dictionary keys come out in
/// ascending byte order whatever order they were inserted in, so
/// `encode(decode(x))` reproduces any canonical `x` byte for byte.
///
/// ```
/// use magnet_resolve::bencode::{encode, Value};
///
/// let value = Value::dict([
///     (&b"piece"[..], Value::Integer(2)),
///     (&b"msg_type"[..], Value::Integer(0)),
/// ]);
/// assert_eq!(encode(&value).unwrap(), b"d8:msg_typei0e5:piecei2ee");
/// ```
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(encoded_len(value));
    encode_to(&mut out, value)?;
    Ok(out)
}

/// Streams the canonical encoding of `value` into `writer`.
pub fn encode_to<W: Write>(writer: &mut W, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Integer(i) => write!(writer, "i{}e", i)?,
        Value::Bytes(bytes) => write_bytes(writer, bytes)?,
        Value::List(items) => {
            writer.write_all(b"l")?;
            items.iter().try_for_each(|item| encode_to(writer, item))?;
            writer.write_all(b"e")?;
        }
        Value::Dict(entries) => {
            writer.write_all(b"d")?;
            for (key, item) in entries {
                write_bytes(writer, key)?;
                encode_to(writer, item)?;
            }
            writer.write_all(b"e")?;
        }
    }
    Ok(())
}

/// Exact size of the canonical encoding of `value`.
pub fn encoded_len(value: &Value) -> usize {
    match value {
        Value::Integer(i) => 2 + decimal_len(i.unsigned_abs()) + usize::from(*i < 0),
        Value::Bytes(bytes) => string_len(bytes.len()),
        Value::List(items) => 2 + items.iter().map(encoded_len).sum::<usize>(),
        Value::Dict(entries) => {
            2 + entries
                .iter()
                .map(|(key, item)| string_len(key.len()) + encoded_len(item))
                .sum::<usize>()
        }
    }
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    write!(writer, "{}:", bytes.len())?;
    writer.write_all(bytes)
}

fn string_len(len: usize) -> usize {
    decimal_len(len as u64) + 1 + len
}

fn decimal_len(mut n: u64) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}
