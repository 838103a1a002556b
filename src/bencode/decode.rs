use super::error::DecodeError;
use super::value::Value;
use bytes::Bytes;
use std::collections::BTreeMap;

const MAX_DEPTH: usize = 64;

/// Decodes exactly one bencode value; every input byte must be consumed.
pub fn decode(data: &[u8]) -> Result<Value, DecodeError> {
    let (value, consumed) = decode_prefix(data)?;

    if consumed != data.len() {
        return Err(DecodeError::TrailingData);
    }

    Ok(value)
}

/// Decodes one bencode value from the start of `data` and returns it together
/// with the number of bytes it occupied.
///
/// Bytes after the value are left untouched, which is what extension messages
/// such as ut_metadata data frames need: a bencoded header followed by a raw
/// payload.
///
/// # Examples
///
/// ```
/// use magnet_resolve::bencode::{decode_prefix, Value};
///
/// let (value, used) = decode_prefix(b"d5:piecei0eeRAW").unwrap();
/// assert_eq!(used, 12);
/// assert_eq!(value.get(b"piece"), Some(&Value::Integer(0)));
/// ```
pub fn decode_prefix(data: &[u8]) -> Result<(Value, usize), DecodeError> {
    let mut pos = 0;
    let value = decode_value(data, &mut pos, 0)?;
    Ok((value, pos))
}

fn decode_value(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::Malformed("nesting too deep".into()));
    }

    if *pos >= data.len() {
        return Err(DecodeError::Truncated);
    }

    match data[*pos] {
        b'i' => decode_integer(data, pos),
        b'l' => decode_list(data, pos, depth),
        b'd' => decode_dict(data, pos, depth),
        b'0'..=b'9' => decode_bytes(data, pos),
        c => Err(DecodeError::Malformed(format!(
            "unexpected byte 0x{:02x} at {}",
            c, *pos
        ))),
    }
}

fn decode_integer(data: &[u8], pos: &mut usize) -> Result<Value, DecodeError> {
    *pos += 1;

    let start = *pos;
    while *pos < data.len() && data[*pos] != b'e' {
        let c = data[*pos];
        let sign_ok = c == b'-' && *pos == start;
        if !c.is_ascii_digit() && !sign_ok {
            return Err(DecodeError::Malformed(format!(
                "invalid integer byte 0x{:02x}",
                c
            )));
        }
        *pos += 1;
    }

    if *pos >= data.len() {
        return Err(DecodeError::Truncated);
    }

    // Only ASCII digits and a leading '-' made it through the scan.
    let int_str = std::str::from_utf8(&data[start..*pos])
        .map_err(|_| DecodeError::Malformed("invalid integer".into()))?;

    if int_str.is_empty() || int_str == "-" {
        return Err(DecodeError::Malformed("empty integer".into()));
    }

    if int_str.starts_with("-0") || (int_str.starts_with('0') && int_str.len() > 1) {
        return Err(DecodeError::Malformed("leading zeros".into()));
    }

    let value: i64 = int_str
        .parse()
        .map_err(|_| DecodeError::Malformed(format!("integer out of range: {}", int_str)))?;

    *pos += 1;
    Ok(Value::Integer(value))
}

fn decode_bytes(data: &[u8], pos: &mut usize) -> Result<Value, DecodeError> {
    let start = *pos;
    while *pos < data.len() && data[*pos] != b':' {
        if !data[*pos].is_ascii_digit() {
            return Err(DecodeError::Malformed("invalid string length".into()));
        }
        *pos += 1;
    }

    if *pos >= data.len() {
        return Err(DecodeError::Truncated);
    }

    let len_str = std::str::from_utf8(&data[start..*pos])
        .map_err(|_| DecodeError::Malformed("invalid string length".into()))?;

    if len_str.len() > 1 && len_str.starts_with('0') {
        return Err(DecodeError::Malformed("leading zeros in string length".into()));
    }

    let len: usize = len_str
        .parse()
        .map_err(|_| DecodeError::Malformed("invalid string length".into()))?;

    *pos += 1;

    let end = pos
        .checked_add(len)
        .ok_or_else(|| DecodeError::Malformed("string length overflow".into()))?;
    if end > data.len() {
        return Err(DecodeError::Truncated);
    }

    let bytes = Bytes::copy_from_slice(&data[*pos..end]);
    *pos = end;

    Ok(Value::Bytes(bytes))
}

fn decode_list(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, DecodeError> {
    *pos += 1;
    let mut list = Vec::new();

    while *pos < data.len() && data[*pos] != b'e' {
        list.push(decode_value(data, pos, depth + 1)?);
    }

    if *pos >= data.len() {
        return Err(DecodeError::Truncated);
    }

    *pos += 1;
    Ok(Value::List(list))
}

fn decode_dict(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, DecodeError> {
    *pos += 1;
    let mut dict = BTreeMap::new();

    while *pos < data.len() && data[*pos] != b'e' {
        let key_pos = *pos;
        let key = match decode_value(data, pos, depth + 1)? {
            Value::Bytes(b) => b,
            _ => {
                return Err(DecodeError::Malformed(format!(
                    "dictionary key at {} is not a byte string",
                    key_pos
                )))
            }
        };

        let value = decode_value(data, pos, depth + 1)?;
        if dict.insert(key, value).is_some() {
            return Err(DecodeError::Malformed(format!(
                "duplicate dictionary key at {}",
                key_pos
            )));
        }
    }

    if *pos >= data.len() {
        return Err(DecodeError::Truncated);
    }

    *pos += 1;
    Ok(Value::Dict(dict))
}
