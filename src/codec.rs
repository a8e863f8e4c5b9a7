//! Byte-level MessagePack encode/decode for a single [`Value`].
//!
//! Decoding distinguishes a buffer that simply doesn't hold a whole value
//! yet ([`Error::Incomplete`]) from one that holds bytes that can never form
//! a valid value ([`Error::Malformed`]). The caller is expected to retry
//! `Incomplete` decodes once more bytes have arrived, from the start of the
//! same buffer.

use std::io::Cursor;

/// Nesting limit for arrays/maps/ext during decode. Without a limit a
/// corrupted or hostile stream can drive the decoder into unbounded
/// recursion and blow the stack (see the depth-attack scenario this guards
/// against).
const MAX_DEPTH: u32 = 1024;

use crate::value::Value;

#[derive(Debug)]
pub enum Error {
    /// The buffer ends before a complete value could be read. Not fatal;
    /// the caller should read more bytes and retry from the start.
    Incomplete,
    Malformed(Malformed),
}

#[derive(Debug)]
pub enum Malformed {
    Io(std::io::Error),
    TypeMismatch(rmp::Marker),
    OutOfRange,
    InvalidUtf8(std::str::Utf8Error),
    DepthLimitExceeded,
    ReservedMarker,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Incomplete => write!(f, "buffer holds an incomplete value"),
            Error::Malformed(inner) => write!(f, "malformed value: {:?}", inner),
        }
    }
}

impl std::error::Error for Error {}

fn classify_io(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::Incomplete
    } else {
        Error::Malformed(Malformed::Io(err))
    }
}

impl From<rmp::decode::MarkerReadError> for Error {
    fn from(rmp::decode::MarkerReadError(err): rmp::decode::MarkerReadError) -> Error {
        classify_io(err)
    }
}

impl From<rmp::decode::ValueReadError> for Error {
    fn from(err: rmp::decode::ValueReadError) -> Error {
        match err {
            rmp::decode::ValueReadError::InvalidMarkerRead(sub)
            | rmp::decode::ValueReadError::InvalidDataRead(sub) => classify_io(sub),
            rmp::decode::ValueReadError::TypeMismatch(marker) => {
                Error::Malformed(Malformed::TypeMismatch(marker))
            }
        }
    }
}

impl From<rmp::decode::NumValueReadError> for Error {
    fn from(err: rmp::decode::NumValueReadError) -> Error {
        match err {
            rmp::decode::NumValueReadError::InvalidMarkerRead(sub)
            | rmp::decode::NumValueReadError::InvalidDataRead(sub) => classify_io(sub),
            rmp::decode::NumValueReadError::TypeMismatch(marker) => {
                Error::Malformed(Malformed::TypeMismatch(marker))
            }
            rmp::decode::NumValueReadError::OutOfRange => {
                Error::Malformed(Malformed::OutOfRange)
            }
        }
    }
}

impl From<rmp::decode::DecodeStringError<'_>> for Error {
    fn from(err: rmp::decode::DecodeStringError) -> Error {
        match err {
            rmp::decode::DecodeStringError::InvalidMarkerRead(sub)
            | rmp::decode::DecodeStringError::InvalidDataRead(sub) => classify_io(sub),
            rmp::decode::DecodeStringError::TypeMismatch(marker) => {
                Error::Malformed(Malformed::TypeMismatch(marker))
            }
            rmp::decode::DecodeStringError::BufferSizeTooSmall(_) => {
                Error::Malformed(Malformed::OutOfRange)
            }
            rmp::decode::DecodeStringError::InvalidUtf8(_, sub) => {
                Error::Malformed(Malformed::InvalidUtf8(sub))
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        classify_io(err)
    }
}

/// Decode exactly one top-level value from the front of `buf`.
///
/// Returns the decoded value and the number of bytes it occupied. Any
/// remaining bytes in `buf` are left untouched by the caller. `Incomplete`
/// means the same call should be retried once more bytes are appended to
/// the front of `buf` (nothing is consumed on that path).
pub fn decode(buf: &[u8]) -> Result<(Value, usize), Error> {
    let mut cursor = Cursor::new(buf);
    let value = decode_value(&mut cursor, 0)?;
    Ok((value, cursor.position() as usize))
}

fn decode_value(cursor: &mut Cursor<&[u8]>, depth: u32) -> Result<Value, Error> {
    if depth > MAX_DEPTH {
        return Err(Error::Malformed(Malformed::DepthLimitExceeded));
    }
    let marker = rmp::decode::read_marker(cursor)?;
    decode_from_marker(cursor, marker, depth)
}

fn decode_from_marker(
    cursor: &mut Cursor<&[u8]>,
    marker: rmp::Marker,
    depth: u32,
) -> Result<Value, Error> {
    use byteorder::{BigEndian, ReadBytesExt};
    match marker {
        rmp::Marker::Null => Ok(Value::Nil),
        rmp::Marker::True => Ok(Value::Bool(true)),
        rmp::Marker::False => Ok(Value::Bool(false)),
        rmp::Marker::FixPos(n) => Ok(Value::UInt(n as u64)),
        rmp::Marker::FixNeg(n) => Ok(Value::Int(n as i64)),
        rmp::Marker::U8 => Ok(Value::UInt(cursor.read_u8()? as u64)),
        rmp::Marker::U16 => Ok(Value::UInt(cursor.read_u16::<BigEndian>()? as u64)),
        rmp::Marker::U32 => Ok(Value::UInt(cursor.read_u32::<BigEndian>()? as u64)),
        rmp::Marker::U64 => Ok(Value::UInt(cursor.read_u64::<BigEndian>()?)),
        rmp::Marker::I8 => Ok(Value::Int(cursor.read_i8()? as i64)),
        rmp::Marker::I16 => Ok(Value::Int(cursor.read_i16::<BigEndian>()? as i64)),
        rmp::Marker::I32 => Ok(Value::Int(cursor.read_i32::<BigEndian>()? as i64)),
        rmp::Marker::I64 => Ok(Value::Int(cursor.read_i64::<BigEndian>()?)),
        rmp::Marker::F32 => Ok(Value::Float(cursor.read_f32::<BigEndian>()? as f64)),
        rmp::Marker::F64 => Ok(Value::Float(cursor.read_f64::<BigEndian>()?)),
        rmp::Marker::FixStr(len) => decode_str(cursor, len as u32),
        rmp::Marker::Str8 => {
            let len = cursor.read_u8()? as u32;
            decode_str(cursor, len)
        }
        rmp::Marker::Str16 => {
            let len = cursor.read_u16::<BigEndian>()? as u32;
            decode_str(cursor, len)
        }
        rmp::Marker::Str32 => {
            let len = cursor.read_u32::<BigEndian>()?;
            decode_str(cursor, len)
        }
        rmp::Marker::Bin8 => {
            let len = cursor.read_u8()? as u32;
            decode_bin(cursor, len)
        }
        rmp::Marker::Bin16 => {
            let len = cursor.read_u16::<BigEndian>()? as u32;
            decode_bin(cursor, len)
        }
        rmp::Marker::Bin32 => {
            let len = cursor.read_u32::<BigEndian>()?;
            decode_bin(cursor, len)
        }
        rmp::Marker::FixArray(len) => decode_array(cursor, len as u32, depth),
        rmp::Marker::Array16 => {
            let len = cursor.read_u16::<BigEndian>()? as u32;
            decode_array(cursor, len, depth)
        }
        rmp::Marker::Array32 => {
            let len = cursor.read_u32::<BigEndian>()?;
            decode_array(cursor, len, depth)
        }
        rmp::Marker::FixMap(len) => decode_map(cursor, len as u32, depth),
        rmp::Marker::Map16 => {
            let len = cursor.read_u16::<BigEndian>()? as u32;
            decode_map(cursor, len, depth)
        }
        rmp::Marker::Map32 => {
            let len = cursor.read_u32::<BigEndian>()?;
            decode_map(cursor, len, depth)
        }
        rmp::Marker::FixExt1 => decode_ext(cursor, 1),
        rmp::Marker::FixExt2 => decode_ext(cursor, 2),
        rmp::Marker::FixExt4 => decode_ext(cursor, 4),
        rmp::Marker::FixExt8 => decode_ext(cursor, 8),
        rmp::Marker::FixExt16 => decode_ext(cursor, 16),
        rmp::Marker::Ext8 => {
            let len = cursor.read_u8()? as u32;
            decode_ext(cursor, len)
        }
        rmp::Marker::Ext16 => {
            let len = cursor.read_u16::<BigEndian>()? as u32;
            decode_ext(cursor, len)
        }
        rmp::Marker::Ext32 => {
            let len = cursor.read_u32::<BigEndian>()?;
            decode_ext(cursor, len)
        }
        rmp::Marker::Reserved => {
            Err(Error::Malformed(Malformed::ReservedMarker))
        }
    }
}

fn read_exact_owned(cursor: &mut Cursor<&[u8]>, len: u32) -> Result<Vec<u8>, Error> {
    use std::io::Read;
    let mut buf = vec![0u8; len as usize];
    cursor.read_exact(&mut buf).map_err(classify_io)?;
    Ok(buf)
}

fn decode_str(cursor: &mut Cursor<&[u8]>, len: u32) -> Result<Value, Error> {
    let bytes = read_exact_owned(cursor, len)?;
    let s = String::from_utf8(bytes)
        .map_err(|err| Error::Malformed(Malformed::InvalidUtf8(err.utf8_error())))?;
    Ok(Value::Str(s))
}

fn decode_bin(cursor: &mut Cursor<&[u8]>, len: u32) -> Result<Value, Error> {
    Ok(Value::Bin(read_exact_owned(cursor, len)?))
}

fn decode_array(cursor: &mut Cursor<&[u8]>, len: u32, depth: u32) -> Result<Value, Error> {
    let mut items = Vec::with_capacity(len.min(4096) as usize);
    for _ in 0..len {
        items.push(decode_value(cursor, depth + 1)?);
    }
    Ok(Value::Array(items))
}

fn decode_map(cursor: &mut Cursor<&[u8]>, len: u32, depth: u32) -> Result<Value, Error> {
    let mut entries = Vec::with_capacity(len.min(4096) as usize);
    for _ in 0..len {
        let key = decode_value(cursor, depth + 1)?;
        let val = decode_value(cursor, depth + 1)?;
        entries.push((key, val));
    }
    Ok(Value::Map(entries))
}

fn decode_ext(cursor: &mut Cursor<&[u8]>, len: u32) -> Result<Value, Error> {
    use byteorder::ReadBytesExt;
    let type_ = cursor.read_i8()?;
    let bytes = read_exact_owned(cursor, len)?;
    Ok(Value::Ext(type_, bytes))
}

/// Encode `value` onto the end of `out`, choosing the shortest valid
/// representation for integers and container headers.
pub fn encode(value: &Value, out: &mut Vec<u8>) -> Result<(), std::io::Error> {
    match value {
        Value::Nil => {
            rmp::encode::write_nil(out)?;
        }
        Value::Bool(b) => {
            rmp::encode::write_bool(out, *b)?;
        }
        Value::Int(n) => {
            rmp::encode::write_sint(out, *n).map_err(value_write_err)?;
        }
        Value::UInt(n) => {
            rmp::encode::write_uint(out, *n).map_err(value_write_err)?;
        }
        Value::Float(f) => {
            rmp::encode::write_f64(out, *f)?;
        }
        Value::Str(s) => {
            rmp::encode::write_str(out, s)?;
        }
        Value::Bin(bytes) => {
            rmp::encode::write_bin(out, bytes).map_err(value_write_err)?;
        }
        Value::Array(items) => {
            rmp::encode::write_array_len(out, items.len() as u32)
                .map_err(value_write_err)?;
            for item in items {
                encode(item, out)?;
            }
        }
        Value::Map(entries) => {
            rmp::encode::write_map_len(out, entries.len() as u32)
                .map_err(value_write_err)?;
            for (key, val) in entries {
                encode(key, out)?;
                encode(val, out)?;
            }
        }
        Value::Ext(type_, bytes) => {
            rmp::encode::write_ext_meta(out, bytes.len() as u32, *type_)
                .map_err(value_write_err)?;
            std::io::Write::write_all(out, bytes)?;
        }
    }
    Ok(())
}

fn value_write_err(err: rmp::encode::ValueWriteError<std::io::Error>) -> std::io::Error {
    match err {
        rmp::encode::ValueWriteError::InvalidMarkerWrite(err)
        | rmp::encode::ValueWriteError::InvalidDataWrite(err) => err,
    }
}
