//! The three MessagePack-RPC frame shapes, encoded as MessagePack arrays.
//!
//! msgpack-rpc spec: https://github.com/msgpack-rpc/msgpack-rpc/blob/master/spec.md

use crate::codec;
use crate::value::Value;

const TYPE_REQUEST: u64 = 0;
const TYPE_RESPONSE: u64 = 1;
const TYPE_NOTIFICATION: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request {
        msgid: u32,
        method: String,
        params: Vec<Value>,
    },
    Response {
        msgid: u32,
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

#[derive(Debug)]
pub enum Error {
    Incomplete,
    Malformed(Malformed),
}

#[derive(Debug)]
pub enum Malformed {
    NotAnArray,
    WrongArrayLength(usize),
    UnknownFrameType(u64),
    MsgidNotAnInteger,
    MethodNotAString,
    ParamsNotAnArray,
    Decode(codec::Malformed),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Incomplete => write!(f, "buffer holds an incomplete frame"),
            Error::Malformed(inner) => write!(f, "malformed frame: {:?}", inner),
        }
    }
}

impl std::error::Error for Error {}

impl From<codec::Error> for Error {
    fn from(err: codec::Error) -> Error {
        match err {
            codec::Error::Incomplete => Error::Incomplete,
            codec::Error::Malformed(inner) => Error::Malformed(Malformed::Decode(inner)),
        }
    }
}

/// Decode exactly one RPC frame from the front of `buf`, returning it
/// together with the number of bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<(Frame, usize), Error> {
    let (value, consumed) = codec::decode(buf)?;
    let frame = value_to_frame(value)?;
    Ok((frame, consumed))
}

fn value_to_frame(value: Value) -> Result<Frame, Malformed> {
    let mut items = match value {
        Value::Array(items) => items,
        _ => return Err(Malformed::NotAnArray),
    };
    let type_ = items
        .first()
        .and_then(Value::as_int)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or(Malformed::MsgidNotAnInteger)?;
    match (type_, items.len()) {
        (TYPE_REQUEST, 4) => {
            let params = take_params(items.pop().unwrap())?;
            let method = take_method(items.pop().unwrap())?;
            let msgid = take_msgid(items.pop().unwrap())?;
            Ok(Frame::Request {
                msgid,
                method,
                params,
            })
        }
        (TYPE_RESPONSE, 4) => {
            let result = items.pop().unwrap();
            let error = items.pop().unwrap();
            let msgid = take_msgid(items.pop().unwrap())?;
            Ok(Frame::Response {
                msgid,
                error,
                result,
            })
        }
        (TYPE_NOTIFICATION, 3) => {
            let params = take_params(items.pop().unwrap())?;
            let method = take_method(items.pop().unwrap())?;
            Ok(Frame::Notification { method, params })
        }
        (TYPE_REQUEST, n) | (TYPE_RESPONSE, n) | (TYPE_NOTIFICATION, n) => {
            Err(Malformed::WrongArrayLength(n))
        }
        (other, _) => Err(Malformed::UnknownFrameType(other)),
    }
}

fn take_msgid(value: Value) -> Result<u32, Malformed> {
    match value.as_int().and_then(|n| u32::try_from(n).ok()) {
        Some(msgid) => Ok(msgid),
        None => Err(Malformed::MsgidNotAnInteger),
    }
}

fn take_method(value: Value) -> Result<String, Malformed> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(Malformed::MethodNotAString),
    }
}

fn take_params(value: Value) -> Result<Vec<Value>, Malformed> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(Malformed::ParamsNotAnArray),
    }
}

pub fn encode(frame: &Frame, out: &mut Vec<u8>) -> Result<(), std::io::Error> {
    match frame {
        Frame::Request {
            msgid,
            method,
            params,
        } => {
            let value = Value::Array(vec![
                Value::UInt(TYPE_REQUEST),
                Value::UInt(*msgid as u64),
                Value::Str(method.clone()),
                Value::Array(params.clone()),
            ]);
            codec::encode(&value, out)
        }
        Frame::Response {
            msgid,
            error,
            result,
        } => {
            let value = Value::Array(vec![
                Value::UInt(TYPE_RESPONSE),
                Value::UInt(*msgid as u64),
                error.clone(),
                result.clone(),
            ]);
            codec::encode(&value, out)
        }
        Frame::Notification { method, params } => {
            let value = Value::Array(vec![
                Value::UInt(TYPE_NOTIFICATION),
                Value::Str(method.clone()),
                Value::Array(params.clone()),
            ]);
            codec::encode(&value, out)
        }
    }
}
