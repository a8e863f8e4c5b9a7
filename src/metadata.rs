//! Parses the response of `nvim_get_api_info` into a structured catalog.
//!
//! The response is a two-element array `[channel_id, metadata_map]`. Every
//! string is copied into freshly owned storage as part of the parse; there
//! is no arena here (see the source's arena-per-catalog design and why this
//! target skips it, in `DESIGN.md`). A structural deviation fails with
//! [`Error`] and leaves the caller's prior catalog, if any, untouched.

use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ApiVersion {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
    pub api_level: i64,
    pub api_compatible: i64,
    pub api_prerelease: bool,
    pub build: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub since: i64,
    pub method: bool,
    pub return_type: String,
    /// `(type_name, parameter_name)` pairs, in declaration order.
    pub parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub channel_id: i64,
    pub version: ApiVersion,
    pub functions: Vec<FunctionInfo>,
}

impl Catalog {
    pub fn find_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug)]
pub enum Error {
    NotATwoElementArray,
    ChannelIdNotAnInteger,
    MissingKey(&'static str),
    WrongType(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotATwoElementArray => {
                write!(f, "expected a [channel_id, metadata] array")
            }
            Error::ChannelIdNotAnInteger => write!(f, "channel_id is not an integer"),
            Error::MissingKey(key) => write!(f, "missing key {:?}", key),
            Error::WrongType(key) => write!(f, "wrong type for key {:?}", key),
        }
    }
}

impl std::error::Error for Error {}

pub fn parse(value: &Value) -> Result<Catalog, Error> {
    let items = value.as_array().ok_or(Error::NotATwoElementArray)?;
    let (channel_id_value, metadata) = match items {
        [channel_id, metadata] => (channel_id, metadata),
        _ => return Err(Error::NotATwoElementArray),
    };
    let channel_id = channel_id_value.as_int().ok_or(Error::ChannelIdNotAnInteger)?;
    let version = parse_version(metadata)?;
    let functions = parse_functions(metadata)?;
    Ok(Catalog { channel_id, version, functions })
}

fn required<'a>(map: &'a Value, key: &'static str) -> Result<&'a Value, Error> {
    map.map_get(key).ok_or(Error::MissingKey(key))
}

fn required_int(map: &Value, key: &'static str) -> Result<i64, Error> {
    required(map, key)?.as_int().ok_or(Error::WrongType(key))
}

fn required_str(map: &Value, key: &'static str) -> Result<String, Error> {
    required(map, key)?
        .as_str()
        .map(str::to_owned)
        .ok_or(Error::WrongType(key))
}

fn required_bool(map: &Value, key: &'static str) -> Result<bool, Error> {
    required(map, key)?.as_bool().ok_or(Error::WrongType(key))
}

fn parse_version(metadata: &Value) -> Result<ApiVersion, Error> {
    let version = required(metadata, "version")?;
    Ok(ApiVersion {
        major: required_int(version, "major")?,
        minor: required_int(version, "minor")?,
        patch: required_int(version, "patch")?,
        api_level: required_int(version, "api_level")?,
        api_compatible: required_int(version, "api_compatible")?,
        api_prerelease: required_bool(version, "api_prerelease")?,
        build: version.map_get("build").and_then(Value::as_str).map(str::to_owned),
    })
}

fn parse_functions(metadata: &Value) -> Result<Vec<FunctionInfo>, Error> {
    let functions = required(metadata, "functions")?
        .as_array()
        .ok_or(Error::WrongType("functions"))?;
    functions.iter().map(parse_function).collect()
}

fn parse_function(value: &Value) -> Result<FunctionInfo, Error> {
    let name = required_str(value, "name")?;
    let since = required_int(value, "since")?;
    let method = value.map_get("method").and_then(Value::as_bool).unwrap_or(false);
    let return_type = required_str(value, "return_type")?;
    let parameters_value = required(value, "parameters")?
        .as_array()
        .ok_or(Error::WrongType("parameters"))?;
    let parameters = parameters_value
        .iter()
        .map(parse_parameter)
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(FunctionInfo { name, since, method, return_type, parameters })
}

fn parse_parameter(value: &Value) -> Result<(String, String), Error> {
    let pair = value.as_array().ok_or(Error::WrongType("parameter"))?;
    let (type_value, name_value) = match pair {
        [type_value, name_value] => (type_value, name_value),
        _ => return Err(Error::WrongType("parameter")),
    };
    let type_name = type_value.as_str().ok_or(Error::WrongType("parameter_type"))?.to_owned();
    let parameter_name =
        name_value.as_str().ok_or(Error::WrongType("parameter_name"))?.to_owned();
    Ok((type_name, parameter_name))
}
