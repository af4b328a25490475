// Typed request/response marshaling between host values and Lua values.
//
// A `Request` encodes the receiver plus typed arguments in declared order. A
// `Response` holds exactly the arity the caller asked for and hands values out
// last-first; every extraction checks the Lua type before converting, and a
// mismatch is a `Contract` error.
use mlua::{Lua, MultiValue, Table, Value};

use crate::core::error::{Error, ErrorKind};

/// Methods the bootstrap script must define on the global `mesh` table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    Init,
    Nnodes,
    NodeCoords,
    Ntwins,
    TwinPair,
    NnodesSet,
    NodeSet,
    Nels,
    ElTet10,
    FuncInit,
    FuncCall,
}

impl Method {
    pub const ALL: [Method; 11] = [
        Method::Init,
        Method::Nnodes,
        Method::NodeCoords,
        Method::Ntwins,
        Method::TwinPair,
        Method::NnodesSet,
        Method::NodeSet,
        Method::Nels,
        Method::ElTet10,
        Method::FuncInit,
        Method::FuncCall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::Init => "init",
            Method::Nnodes => "nnodes",
            Method::NodeCoords => "node_coords",
            Method::Ntwins => "ntwins",
            Method::TwinPair => "twin_pair",
            Method::NnodesSet => "nnodes_set",
            Method::NodeSet => "node_set",
            Method::Nels => "nels",
            Method::ElTet10 => "el_tet10",
            Method::FuncInit => "func_init",
            Method::FuncCall => "func_call",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArgTag {
    Int,
    Float,
    Str,
}

impl ArgTag {
    /// `i`, `d` and `c`; any other character has no tag.
    pub fn from_format_char(c: char) -> Option<Self> {
        match c {
            'i' => Some(ArgTag::Int),
            'd' => Some(ArgTag::Float),
            'c' => Some(ArgTag::Str),
            _ => None,
        }
    }

    pub fn format_char(self) -> char {
        match self {
            ArgTag::Int => 'i',
            ArgTag::Float => 'd',
            ArgTag::Str => 'c',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Arg {
    pub fn tag(&self) -> ArgTag {
        match self {
            Arg::Int(_) => ArgTag::Int,
            Arg::Float(_) => ArgTag::Float,
            Arg::Str(_) => ArgTag::Str,
        }
    }

    pub(crate) fn to_lua(&self, lua: &Lua) -> mlua::Result<Value> {
        match self {
            Arg::Int(value) => Ok(Value::Integer(*value)),
            Arg::Float(value) => Ok(Value::Number(*value)),
            Arg::Str(value) => lua.create_string(value).map(Value::String),
        }
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(i64::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    method: Method,
    args: Vec<Arg>,
}

impl Request {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn extend<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = Arg>,
    {
        self.args.extend(args);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Receiver first, then the typed arguments in declared order.
    pub(crate) fn encode(&self, lua: &Lua, receiver: &Table) -> Result<MultiValue, Error> {
        let mut values = MultiValue::new();
        values.push_back(Value::Table(receiver.clone()));
        for arg in &self.args {
            let value = arg.to_lua(lua).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode argument")
                    .with_method(self.method.name())
                    .with_source(err)
            })?;
            values.push_back(value);
        }
        Ok(values)
    }
}

pub struct Response<'lua> {
    lua: &'lua Lua,
    method: Method,
    values: Vec<Value>,
}

impl<'lua> Response<'lua> {
    /// Adjusts the returned values to `arity`: extra values are dropped and
    /// missing ones read as `nil`.
    pub(crate) fn new(lua: &'lua Lua, method: Method, returned: MultiValue, arity: usize) -> Self {
        let mut values: Vec<Value> = returned.into_iter().take(arity).collect();
        values.resize(arity, Value::Nil);
        Self {
            lua,
            method,
            values,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    pub fn pop_value(&mut self) -> Result<Value, Error> {
        self.values.pop().ok_or_else(|| {
            self.contract("result consumed more values than the method returned".to_string())
        })
    }

    /// Lua integer subtype only; floats with integral values are rejected.
    pub fn pop_int(&mut self) -> Result<i64, Error> {
        let value = self.pop_value()?;
        self.expect_int(value)
    }

    /// Lua integers and floats; numeric strings are left to `pop_coerced_number`.
    pub fn pop_number(&mut self) -> Result<f64, Error> {
        let value = self.pop_value()?;
        self.expect_number(value)
    }

    /// Anything Lua itself would treat as a number, including numeric strings.
    pub fn pop_coerced_number(&mut self) -> Result<Result<f64, &'static str>, Error> {
        let value = self.pop_value()?;
        let type_name = value.type_name();
        let number = self.lua.coerce_number(value).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("number coercion failed")
                .with_method(self.method.name())
                .with_source(err)
        })?;
        Ok(number.ok_or(type_name))
    }

    pub fn pop_int_tuple<const N: usize>(&mut self) -> Result<[i64; N], Error> {
        let table = self.pop_sequence(N)?;
        let mut out = [0i64; N];
        for (k, slot) in out.iter_mut().enumerate() {
            let value = self.raw_index(&table, k + 1)?;
            *slot = self.expect_int(value)?;
        }
        Ok(out)
    }

    pub fn pop_number_tuple<const N: usize>(&mut self) -> Result<[f64; N], Error> {
        let table = self.pop_sequence(N)?;
        let mut out = [0f64; N];
        for (k, slot) in out.iter_mut().enumerate() {
            let value = self.raw_index(&table, k + 1)?;
            *slot = self.expect_number(value)?;
        }
        Ok(out)
    }

    fn pop_sequence(&mut self, len: usize) -> Result<Table, Error> {
        let table = match self.pop_value()? {
            Value::Table(table) => table,
            other => {
                return Err(self.contract(format!(
                    "expected table of {len}, got {}",
                    other.type_name()
                )));
            }
        };
        let actual = table.raw_len();
        if actual != len {
            return Err(self.contract(format!("expected table of {len}, got length {actual}")));
        }
        Ok(table)
    }

    fn raw_index(&self, table: &Table, index: usize) -> Result<Value, Error> {
        table.raw_get::<Value>(index).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to read result table")
                .with_method(self.method.name())
                .with_source(err)
        })
    }

    fn expect_int(&self, value: Value) -> Result<i64, Error> {
        match value {
            Value::Integer(value) => Ok(value),
            other => Err(self.contract(format!("expected integer, got {}", describe(&other)))),
        }
    }

    fn expect_number(&self, value: Value) -> Result<f64, Error> {
        match value {
            Value::Number(value) => Ok(value),
            Value::Integer(value) => Ok(value as f64),
            other => Err(self.contract(format!("expected number, got {}", describe(&other)))),
        }
    }

    fn contract(&self, message: String) -> Error {
        Error::new(ErrorKind::Contract)
            .with_message(message)
            .with_method(self.method.name())
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Number(number) => format!("float {number}"),
        other => other.type_name().to_string(),
    }
}

/// A typed result shape with a fixed arity.
pub trait Decode: Sized {
    const ARITY: usize;

    fn decode(response: &mut Response<'_>) -> Result<Self, Error>;
}

impl Decode for () {
    const ARITY: usize = 0;

    fn decode(_response: &mut Response<'_>) -> Result<Self, Error> {
        Ok(())
    }
}

impl Decode for i64 {
    const ARITY: usize = 1;

    fn decode(response: &mut Response<'_>) -> Result<Self, Error> {
        response.pop_int()
    }
}

#[cfg(test)]
mod tests {
    use super::{Arg, ArgTag, Method, Request, Response};
    use crate::core::error::ErrorKind;
    use mlua::{Lua, MultiValue, Value};

    fn returned(values: Vec<Value>) -> MultiValue {
        let mut out = MultiValue::new();
        for value in values {
            out.push_back(value);
        }
        out
    }

    #[test]
    fn int_arg_encodes_as_lua_integer() {
        let lua = Lua::new();
        let value = Arg::Int(-7).to_lua(&lua).expect("encode");
        assert!(matches!(value, Value::Integer(-7)));
        assert_eq!(Arg::from(3i32).tag(), ArgTag::Int);
    }

    #[test]
    fn float_arg_stays_float_even_when_integral() {
        let lua = Lua::new();
        let value = Arg::Float(2.0).to_lua(&lua).expect("encode");
        assert!(matches!(value, Value::Number(n) if n == 2.0));
        assert_eq!(Arg::from(2.0).tag(), ArgTag::Float);
    }

    #[test]
    fn str_arg_encodes_as_lua_string() {
        let lua = Lua::new();
        let value = Arg::from("fclad.msh").to_lua(&lua).expect("encode");
        match value {
            Value::String(s) => assert_eq!(s.to_string_lossy(), "fclad.msh"),
            other => panic!("expected string, got {}", other.type_name()),
        }
    }

    #[test]
    fn format_chars_map_to_tags() {
        for tag in [ArgTag::Int, ArgTag::Float, ArgTag::Str] {
            assert_eq!(ArgTag::from_format_char(tag.format_char()), Some(tag));
        }
        assert_eq!(ArgTag::from_format_char('_'), None);
        assert_eq!(ArgTag::from_format_char('s'), None);
    }

    #[test]
    fn request_puts_receiver_first() {
        let lua = Lua::new();
        let receiver = lua.create_table().expect("table");
        let request = Request::new(Method::NodeSet).arg(2).arg(1).arg(13).arg(17);
        let encoded = request.encode(&lua, &receiver).expect("encode");
        let values: Vec<Value> = encoded.into_iter().collect();
        assert_eq!(values.len(), 5);
        assert!(matches!(&values[0], Value::Table(t) if *t == receiver));
        assert!(matches!(values[1], Value::Integer(2)));
        assert!(matches!(values[4], Value::Integer(17)));
    }

    #[test]
    fn response_pops_last_value_first() {
        let lua = Lua::new();
        let mut response = Response::new(
            &lua,
            Method::TwinPair,
            returned(vec![Value::Integer(107), Value::Integer(15178)]),
            2,
        );
        assert_eq!(response.pop_int().expect("second"), 15178);
        assert_eq!(response.pop_int().expect("first"), 107);
        assert_eq!(response.remaining(), 0);
    }

    #[test]
    fn response_pads_missing_results_with_nil() {
        let lua = Lua::new();
        let mut response = Response::new(&lua, Method::Nnodes, MultiValue::new(), 1);
        let err = response.pop_int().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
        assert_eq!(err.method(), Some("nnodes"));
        assert_eq!(err.message(), Some("expected integer, got nil"));
    }

    #[test]
    fn response_drops_extra_results() {
        let lua = Lua::new();
        let mut response = Response::new(
            &lua,
            Method::Nels,
            returned(vec![Value::Integer(4), Value::Integer(99)]),
            1,
        );
        assert_eq!(response.pop_int().expect("count"), 4);
    }

    #[test]
    fn integral_float_is_not_an_integer() {
        let lua = Lua::new();
        let mut response = Response::new(&lua, Method::Nnodes, returned(vec![Value::Number(3.0)]), 1);
        let err = response.pop_int().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
        assert_eq!(err.message(), Some("expected integer, got float 3"));
    }

    #[test]
    fn number_accepts_integer_subtype() {
        let lua = Lua::new();
        let mut response = Response::new(&lua, Method::FuncCall, returned(vec![Value::Integer(4)]), 1);
        assert_eq!(response.pop_number().expect("number"), 4.0);
    }

    #[test]
    fn coerced_number_reports_type_of_non_numbers() {
        let lua = Lua::new();
        let text = lua.create_string("12.5").expect("string");
        let word = lua.create_string("twelve").expect("string");
        let mut response = Response::new(
            &lua,
            Method::FuncCall,
            returned(vec![Value::Boolean(true), Value::String(word), Value::String(text)]),
            3,
        );
        assert_eq!(response.pop_coerced_number().expect("pop"), Ok(12.5));
        assert_eq!(response.pop_coerced_number().expect("pop"), Err("string"));
        assert_eq!(response.pop_coerced_number().expect("pop"), Err("boolean"));
    }

    #[test]
    fn number_tuple_requires_exact_length() {
        let lua = Lua::new();
        let short = lua.create_sequence_from([1.0, 2.0]).expect("table");
        let mut response = Response::new(&lua, Method::NodeCoords, returned(vec![Value::Table(short)]), 1);
        let err = response.pop_number_tuple::<3>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
        assert_eq!(err.message(), Some("expected table of 3, got length 2"));

        let exact = lua.create_sequence_from([4.29, 0.0, 5.275]).expect("table");
        let mut response = Response::new(&lua, Method::NodeCoords, returned(vec![Value::Table(exact)]), 1);
        assert_eq!(response.pop_number_tuple::<3>().expect("coords"), [4.29, 0.0, 5.275]);
    }

    #[test]
    fn int_tuple_checks_every_element() {
        let lua = Lua::new();
        let table = lua.create_table().expect("table");
        table.raw_set(1, 5).expect("set");
        table.raw_set(2, 6.5).expect("set");
        let mut response = Response::new(&lua, Method::ElTet10, returned(vec![Value::Table(table)]), 1);
        let err = response.pop_int_tuple::<2>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
        assert_eq!(err.message(), Some("expected integer, got float 6.5"));
    }

    #[test]
    fn tuple_rejects_non_table() {
        let lua = Lua::new();
        let mut response = Response::new(&lua, Method::ElTet10, returned(vec![Value::Integer(1)]), 1);
        let err = response.pop_int_tuple::<10>().unwrap_err();
        assert_eq!(err.message(), Some("expected table of 10, got integer"));
    }

    #[test]
    fn method_names_match_script_contract() {
        let names: Vec<&str> = Method::ALL.iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            [
                "init",
                "nnodes",
                "node_coords",
                "ntwins",
                "twin_pair",
                "nnodes_set",
                "node_set",
                "nels",
                "el_tet10",
                "func_init",
                "func_call"
            ]
        );
    }
}
