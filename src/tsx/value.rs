//! Runtime values of the template interpreter.
//!
//! Values are immutable: arrays and objects sit behind an [`Arc`] and every
//! operation that "changes" one builds a new value.

use super::ast::{FunctionDecl, Name};
use super::date::DateValue;
use super::interp::{EvalResult, Interp};
use super::module::Module;
use crate::vdom::Node;
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<Object>),
    Function(Arc<Function>),
    Node(Arc<Node>),
    Date(Arc<DateValue>),
}

/// Plain object with keys kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Object {
    entries: Vec<(Name, Value)>,
}

#[derive(Debug)]
pub enum Function {
    /// User function with its captured scope.
    Closure {
        decl: Arc<FunctionDecl>,
        env: Scope,
        module: Weak<Module>,
    },
    Native(NativeFn),
    /// Builtin method bound to its receiver (`arr.map`, `str.trim`, ...).
    Method { this: Value, name: Name },
}

#[derive(Debug, Clone, Copy)]
pub struct NativeFn {
    pub name: &'static str,
    pub call: fn(&Interp, Vec<Value>) -> EvalResult<Value>,
}

/// Lexical scope: a persistent linked list of bindings.
///
/// Binding a name returns a new scope; closures capture the scope as it was
/// when they were created, so closures never end up referencing themselves.
#[derive(Clone, Default)]
pub struct Scope(Option<Arc<Frame>>);

struct Frame {
    name: Name,
    value: Value,
    parent: Scope,
}

impl Scope {
    pub fn bind(&self, name: impl Into<Name>, value: Value) -> Self {
        Self(Some(Arc::new(Frame {
            name: name.into(),
            value,
            parent: self.clone(),
        })))
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut current = self.0.as_ref();
        while let Some(frame) = current {
            if frame.name == name {
                return Some(&frame.value);
            }
            current = frame.parent.0.as_ref();
        }
        None
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        let mut current = self.0.as_ref();
        while let Some(frame) = current {
            names.push(frame.name.as_str());
            current = frame.parent.0.as_ref();
        }
        f.debug_tuple("Scope").field(&names).finish()
    }
}

impl Object {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace, keeping the original position of existing keys.
    pub fn insert(&mut self, key: impl Into<Name>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl<K: Into<Name>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut object = Self::default();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Self::Closure { decl, .. } => decl.name.as_deref().unwrap_or(""),
            Self::Native(native) => native.name,
            Self::Method { name, .. } => name,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Arc::new(items))
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(Arc::new(object))
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Node(Arc::new(node))
    }
}

impl Value {
    pub const fn native(name: &'static str, call: fn(&Interp, Vec<Value>) -> EvalResult<Value>) -> NativeFn {
        NativeFn { name, call }
    }

    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub const fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Function(_) => "function",
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Node(_) | Self::Date(_) => {
                "object"
            }
        }
    }

    /// Numeric conversion (`Number(x)`, arithmetic operands).
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Str(s) => parse_number(s),
            Self::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => parse_number(&single.to_js_string()),
                _ => f64::NAN,
            },
            Self::Date(date) => date.timestamp_ms(),
            Self::Object(_) | Self::Function(_) | Self::Node(_) => f64::NAN,
        }
    }

    /// String conversion (`String(x)`, template literals, `+` concatenation).
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_owned(),
            Self::Null => "null".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Str(s) => s.to_string(),
            Self::Array(items) => items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) | Self::Node(_) => "[object Object]".to_owned(),
            Self::Function(f) => format!("function {}() {{ [code] }}", f.name()),
            Self::Date(date) => date.to_string(),
        }
    }

    /// `===`
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::Node(a), Self::Node(b)) => Arc::ptr_eq(a, b),
            (Self::Date(a), Self::Date(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Number(_) | Self::Bool(_), Self::Str(_))
            | (Self::Str(_), Self::Number(_) | Self::Bool(_))
            | (Self::Bool(_), Self::Number(_))
            | (Self::Number(_), Self::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }

    /// Convert deserialized data (frontmatter, JSON imports) into a value.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s.as_str()),
            serde_json::Value::Array(items) => {
                Self::from(items.iter().map(Self::from_json).collect::<Vec<_>>())
            }
            serde_json::Value::Object(map) => Self::from(
                map.iter()
                    .map(|(k, v)| (k.as_str(), Self::from_json(v)))
                    .collect::<Object>(),
            ),
        }
    }

    /// JSON view used by `JSON.stringify`; `None` for values JSON omits.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        Some(match self {
            Self::Undefined | Self::Function(_) => return None,
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, |num| {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Json::from(*n as i64)
                } else {
                    Json::Number(num)
                }
            }),
            Self::Str(s) => Json::String(s.to_string()),
            Self::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|v| v.to_json().unwrap_or(Json::Null))
                    .collect(),
            ),
            Self::Object(object) => Json::Object(
                object
                    .iter()
                    .filter_map(|(k, v)| Some((k.to_string(), v.to_json()?)))
                    .collect(),
            ),
            Self::Node(_) => Json::Object(serde_json::Map::new()),
            Self::Date(date) => date.to_iso_string().map_or(Json::Null, Json::String),
        })
    }
}

fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => s.parse().unwrap_or(f64::NAN),
    }
}

/// Format a number the way JavaScript prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from("").truthy());
        assert!(Value::from("0").truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(Value::from(Vec::new()).truthy());
        assert!(!Value::Null.truthy());
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::from("0x10").to_number(), 16.0);
        assert_eq!(Value::from("1e3").to_number(), 1000.0);
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert!(Value::Undefined.to_number().is_nan());
    }

    #[test]
    fn test_array_to_string() {
        let arr = Value::from(vec![Value::Number(1.0), Value::Null, Value::from("x")]);
        assert_eq!(arr.to_js_string(), "1,,x");
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.strict_eq(&Value::Undefined));
        assert!(Value::from("1").loose_eq(&Value::Number(1.0)));
        assert!(!Value::from("1").strict_eq(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));

        let arr = Value::from(vec![]);
        assert!(arr.strict_eq(&arr.clone()));
        assert!(!arr.strict_eq(&Value::from(vec![])));
    }

    #[test]
    fn test_object_insert_keeps_order() {
        let mut object = Object::default();
        object.insert("b", Value::Number(1.0));
        object.insert("a", Value::Number(2.0));
        object.insert("b", Value::Number(3.0));
        let keys: Vec<_> = object.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(object.get("b").map(Value::to_number), Some(3.0));
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"title": "Hi", "tags": ["a", 1], "draft": false});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), Some(json));
    }

    #[test]
    fn test_scope_shadowing() {
        let scope = Scope::default()
            .bind("a", Value::Number(1.0))
            .bind("b", Value::Number(2.0))
            .bind("a", Value::Number(3.0));
        assert_eq!(scope.lookup("a").map(Value::to_number), Some(3.0));
        assert_eq!(scope.lookup("b").map(Value::to_number), Some(2.0));
        assert!(scope.lookup("c").is_none());
    }
}
