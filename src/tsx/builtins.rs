//! Global objects and the methods available on built-in values.
//!
//! Only non-mutating operations are provided. Templates render the same
//! input to the same output, so `push`, `splice` and friends are reported as
//! errors instead of silently diverging from the source semantics.

use super::date::{DateFlavor, DateValue, Unit, from_timestamp_ms, parse_date};
use super::interp::{EvalError, EvalResult, Interp, check_length, length_from};
use super::value::{Function, Object, Value, format_number};
use crate::log;
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::{Arc, LazyLock};

static UNDEFINED: Value = Value::Undefined;

fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&UNDEFINED)
}

fn native(name: &'static str, call: fn(&Interp, Vec<Value>) -> EvalResult<Value>) -> Value {
    Value::Function(Arc::new(Function::Native(Value::native(name, call))))
}

fn method(this: &Value, name: &str) -> Value {
    Value::Function(Arc::new(Function::Method {
        this: this.clone(),
        name: name.into(),
    }))
}

fn namespace(entries: Vec<(&'static str, Value)>) -> Value {
    Value::from(entries.into_iter().collect::<Object>())
}

// ============================================================================
// Globals
// ============================================================================

static GLOBALS: LazyLock<FxHashMap<&'static str, Value>> = LazyLock::new(|| {
    let mut globals = FxHashMap::default();

    globals.insert(
        "Object",
        namespace(vec![
            ("entries", native("entries", object_entries)),
            ("keys", native("keys", object_keys)),
            ("values", native("values", object_values)),
            ("fromEntries", native("fromEntries", object_from_entries)),
            ("assign", native("assign", object_assign)),
            ("freeze", native("freeze", identity)),
        ]),
    );
    globals.insert(
        "Array",
        namespace(vec![
            ("isArray", native("isArray", array_is_array)),
            ("from", native("from", array_from)),
        ]),
    );
    globals.insert(
        "JSON",
        namespace(vec![
            ("stringify", native("stringify", json_stringify)),
            ("parse", native("parse", json_parse)),
        ]),
    );
    globals.insert(
        "Math",
        namespace(vec![
            ("min", native("min", math_min)),
            ("max", native("max", math_max)),
            ("floor", native("floor", |_, a| Ok(math1(&a, f64::floor)))),
            ("ceil", native("ceil", |_, a| Ok(math1(&a, f64::ceil)))),
            ("round", native("round", |_, a| Ok(math1(&a, |n| (n + 0.5).floor())))),
            ("abs", native("abs", |_, a| Ok(math1(&a, f64::abs)))),
            ("trunc", native("trunc", |_, a| Ok(math1(&a, f64::trunc)))),
            ("sign", native("sign", |_, a| Ok(math1(&a, js_sign)))),
            ("sqrt", native("sqrt", |_, a| Ok(math1(&a, f64::sqrt)))),
            ("log", native("log", |_, a| Ok(math1(&a, f64::ln)))),
            ("log10", native("log10", |_, a| Ok(math1(&a, f64::log10)))),
            ("pow", native("pow", math_pow)),
            ("PI", Value::Number(std::f64::consts::PI)),
            ("E", Value::Number(std::f64::consts::E)),
        ]),
    );
    globals.insert(
        "Date",
        namespace(vec![("now", native("now", date_now))]),
    );
    globals.insert(
        "console",
        namespace(vec![
            ("log", native("log", console_log)),
            ("info", native("info", console_log)),
            ("warn", native("warn", console_warn)),
            ("error", native("error", console_warn)),
        ]),
    );
    globals.insert("String", native("String", |_, a| Ok(Value::from(arg(&a, 0).to_js_string()))));
    globals.insert("Number", native("Number", |_, a| Ok(Value::Number(number_arg(&a)))));
    globals.insert("Boolean", native("Boolean", |_, a| Ok(Value::Bool(arg(&a, 0).truthy()))));
    globals.insert("parseInt", native("parseInt", parse_int));
    globals.insert("parseFloat", native("parseFloat", parse_float));
    globals.insert("isNaN", native("isNaN", |_, a| Ok(Value::Bool(arg(&a, 0).to_number().is_nan()))));
    globals.insert("isFinite", native("isFinite", |_, a| Ok(Value::Bool(arg(&a, 0).to_number().is_finite()))));
    globals.insert("encodeURIComponent", native("encodeURIComponent", encode_uri_component));
    globals.insert("decodeURIComponent", native("decodeURIComponent", decode_uri_component));
    globals.insert("NaN", Value::Number(f64::NAN));
    globals.insert("Infinity", Value::Number(f64::INFINITY));
    globals.insert("undefined", Value::Undefined);
    globals
});

pub fn global(name: &str) -> Option<Value> {
    GLOBALS.get(name).cloned()
}

/// `Fragment` export of the `react` modules: renders its children.
pub fn fragment() -> Value {
    native("Fragment", |_, args| {
        Ok(get_property(arg(&args, 0), "children"))
    })
}

/// Default export of the `dayjs` module.
pub fn dayjs() -> Value {
    native("dayjs", |_, args| {
        Ok(Value::Date(Arc::new(to_date(arg(&args, 0), DateFlavor::Dayjs))))
    })
}

/// No-op stand-in for `dayjs/plugin/*` default exports and `dayjs.extend`.
pub fn noop() -> Value {
    native("noop", |_, _| Ok(Value::Undefined))
}

fn identity(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    Ok(args.into_iter().next().unwrap_or_default())
}

fn number_arg(args: &[Value]) -> f64 {
    if args.is_empty() {
        0.0
    } else {
        arg(args, 0).to_number()
    }
}

fn math1(args: &[Value], f: fn(f64) -> f64) -> Value {
    Value::Number(f(arg(args, 0).to_number()))
}

fn js_sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 { n } else { n.signum() }
}

fn math_min(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(
        f64::INFINITY,
        |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) },
    )))
}

fn math_max(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(
        f64::NEG_INFINITY,
        |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) },
    )))
}

fn math_pow(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Number(
        arg(&args, 0).to_number().powf(arg(&args, 1).to_number()),
    ))
}

fn date_now(_: &Interp, _: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Number(DateValue::now(DateFlavor::Js).timestamp_ms()))
}

fn console_message(args: &[Value]) -> String {
    args.iter()
        .map(|v| match v {
            Value::Str(s) => s.to_string(),
            Value::Object(_) | Value::Array(_) => v
                .to_json()
                .map_or_else(|| v.to_js_string(), |json| json.to_string()),
            other => other.to_js_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_log(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    log!("console"; "{}", console_message(&args));
    Ok(Value::Undefined)
}

fn console_warn(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    log!("warning"; "{}", console_message(&args));
    Ok(Value::Undefined)
}

fn parse_int(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let s = arg(&args, 0).to_js_string();
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut radix = match arg(&args, 1) {
        Value::Undefined => 10,
        r => r.to_number() as u32,
    };
    let mut digits = s;
    if radix == 0 || radix == 16 {
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            digits = hex;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return Ok(Value::Number(f64::NAN));
    }
    let n = digits[..end]
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    Ok(Value::Number(if negative { -n } else { n }))
}

fn parse_float(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let s = arg(&args, 0).to_js_string();
    let s = s.trim_start();
    let unsigned = s.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") {
        let n = if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
        return Ok(Value::Number(n));
    }

    // longest prefix of the form [sign] digits [. digits] [e [sign] digits]
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };
    end += digits(end);
    if bytes.get(end) == Some(&b'.') {
        end += 1 + digits(end + 1);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let n = digits(exp);
        if n > 0 {
            end = exp + n;
        }
    }
    Ok(Value::Number(s[..end].parse().unwrap_or(f64::NAN)))
}

fn encode_uri_component(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let s = arg(&args, 0).to_js_string();
    Ok(Value::from(urlencoding::encode(&s).into_owned()))
}

fn decode_uri_component(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let s = arg(&args, 0).to_js_string();
    urlencoding::decode(&s)
        .map(|decoded| Value::from(decoded.into_owned()))
        .map_err(|_| EvalError::new(format!("URI malformed: `{s}`")))
}

fn object_entries(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::from(
        entries(arg(&args, 0))
            .into_iter()
            .map(|(k, v)| Value::from(vec![Value::from(k), v]))
            .collect::<Vec<_>>(),
    ))
}

fn object_keys(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::from(
        entries(arg(&args, 0))
            .into_iter()
            .map(|(k, _)| Value::from(k))
            .collect::<Vec<_>>(),
    ))
}

fn object_values(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::from(
        entries(arg(&args, 0))
            .into_iter()
            .map(|(_, v)| v)
            .collect::<Vec<_>>(),
    ))
}

/// Own enumerable `(key, value)` pairs.
fn entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(object) => object
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::from(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn object_from_entries(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let mut object = Object::default();
    for pair in iterate(arg(&args, 0))? {
        let key = get_index(&pair, &Value::Number(0.0)).to_js_string();
        object.insert(key, get_index(&pair, &Value::Number(1.0)));
    }
    Ok(object.into())
}

/// `Object.assign(target, ...sources)` returns a merged copy; `target` is
/// left untouched.
fn object_assign(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let mut object = Object::default();
    for source in &args {
        spread_into(&mut object, source);
    }
    Ok(object.into())
}

fn array_is_array(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_))))
}

fn array_from(interp: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let source = arg(&args, 0);
    let items = match source {
        // `Array.from({ length: n })`
        Value::Object(object) => {
            let len = object.get("length").map_or(0.0, Value::to_number);
            vec![Value::Undefined; length_from(len, "array")?]
        }
        other => iterate(other)?,
    };
    match arg(&args, 1) {
        Value::Undefined => Ok(Value::from(items)),
        map => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                out.push(interp.call(map, vec![item, Value::Number(i as f64)])?);
            }
            Ok(Value::from(out))
        }
    }
}

fn json_stringify(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let Some(json) = arg(&args, 0).to_json() else {
        return Ok(Value::Undefined);
    };
    let indent = match arg(&args, 2) {
        Value::Number(n) if *n >= 1.0 => " ".repeat((*n as usize).min(10)),
        Value::Str(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return Ok(Value::from(json.to_string()));
    }

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    json.serialize(&mut serializer)
        .map_err(|e| EvalError::new(format!("JSON.stringify failed: {e}")))?;
    Ok(Value::from(String::from_utf8_lossy(&out).into_owned()))
}

fn json_parse(_: &Interp, args: Vec<Value>) -> EvalResult<Value> {
    let text = arg(&args, 0).to_js_string();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|json| Value::from_json(&json))
        .map_err(|e| EvalError::new(format!("JSON.parse: {e}")))
}

/// Statics hanging off native functions (`Number.isInteger`, `dayjs.extend`).
fn native_static(owner: &str, key: &str) -> Option<Value> {
    Some(match (owner, key) {
        ("Number", "isInteger") => native("isInteger", |_, a| {
            Ok(Value::Bool(
                matches!(arg(&a, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0),
            ))
        }),
        ("Number", "isFinite") => native("isFinite", |_, a| {
            Ok(Value::Bool(matches!(arg(&a, 0), Value::Number(n) if n.is_finite())))
        }),
        ("Number", "isNaN") => native("isNaN", |_, a| {
            Ok(Value::Bool(matches!(arg(&a, 0), Value::Number(n) if n.is_nan())))
        }),
        ("Number", "parseFloat") => native("parseFloat", parse_float),
        ("Number", "parseInt") => native("parseInt", parse_int),
        ("dayjs", "extend") => noop(),
        ("dayjs", "unix") => native("unix", |_, a| {
            let ms = arg(&a, 0).to_number() * 1000.0;
            Ok(Value::Date(Arc::new(DateValue::new(
                from_timestamp_ms(ms),
                DateFlavor::Dayjs,
            ))))
        }),
        _ => return None,
    })
}

// ============================================================================
// Property access
// ============================================================================

const ARRAY_METHODS: &[&str] = &[
    "map", "filter", "find", "findIndex", "findLast", "some", "every", "forEach", "reduce",
    "includes", "indexOf", "lastIndexOf", "join", "slice", "concat", "flat", "flatMap",
    "reverse", "toReversed", "sort", "toSorted", "at", "toString", "keys", "entries",
    // reported as errors when called
    "push", "pop", "shift", "unshift", "splice", "fill", "copyWithin",
];

const STRING_METHODS: &[&str] = &[
    "toUpperCase", "toLowerCase", "trim", "trimStart", "trimEnd", "split", "includes",
    "startsWith", "endsWith", "indexOf", "lastIndexOf", "replace", "replaceAll", "slice",
    "substring", "padStart", "padEnd", "repeat", "charAt", "charCodeAt", "at", "concat",
    "localeCompare", "normalize", "toString", "valueOf",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString", "toLocaleString", "valueOf"];

const JS_DATE_METHODS: &[&str] = &[
    "getFullYear", "getMonth", "getDate", "getDay", "getHours", "getMinutes", "getSeconds",
    "getMilliseconds", "getUTCFullYear", "getUTCMonth", "getUTCDate", "getUTCDay",
    "getUTCHours", "getUTCMinutes", "getUTCSeconds", "getUTCMilliseconds", "getTime",
    "valueOf", "toISOString", "toJSON", "toLocaleDateString", "toDateString", "toUTCString",
    "toString", "getTimezoneOffset",
];

const DAYJS_METHODS: &[&str] = &[
    "format", "diff", "valueOf", "unix", "year", "month", "date", "day", "hour", "minute",
    "second", "millisecond", "isBefore", "isAfter", "isSame", "isValid", "toISOString",
    "toDate", "toJSON", "toString", "add", "subtract", "clone", "startOf",
];

/// Read `value[key]`. Missing properties are `undefined`.
pub fn get_property(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(object) => object.get(key).cloned().unwrap_or_default(),
        Value::Array(items) => match key {
            "length" => Value::Number(items.len() as f64),
            _ if ARRAY_METHODS.contains(&key) => method(value, key),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
        },
        Value::Str(s) => match key {
            "length" => Value::Number(s.encode_utf16().count() as f64),
            _ if STRING_METHODS.contains(&key) => method(value, key),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| unit_at(&utf16(s), i))
                .unwrap_or_default(),
        },
        Value::Number(_) if NUMBER_METHODS.contains(&key) => method(value, key),
        Value::Bool(_) if key == "toString" => method(value, key),
        Value::Date(date) => {
            let methods = match date.flavor {
                DateFlavor::Js => JS_DATE_METHODS,
                DateFlavor::Dayjs => DAYJS_METHODS,
            };
            if methods.contains(&key) {
                method(value, key)
            } else {
                Value::Undefined
            }
        }
        Value::Function(func) => match key {
            "name" => Value::from(func.name()),
            _ => match func.as_ref() {
                Function::Native(native) => native_static(native.name, key).unwrap_or_default(),
                _ => Value::Undefined,
            },
        },
        _ => Value::Undefined,
    }
}

/// Read `value[key]` for a computed key.
pub fn get_index(value: &Value, key: &Value) -> Value {
    match (value, key) {
        (Value::Array(items), Value::Number(n)) => {
            if *n >= 0.0 && n.fract() == 0.0 {
                items.get(*n as usize).cloned().unwrap_or_default()
            } else {
                Value::Undefined
            }
        }
        _ => get_property(value, &key.to_js_string()),
    }
}

/// Values produced by `for`-like consumers: spread, array destructuring,
/// `Array.from`.
pub fn iterate(value: &Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.as_ref().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        other => Err(EvalError::new(format!(
            "{} is not iterable",
            match other {
                Value::Undefined | Value::Null => other.to_js_string(),
                _ => other.type_of().to_owned(),
            }
        ))),
    }
}

/// `{ ...value }`
pub fn spread_into(object: &mut Object, value: &Value) {
    match value {
        Value::Object(source) => {
            for (k, v) in source.iter() {
                object.insert(k.clone(), v.clone());
            }
        }
        Value::Array(_) | Value::Str(_) => {
            for (k, v) in entries(value) {
                object.insert(k, v);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Methods
// ============================================================================

pub fn call_method(interp: &Interp, this: &Value, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    match this {
        Value::Array(items) => array_method(interp, this, items, name, args),
        Value::Str(s) => string_method(interp, s, name, &args),
        Value::Number(n) => number_method(*n, name, &args),
        Value::Date(date) => match date.flavor {
            DateFlavor::Js => js_date_method(date, name),
            DateFlavor::Dayjs => dayjs_method(date, name, &args),
        },
        other => match name {
            "toString" => Ok(Value::from(other.to_js_string())),
            _ => Err(EvalError::new(format!("{} has no method `{name}`", other.type_of()))),
        },
    }
}

fn callback(interp: &Interp, f: &Value, item: &Value, i: usize, this: &Value) -> EvalResult<Value> {
    interp.call(f, vec![item.clone(), Value::Number(i as f64), this.clone()])
}

/// Resolve a relative `start`/`end` argument against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len as f64 + n.trunc()).max(0.0) as usize
    } else {
        (n.trunc() as usize).min(len)
    }
}

/// `includes` compares with SameValueZero, so `NaN` finds `NaN`.
fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_eq(b),
    }
}

fn array_method(
    interp: &Interp,
    this: &Value,
    items: &Arc<Vec<Value>>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    let f = arg(&args, 0);
    Ok(match name {
        "map" => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(callback(interp, f, item, i, this)?);
            }
            Value::from(out)
        }
        "filter" => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if callback(interp, f, item, i, this)?.truthy() {
                    out.push(item.clone());
                }
            }
            Value::from(out)
        }
        "find" | "findIndex" => {
            for (i, item) in items.iter().enumerate() {
                if callback(interp, f, item, i, this)?.truthy() {
                    return Ok(if name == "find" {
                        item.clone()
                    } else {
                        Value::Number(i as f64)
                    });
                }
            }
            if name == "find" { Value::Undefined } else { Value::Number(-1.0) }
        }
        "findLast" => {
            for (i, item) in items.iter().enumerate().rev() {
                if callback(interp, f, item, i, this)?.truthy() {
                    return Ok(item.clone());
                }
            }
            Value::Undefined
        }
        "some" => {
            for (i, item) in items.iter().enumerate() {
                if callback(interp, f, item, i, this)?.truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Value::Bool(false)
        }
        "every" => {
            for (i, item) in items.iter().enumerate() {
                if !callback(interp, f, item, i, this)?.truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Value::Bool(true)
        }
        "forEach" => {
            for (i, item) in items.iter().enumerate() {
                callback(interp, f, item, i, this)?;
            }
            Value::Undefined
        }
        "reduce" => {
            let mut iter = items.iter().enumerate();
            let mut acc = if args.len() >= 2 {
                args[1].clone()
            } else {
                match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(EvalError::new(
                            "reduce of empty array with no initial value",
                        ));
                    }
                }
            };
            for (i, item) in iter {
                acc = interp.call(
                    f,
                    vec![acc, item.clone(), Value::Number(i as f64), this.clone()],
                )?;
            }
            acc
        }
        "includes" => Value::Bool(items.iter().any(|item| same_value_zero(item, f))),
        "indexOf" => Value::Number(
            items
                .iter()
                .position(|item| item.strict_eq(f))
                .map_or(-1.0, |i| i as f64),
        ),
        "lastIndexOf" => Value::Number(
            items
                .iter()
                .rposition(|item| item.strict_eq(f))
                .map_or(-1.0, |i| i as f64),
        ),
        "join" => {
            let sep = match f {
                Value::Undefined => ",".to_owned(),
                sep => sep.to_js_string(),
            };
            let parts: Vec<_> = items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect();
            let len = parts.iter().map(String::len).sum::<usize>()
                + sep.len().saturating_mul(parts.len().saturating_sub(1));
            check_length(len, "string")?;
            Value::from(parts.join(&sep))
        }
        "toString" => Value::from(this.to_js_string()),
        "slice" => {
            let start = relative_index(arg(&args, 0), items.len(), 0);
            let end = relative_index(arg(&args, 1), items.len(), items.len());
            Value::from(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        }
        "concat" => {
            let mut out = items.as_ref().clone();
            for extra in &args {
                match extra {
                    Value::Array(more) => {
                        check_length(out.len() + more.len(), "array")?;
                        out.extend(more.iter().cloned());
                    }
                    other => out.push(other.clone()),
                }
            }
            Value::from(out)
        }
        "flat" => {
            let depth = match f {
                Value::Undefined => 1,
                d => d.to_number().max(0.0) as usize,
            };
            Value::from(flatten(items, depth))
        }
        "flatMap" => {
            let mut mapped = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                mapped.push(callback(interp, f, item, i, this)?);
            }
            Value::from(flatten(&mapped, 1))
        }
        "reverse" | "toReversed" => Value::from(items.iter().rev().cloned().collect::<Vec<_>>()),
        "sort" | "toSorted" => {
            let sorted = merge_sort(items.as_ref().clone(), &mut |a, b| match f {
                Value::Undefined => Ok(default_order(a, b)),
                compare => {
                    let n = interp.call(compare, vec![a.clone(), b.clone()])?.to_number();
                    Ok(if n < 0.0 {
                        Ordering::Less
                    } else if n > 0.0 {
                        Ordering::Greater
                    } else {
                        Ordering::Equal
                    })
                }
            })?;
            Value::from(sorted)
        }
        "at" => {
            let n = f.to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let i = if n < 0.0 { items.len() as f64 + n } else { n };
            if i < 0.0 {
                Value::Undefined
            } else {
                items.get(i as usize).cloned().unwrap_or_default()
            }
        }
        "keys" => Value::from(
            (0..items.len())
                .map(|i| Value::Number(i as f64))
                .collect::<Vec<_>>(),
        ),
        "entries" => Value::from(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| Value::from(vec![Value::Number(i as f64), v.clone()]))
                .collect::<Vec<_>>(),
        ),
        _ => {
            return Err(EvalError::new(format!(
                "`{name}` would modify the array; build a new array with spread, `concat` or `slice` instead"
            )));
        }
    })
}

fn flatten(items: &[Value], depth: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => out.extend(flatten(inner, depth - 1)),
            other => out.push(other.clone()),
        }
    }
    out
}

/// Default `sort()` order: string comparison, `undefined` last.
fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        _ => utf16(&a.to_js_string()).cmp(&utf16(&b.to_js_string())),
    }
}

/// Stable merge sort that tolerates inconsistent comparators.
fn merge_sort(
    mut items: Vec<Value>,
    cmp: &mut dyn FnMut(&Value, &Value) -> EvalResult<Ordering>,
) -> EvalResult<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, cmp)?;
    let right = merge_sort(right, cmp)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => cmp(b, a)? == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        if take_right {
            out.extend(right.next());
        } else {
            out.extend(left.next());
        }
    }
    Ok(out)
}

// ----------------------------------------------------------------------------
// Strings
// ----------------------------------------------------------------------------

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_utf16(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

fn unit_at(units: &[u16], i: usize) -> Option<Value> {
    units.get(i).map(|u| Value::from(from_utf16(&[*u])))
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn rfind_units(haystack: &[u16], needle: &[u16]) -> Option<usize> {
    if needle.is_empty() {
        return Some(haystack.len());
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn pad(s: &str, args: &[Value], at_start: bool) -> EvalResult<String> {
    let target = arg(args, 0).to_number();
    let fill = match arg(args, 1) {
        Value::Undefined => " ".to_owned(),
        f => f.to_js_string(),
    };
    let len = s.encode_utf16().count();
    if !(target > len as f64) || fill.is_empty() {
        return Ok(s.to_owned());
    }
    let missing = length_from(target, "string")? - len;
    let padding: String = fill.chars().cycle().take(missing).collect();
    Ok(if at_start {
        padding + s
    } else {
        s.to_owned() + &padding
    })
}

fn replace(
    interp: &Interp,
    s: &str,
    pattern: &str,
    replacement: &Value,
    all: bool,
) -> EvalResult<String> {
    let mut out = String::with_capacity(s.len());
    let mut rest = 0;
    let mut search = 0;
    while let Some(found) = s.get(search..).and_then(|tail| tail.find(pattern)) {
        let at = search + found;
        out.push_str(&s[rest..at]);
        match replacement {
            Value::Function(_) => {
                let args = vec![
                    Value::from(pattern),
                    Value::Number(s[..at].encode_utf16().count() as f64),
                    Value::from(s),
                ];
                out.push_str(&interp.call(replacement, args)?.to_js_string());
            }
            other => out.push_str(&other.to_js_string().replace("$&", pattern)),
        }
        rest = at + pattern.len();
        if !all {
            break;
        }
        // an empty pattern matches between every character
        search = if pattern.is_empty() {
            match s[rest..].chars().next() {
                Some(c) => {
                    out.push(c);
                    rest += c.len_utf8();
                    rest
                }
                None => break,
            }
        } else {
            rest
        };
    }
    out.push_str(&s[rest..]);
    Ok(out)
}

fn string_method(interp: &Interp, s: &Arc<str>, name: &str, args: &[Value]) -> EvalResult<Value> {
    let a0 = arg(args, 0);
    let text = |v: &Value| v.to_js_string();
    Ok(match name {
        "toUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "trimStart" => Value::from(s.trim_start()),
        "trimEnd" => Value::from(s.trim_end()),
        "toString" | "valueOf" | "normalize" => Value::Str(s.clone()),
        "split" => {
            let parts: Vec<Value> = match a0 {
                Value::Undefined => vec![Value::Str(s.clone())],
                sep => {
                    let sep = text(sep);
                    if sep.is_empty() {
                        s.chars().map(|c| Value::from(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::from).collect()
                    }
                }
            };
            match arg(args, 1) {
                Value::Undefined => Value::from(parts),
                limit => {
                    let limit = limit.to_number().max(0.0) as usize;
                    Value::from(parts.into_iter().take(limit).collect::<Vec<_>>())
                }
            }
        }
        "includes" => Value::Bool(s.contains(text(a0).as_str())),
        "startsWith" => {
            let units = utf16(s);
            let start = relative_index(arg(args, 1), units.len(), 0);
            Value::Bool(units[start..].starts_with(&utf16(&text(a0))))
        }
        "endsWith" => {
            let units = utf16(s);
            let end = relative_index(arg(args, 1), units.len(), units.len());
            Value::Bool(units[..end].ends_with(&utf16(&text(a0))))
        }
        "indexOf" => {
            let units = utf16(s);
            let from = relative_index(arg(args, 1), units.len(), 0);
            Value::Number(find_units(&units, &utf16(&text(a0)), from).map_or(-1.0, |i| i as f64))
        }
        "lastIndexOf" => Value::Number(
            rfind_units(&utf16(s), &utf16(&text(a0))).map_or(-1.0, |i| i as f64),
        ),
        "replace" | "replaceAll" => {
            Value::from(replace(interp, s, &text(a0), arg(args, 1), name == "replaceAll")?)
        }
        "slice" => {
            let units = utf16(s);
            let start = relative_index(a0, units.len(), 0);
            let end = relative_index(arg(args, 1), units.len(), units.len());
            Value::from(from_utf16(units.get(start..end.max(start)).unwrap_or_default()))
        }
        "substring" => {
            let units = utf16(s);
            let clamp = |v: &Value, default: usize| match v {
                Value::Undefined => default,
                v => {
                    let n = v.to_number();
                    if n.is_nan() || n < 0.0 { 0 } else { (n as usize).min(units.len()) }
                }
            };
            let (a, b) = (clamp(a0, 0), clamp(arg(args, 1), units.len()));
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::from(from_utf16(&units[start..end]))
        }
        "padStart" => Value::from(pad(s, args, true)?),
        "padEnd" => Value::from(pad(s, args, false)?),
        "repeat" => {
            let n = a0.to_number();
            if n < 0.0 || n.is_infinite() {
                return Err(EvalError::new(format!("invalid repeat count: {}", format_number(n))));
            }
            if s.is_empty() {
                return Ok(Value::from(""));
            }
            let count = length_from(n.trunc(), "repeat count")?;
            check_length(s.len().saturating_mul(count), "string")?;
            Value::from(s.repeat(count))
        }
        "charAt" => {
            let i = a0.to_number();
            let i = if i.is_nan() { 0.0 } else { i };
            if i < 0.0 {
                Value::from("")
            } else {
                unit_at(&utf16(s), i as usize).unwrap_or_else(|| Value::from(""))
            }
        }
        "charCodeAt" => {
            let i = a0.to_number();
            let i = if i.is_nan() { 0.0 } else { i };
            let units = utf16(s);
            Value::Number(if i < 0.0 {
                f64::NAN
            } else {
                units.get(i as usize).map_or(f64::NAN, |u| f64::from(*u))
            })
        }
        "at" => {
            let units = utf16(s);
            let n = a0.to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let i = if n < 0.0 { units.len() as f64 + n } else { n };
            if i < 0.0 {
                Value::Undefined
            } else {
                unit_at(&units, i as usize).unwrap_or_default()
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for extra in args {
                out.push_str(&extra.to_js_string());
                check_length(out.len(), "string")?;
            }
            Value::from(out)
        }
        "localeCompare" => Value::Number(match (**s).cmp(text(a0).as_str()) {
            Ordering::Less => -1.0,
            Ordering::Equal => 0.0,
            Ordering::Greater => 1.0,
        }),
        _ => return Err(EvalError::new(format!("string has no method `{name}`"))),
    })
}

// ----------------------------------------------------------------------------
// Numbers
// ----------------------------------------------------------------------------

fn number_method(n: f64, name: &str, args: &[Value]) -> EvalResult<Value> {
    Ok(match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(EvalError::new("toFixed() digits argument must be between 0 and 100"));
            }
            if n.is_finite() {
                Value::from(format!("{n:.*}", digits as usize))
            } else {
                Value::from(format_number(n))
            }
        }
        "toString" => match arg(args, 0) {
            Value::Undefined => Value::from(format_number(n)),
            radix => Value::from(to_radix(n, radix.to_number() as u32)?),
        },
        "toLocaleString" => Value::from(to_locale_string(n)),
        "valueOf" => Value::Number(n),
        _ => return Err(EvalError::new(format!("number has no method `{name}`"))),
    })
}

fn to_radix(n: f64, radix: u32) -> EvalResult<String> {
    if !(2..=36).contains(&radix) {
        return Err(EvalError::new("toString() radix must be between 2 and 36"));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(format_number(n));
    }
    let mut value = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let digit = (value % u64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        value /= u64::from(radix);
        if value == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(digits.into_iter().rev().collect())
}

/// `en-US` grouping with at most three fraction digits.
fn to_locale_string(n: f64) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let fixed = format!("{:.3}", n.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac = frac.trim_end_matches('0');

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if n < 0.0 && (int != "0" || !frac.is_empty()) { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

// ----------------------------------------------------------------------------
// Dates
// ----------------------------------------------------------------------------

/// Coerce `dayjs(x)` / `new Date(x)` / `a.diff(x)` arguments.
fn to_date(value: &Value, flavor: DateFlavor) -> DateValue {
    let time = match value {
        Value::Undefined => return DateValue::now(flavor),
        Value::Str(s) => parse_date(s),
        Value::Number(ms) => from_timestamp_ms(*ms),
        Value::Date(date) => date.time,
        _ => None,
    };
    DateValue::new(time, flavor)
}

/// `new Date(...)`
pub fn construct_date(args: &[Value]) -> Value {
    let date = match args {
        [] => DateValue::now(DateFlavor::Js),
        [Value::Undefined] => DateValue::new(None, DateFlavor::Js),
        [single] => to_date(single, DateFlavor::Js),
        components => {
            let part = |i: usize, default: f64| match components.get(i) {
                Some(v) => v.to_number(),
                None => default,
            };
            let time = NaiveDate::from_ymd_opt(
                part(0, f64::NAN) as i32,
                1,
                1,
            )
            .filter(|_| components.iter().all(|v| v.to_number().is_finite()))
            .and_then(|d| {
                let base = d.and_hms_opt(0, 0, 0)?.and_utc();
                let month = DateValue::new(Some(base), DateFlavor::Js)
                    .add(part(1, 0.0), Unit::Month);
                let ms = (part(2, 1.0) - 1.0) * 86_400_000.0
                    + part(3, 0.0) * 3_600_000.0
                    + part(4, 0.0) * 60_000.0
                    + part(5, 0.0) * 1_000.0
                    + part(6, 0.0);
                month.add(ms, Unit::Millisecond).time
            });
            DateValue::new(time, DateFlavor::Js)
        }
    };
    Value::Date(Arc::new(date))
}

fn js_date_method(date: &DateValue, name: &str) -> EvalResult<Value> {
    if name == "toUTCString" {
        return Ok(Value::from(
            DateValue::new(date.time, DateFlavor::Dayjs).to_string(),
        ));
    }
    let field = |f: &str| Value::Number(date.field(f));
    // dates are UTC, so `getUTCx` and `getX` agree
    Ok(match name.replace("UTC", "").as_str() {
        "getFullYear" => field("year"),
        "getMonth" => field("month"),
        "getDate" => field("date"),
        "getDay" => field("day"),
        "getHours" => field("hour"),
        "getMinutes" => field("minute"),
        "getSeconds" => field("second"),
        "getMilliseconds" => field("millisecond"),
        "getTime" | "valueOf" => Value::Number(date.timestamp_ms()),
        "getTimezoneOffset" => Value::Number(if date.is_valid() { 0.0 } else { f64::NAN }),
        "toISOString" => Value::from(
            date.to_iso_string()
                .ok_or_else(|| EvalError::new("invalid time value"))?,
        ),
        "toJSON" => date.to_iso_string().map_or(Value::Null, Value::from),
        "toLocaleDateString" => Value::from(date.to_locale_date_string()),
        "toDateString" => Value::from(date.to_date_string()),
        "toString" => Value::from(date.to_string()),
        _ => return Err(EvalError::new(format!("Date has no method `{name}`"))),
    })
}

fn unit_arg(value: &Value, default: Unit) -> EvalResult<Unit> {
    match value {
        Value::Undefined => Ok(default),
        v => {
            let s = v.to_js_string();
            Unit::parse(&s).ok_or_else(|| EvalError::new(format!("unknown date unit `{s}`")))
        }
    }
}

fn dayjs_method(date: &DateValue, name: &str, args: &[Value]) -> EvalResult<Value> {
    let a0 = arg(args, 0);
    let wrap = |d: DateValue| Value::Date(Arc::new(d));
    let other = || to_date(a0, DateFlavor::Dayjs);
    let compare = |unit: &Value| -> EvalResult<(f64, f64)> {
        let unit = unit_arg(unit, Unit::Millisecond)?;
        Ok((
            date.start_of(unit).timestamp_ms(),
            other().start_of(unit).timestamp_ms(),
        ))
    };
    Ok(match name {
        "format" => Value::from(date.format(match a0 {
            Value::Undefined => None,
            Value::Str(s) => Some(&**s),
            _ => None,
        })),
        "diff" => Value::Number(date.diff(
            &other(),
            unit_arg(arg(args, 1), Unit::Millisecond)?,
            arg(args, 2).truthy(),
        )),
        "valueOf" => Value::Number(date.timestamp_ms()),
        "unix" => Value::Number((date.timestamp_ms() / 1000.0).floor()),
        "year" | "month" | "date" | "day" | "hour" | "minute" | "second" | "millisecond" => {
            Value::Number(date.field(name))
        }
        "isBefore" => {
            let (a, b) = compare(arg(args, 1))?;
            Value::Bool(a < b)
        }
        "isAfter" => {
            let (a, b) = compare(arg(args, 1))?;
            Value::Bool(a > b)
        }
        "isSame" => {
            let (a, b) = compare(arg(args, 1))?;
            Value::Bool(a == b)
        }
        "isValid" => Value::Bool(date.is_valid()),
        "toISOString" => Value::from(
            date.to_iso_string()
                .ok_or_else(|| EvalError::new("invalid time value"))?,
        ),
        "toJSON" => date.to_iso_string().map_or(Value::Null, Value::from),
        "toDate" => wrap(DateValue::new(date.time, DateFlavor::Js)),
        "toString" => Value::from(date.to_string()),
        "clone" => wrap(date.clone()),
        "add" => wrap(date.add(a0.to_number(), unit_arg(arg(args, 1), Unit::Millisecond)?)),
        "subtract" => wrap(date.add(-a0.to_number(), unit_arg(arg(args, 1), Unit::Millisecond)?)),
        "startOf" => wrap(date.start_of(unit_arg(a0, Unit::Millisecond)?)),
        _ => return Err(EvalError::new(format!("dayjs has no method `{name}`"))),
    })
}
