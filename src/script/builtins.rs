//! Script standard library
//!
//! Property access rules and the deterministic built-in functions available
//! to scripts. Everything here is pure: no clock, no randomness, no I/O. The
//! global scope is rebuilt for every execution, so nothing leaks between
//! script steps.

use std::rc::Rc;

use super::error::ScriptError;
use super::interpreter::Interpreter;
use super::value::{ObjectMap, Scope, ScopeRef, Value};

/// Build the global scope for one execution. `steps` is the only binding
/// that carries engine data; everything else is the fixed library.
pub fn globals(steps: Value) -> ScopeRef {
    let scope = Scope::root();
    {
        let mut frame = scope.borrow_mut();
        frame.declare("steps", steps, false);
        frame.declare("NaN", Value::Number(f64::NAN), false);
        frame.declare("Infinity", Value::Number(f64::INFINITY), false);
        frame.declare("Math", math_object(), false);
        frame.declare("JSON", json_object(), false);
        frame.declare("Object", object_object(), false);
        frame.declare("Array", array_object(), false);
        frame.declare("Number", Value::native("Number", global_number), false);
        frame.declare("String", Value::native("String", global_string), false);
        frame.declare("Boolean", Value::native("Boolean", global_boolean), false);
        frame.declare("parseInt", Value::native("parseInt", global_parse_int), false);
        frame.declare(
            "parseFloat",
            Value::native("parseFloat", global_parse_float),
            false,
        );
    }
    scope
}

// ----------------------------------------------------------------------
// Property access
// ----------------------------------------------------------------------

/// `object.name` lookup.
pub fn get_property(value: &Value, name: &str) -> Result<Value, ScriptError> {
    match value {
        Value::Undefined | Value::Null => Err(ScriptError::Type(format!(
            "Cannot read properties of {} (reading '{}')",
            value.to_display_string(),
            name
        ))),
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Undefined)),
        Value::Array(items) => Ok(array_member(value, items, name)),
        Value::Str(s) => Ok(string_member(value, s, name)),
        Value::Number(_) | Value::Bool(_) | Value::Closure(_) | Value::Native(_) => {
            Ok(Value::Undefined)
        }
    }
}

/// `object[key]` lookup. Numeric keys index arrays and strings; everything
/// else degrades to a property lookup on the key's string form.
pub fn get_index(value: &Value, key: &Value) -> Result<Value, ScriptError> {
    match value {
        Value::Undefined | Value::Null => Err(ScriptError::Type(format!(
            "Cannot read properties of {} (reading '{}')",
            value.to_display_string(),
            key.to_display_string()
        ))),
        Value::Array(items) => {
            if let Some(idx) = element_index(key) {
                return Ok(items.get(idx).cloned().unwrap_or(Value::Undefined));
            }
            get_property(value, &key.to_display_string())
        }
        Value::Str(s) => {
            if let Some(idx) = element_index(key) {
                return Ok(s
                    .chars()
                    .nth(idx)
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or(Value::Undefined));
            }
            get_property(value, &key.to_display_string())
        }
        _ => get_property(value, &key.to_display_string()),
    }
}

fn element_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n < usize::MAX as f64 => {
            Some(*n as usize)
        }
        Value::Str(s) => s.parse::<usize>().ok(),
        _ => None,
    }
}

fn array_member(receiver: &Value, items: &Rc<Vec<Value>>, name: &str) -> Value {
    let method: Option<super::value::NativeImpl> = match name {
        "map" => Some(array_map),
        "filter" => Some(array_filter),
        "reduce" => Some(array_reduce),
        "find" => Some(array_find),
        "includes" => Some(array_includes),
        "indexOf" => Some(array_index_of),
        "join" => Some(array_join),
        "slice" => Some(array_slice),
        "concat" => Some(array_concat),
        "length" => return Value::Number(items.len() as f64),
        _ => None,
    };
    match method {
        Some(func) => Value::bound_native(method_name(name), receiver.clone(), func),
        None => Value::Undefined,
    }
}

fn string_member(receiver: &Value, s: &Rc<String>, name: &str) -> Value {
    let method: Option<super::value::NativeImpl> = match name {
        "includes" => Some(string_includes),
        "indexOf" => Some(string_index_of),
        "startsWith" => Some(string_starts_with),
        "endsWith" => Some(string_ends_with),
        "slice" => Some(string_slice),
        "split" => Some(string_split),
        "toUpperCase" => Some(string_to_upper),
        "toLowerCase" => Some(string_to_lower),
        "trim" => Some(string_trim),
        "length" => return Value::Number(s.chars().count() as f64),
        _ => None,
    };
    match method {
        Some(func) => Value::bound_native(method_name(name), receiver.clone(), func),
        None => Value::Undefined,
    }
}

fn method_name(name: &str) -> &'static str {
    // Names come from a fixed table; map back to static strs for NativeFunction.
    match name {
        "map" => "map",
        "filter" => "filter",
        "reduce" => "reduce",
        "find" => "find",
        "includes" => "includes",
        "indexOf" => "indexOf",
        "join" => "join",
        "slice" => "slice",
        "concat" => "concat",
        "startsWith" => "startsWith",
        "endsWith" => "endsWith",
        "split" => "split",
        "toUpperCase" => "toUpperCase",
        "toLowerCase" => "toLowerCase",
        "trim" => "trim",
        _ => "method",
    }
}

// ----------------------------------------------------------------------
// Argument helpers
// ----------------------------------------------------------------------

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn arg_number(args: &[Value], index: usize) -> f64 {
    args.get(index)
        .map(Value::coerce_number)
        .unwrap_or(f64::NAN)
}

fn arg_callback<'a>(args: &'a [Value], index: usize) -> Result<&'a Value, ScriptError> {
    match args.get(index) {
        Some(value) if value.is_callable() => Ok(value),
        Some(value) => Err(ScriptError::Type(format!(
            "{} is not a function",
            value.to_display_string()
        ))),
        None => Err(ScriptError::Type("undefined is not a function".to_string())),
    }
}

fn receiver_array(this: &Value) -> Result<Rc<Vec<Value>>, ScriptError> {
    match this {
        Value::Array(items) => Ok(Rc::clone(items)),
        other => Err(ScriptError::Type(format!(
            "receiver {} is not an array",
            other.to_display_string()
        ))),
    }
}

fn receiver_string(this: &Value) -> Result<Rc<String>, ScriptError> {
    match this {
        Value::Str(s) => Ok(Rc::clone(s)),
        other => Err(ScriptError::Type(format!(
            "receiver {} is not a string",
            other.to_display_string()
        ))),
    }
}

/// Resolve a possibly-negative slice bound against a length.
fn slice_bound(raw: f64, len: usize, default: usize) -> usize {
    if raw.is_nan() {
        return default;
    }
    if raw < 0.0 {
        let offset = (-raw) as usize;
        len.saturating_sub(offset)
    } else {
        (raw as usize).min(len)
    }
}

// ----------------------------------------------------------------------
// Array methods
// ----------------------------------------------------------------------

fn array_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let callback = arg_callback(args, 0)?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        out.push(interp.call_value(callback, vec![item.clone(), Value::Number(i as f64)])?);
    }
    Ok(Value::array(out))
}

fn array_filter(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let callback = arg_callback(args, 0)?;
    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let keep = interp.call_value(callback, vec![item.clone(), Value::Number(i as f64)])?;
        if keep.is_truthy() {
            out.push(item.clone());
        }
    }
    Ok(Value::array(out))
}

fn array_reduce(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let callback = arg_callback(args, 0)?;
    let mut iter = items.iter().enumerate();
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match iter.next() {
            Some((_, first)) => first.clone(),
            None => {
                return Err(ScriptError::Type(
                    "Reduce of empty array with no initial value".to_string(),
                ));
            }
        },
    };
    for (i, item) in iter {
        acc = interp.call_value(
            callback,
            vec![acc, item.clone(), Value::Number(i as f64)],
        )?;
    }
    Ok(acc)
}

fn array_find(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let callback = arg_callback(args, 0)?;
    for (i, item) in items.iter().enumerate() {
        let hit = interp.call_value(callback, vec![item.clone(), Value::Number(i as f64)])?;
        if hit.is_truthy() {
            return Ok(item.clone());
        }
    }
    Ok(Value::Undefined)
}

fn array_includes(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let needle = arg(args, 0);
    Ok(Value::Bool(items.iter().any(|v| v.strict_equals(&needle))))
}

fn array_index_of(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let needle = arg(args, 0);
    let index = items
        .iter()
        .position(|v| v.strict_equals(&needle))
        .map(|i| i as f64)
        .unwrap_or(-1.0);
    Ok(Value::Number(index))
}

fn array_join(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let separator = match args.get(0) {
        Some(Value::Undefined) | None => ",".to_string(),
        Some(other) => other.to_display_string(),
    };
    let parts: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Undefined | Value::Null => String::new(),
            other => other.to_display_string(),
        })
        .collect();
    Ok(Value::string(parts.join(&separator)))
}

fn array_slice(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let len = items.len();
    let start = match args.get(0) {
        Some(Value::Undefined) | None => 0,
        _ => slice_bound(arg_number(args, 0), len, 0),
    };
    let end = match args.get(1) {
        Some(Value::Undefined) | None => len,
        _ => slice_bound(arg_number(args, 1), len, len),
    };
    if start >= end {
        return Ok(Value::array(Vec::new()));
    }
    Ok(Value::array(items[start..end].to_vec()))
}

fn array_concat(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let items = receiver_array(this)?;
    let mut out: Vec<Value> = items.as_ref().clone();
    for extra in args {
        match extra {
            Value::Array(more) => out.extend(more.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::array(out))
}

// ----------------------------------------------------------------------
// String methods
// ----------------------------------------------------------------------

fn string_includes(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    Ok(Value::Bool(s.contains(&arg(args, 0).to_display_string())))
}

fn string_index_of(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    let needle = arg(args, 0).to_display_string();
    let index = match s.find(&needle) {
        Some(byte_idx) => s[..byte_idx].chars().count() as f64,
        None => -1.0,
    };
    Ok(Value::Number(index))
}

fn string_starts_with(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    Ok(Value::Bool(
        s.starts_with(&arg(args, 0).to_display_string()),
    ))
}

fn string_ends_with(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    Ok(Value::Bool(s.ends_with(&arg(args, 0).to_display_string())))
}

fn string_slice(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let start = match args.get(0) {
        Some(Value::Undefined) | None => 0,
        _ => slice_bound(arg_number(args, 0), len, 0),
    };
    let end = match args.get(1) {
        Some(Value::Undefined) | None => len,
        _ => slice_bound(arg_number(args, 1), len, len),
    };
    if start >= end {
        return Ok(Value::string(""));
    }
    Ok(Value::string(chars[start..end].iter().collect::<String>()))
}

fn string_split(
    _interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    let parts = match args.get(0) {
        Some(Value::Undefined) | None => vec![s.as_ref().clone()],
        Some(separator) => {
            let sep = separator.to_display_string();
            if sep.is_empty() {
                s.chars().map(|c| c.to_string()).collect()
            } else {
                s.split(&sep).map(|p| p.to_string()).collect()
            }
        }
    };
    Ok(Value::array(parts.into_iter().map(Value::string).collect()))
}

fn string_to_upper(
    _interp: &mut Interpreter,
    this: &Value,
    _args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    Ok(Value::string(s.to_uppercase()))
}

fn string_to_lower(
    _interp: &mut Interpreter,
    this: &Value,
    _args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    Ok(Value::string(s.to_lowercase()))
}

fn string_trim(
    _interp: &mut Interpreter,
    this: &Value,
    _args: &[Value],
) -> Result<Value, ScriptError> {
    let s = receiver_string(this)?;
    Ok(Value::string(s.trim().to_string()))
}

// ----------------------------------------------------------------------
// Globals
// ----------------------------------------------------------------------

fn math_object() -> Value {
    let mut map = ObjectMap::new();
    map.insert("abs".to_string(), Value::native("abs", math_abs));
    map.insert("floor".to_string(), Value::native("floor", math_floor));
    map.insert("ceil".to_string(), Value::native("ceil", math_ceil));
    map.insert("round".to_string(), Value::native("round", math_round));
    map.insert("trunc".to_string(), Value::native("trunc", math_trunc));
    map.insert("sqrt".to_string(), Value::native("sqrt", math_sqrt));
    map.insert("min".to_string(), Value::native("min", math_min));
    map.insert("max".to_string(), Value::native("max", math_max));
    map.insert("pow".to_string(), Value::native("pow", math_pow));
    Value::object(map)
}

fn math_abs(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(arg_number(args, 0).abs()))
}

fn math_floor(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(arg_number(args, 0).floor()))
}

fn math_ceil(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(arg_number(args, 0).ceil()))
}

fn math_round(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    // Half-up rounding, so -0.5 rounds to 0.
    Ok(Value::Number((arg_number(args, 0) + 0.5).floor()))
}

fn math_trunc(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(arg_number(args, 0).trunc()))
}

fn math_sqrt(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(arg_number(args, 0).sqrt()))
}

fn math_min(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let mut best = f64::INFINITY;
    for value in args {
        let n = value.coerce_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        best = best.min(n);
    }
    Ok(Value::Number(best))
}

fn math_max(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let mut best = f64::NEG_INFINITY;
    for value in args {
        let n = value.coerce_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        best = best.max(n);
    }
    Ok(Value::Number(best))
}

fn math_pow(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(arg_number(args, 0).powf(arg_number(args, 1))))
}

fn json_object() -> Value {
    let mut map = ObjectMap::new();
    map.insert(
        "stringify".to_string(),
        Value::native("stringify", json_stringify),
    );
    map.insert("parse".to_string(), Value::native("parse", json_parse));
    Value::object(map)
}

fn json_stringify(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let value = match args.get(0) {
        None | Some(Value::Undefined) => return Ok(Value::Undefined),
        Some(value) => value.to_json(),
    };
    let pretty = matches!(args.get(2), Some(Value::Number(n)) if *n > 0.0);
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    rendered
        .map(Value::string)
        .map_err(|e| ScriptError::Type(format!("Converting value to JSON failed: {}", e)))
}

fn json_parse(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let text = match args.get(0) {
        Some(Value::Str(s)) => s.as_ref().clone(),
        Some(other) => other.to_display_string(),
        None => "undefined".to_string(),
    };
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|json| Value::from_json(&json))
        .map_err(|e| ScriptError::Syntax(format!("invalid JSON: {}", e)))
}

fn object_object() -> Value {
    let mut map = ObjectMap::new();
    map.insert("keys".to_string(), Value::native("keys", object_keys));
    map.insert("values".to_string(), Value::native("values", object_values));
    map.insert(
        "entries".to_string(),
        Value::native("entries", object_entries),
    );
    Value::object(map)
}

fn object_arg(args: &[Value]) -> Result<Value, ScriptError> {
    match args.get(0) {
        None | Some(Value::Undefined) | Some(Value::Null) => Err(ScriptError::Type(
            "Cannot convert undefined or null to object".to_string(),
        )),
        Some(value) => Ok(value.clone()),
    }
}

fn object_keys(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let keys = match object_arg(args)? {
        Value::Object(map) => map.keys().map(|k| Value::string(k.clone())).collect(),
        Value::Array(items) => (0..items.len())
            .map(|i| Value::string(i.to_string()))
            .collect(),
        _ => Vec::new(),
    };
    Ok(Value::array(keys))
}

fn object_values(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let values = match object_arg(args)? {
        Value::Object(map) => map.values().cloned().collect(),
        Value::Array(items) => items.as_ref().clone(),
        _ => Vec::new(),
    };
    Ok(Value::array(values))
}

fn object_entries(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let entries = match object_arg(args)? {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Value::array(vec![Value::string(k.clone()), v.clone()]))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| Value::array(vec![Value::string(i.to_string()), v.clone()]))
            .collect(),
        _ => Vec::new(),
    };
    Ok(Value::array(entries))
}

fn array_object() -> Value {
    let mut map = ObjectMap::new();
    map.insert(
        "isArray".to_string(),
        Value::native("isArray", array_is_array),
    );
    Value::object(map)
}

fn array_is_array(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Bool(matches!(args.get(0), Some(Value::Array(_)))))
}

fn global_number(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(match args.get(0) {
        None => 0.0,
        Some(value) => value.coerce_number(),
    }))
}

fn global_string(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::string(arg(args, 0).to_display_string()))
}

fn global_boolean(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Bool(arg(args, 0).is_truthy()))
}

fn global_parse_int(_i: &mut Interpreter, _t: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    let text = arg(args, 0).to_display_string();
    let trimmed = text.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let prefix: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    if prefix.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(
        sign * prefix.parse::<f64>().unwrap_or(f64::NAN),
    ))
}

fn global_parse_float(
    _i: &mut Interpreter,
    _t: &Value,
    args: &[Value],
) -> Result<Value, ScriptError> {
    let text = arg(args, 0).to_display_string();
    let trimmed = text.trim();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    trimmed[..end]
        .parse::<f64>()
        .map(Value::Number)
        .or(Ok(Value::Number(f64::NAN)))
}
