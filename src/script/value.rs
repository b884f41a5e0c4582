//! Script runtime values
//!
//! Values mirror the JSON data model plus functions. Arrays and objects are
//! reference-counted and structurally immutable; the only mutable state in a
//! script is its variable scopes. Conversion to and from `serde_json::Value`
//! happens at the sandbox boundary, so scripts can never alias engine data.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ast::ArrowBody;
use super::error::ScriptError;
use super::interpreter::Interpreter;

pub type ObjectMap = IndexMap<String, Value>;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<String>),
    Array(Rc<Vec<Value>>),
    Object(Rc<ObjectMap>),
    Closure(Rc<Closure>),
    Native(Rc<NativeFunction>),
}

/// A user-defined arrow function plus its captured environment.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Rc<ArrowBody>,
    pub env: ScopeRef,
}

/// Implementation signature for built-in functions. `this` is the receiver
/// for methods (`Value::Undefined` for free functions).
pub type NativeImpl = fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, ScriptError>;

pub struct NativeFunction {
    pub name: &'static str,
    pub this: Value,
    pub func: NativeImpl,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(items))
    }

    pub fn object(map: ObjectMap) -> Value {
        Value::Object(Rc::new(map))
    }

    pub fn native(name: &'static str, func: NativeImpl) -> Value {
        Value::Native(Rc::new(NativeFunction {
            name,
            this: Value::Undefined,
            func,
        }))
    }

    pub fn bound_native(name: &'static str, this: Value, func: NativeImpl) -> Value {
        Value::Native(Rc::new(NativeFunction { name, this, func }))
    }

    /// `typeof` result.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) | Value::Object(_) => "object",
            Value::Closure(_) | Value::Native(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Closure(_) | Value::Native(_) => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Native(_))
    }

    /// Numeric coercion (`+value`, arithmetic on mixed operands).
    pub fn coerce_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => match items.len() {
                0 => 0.0,
                1 => items[0].coerce_number(),
                _ => f64::NAN,
            },
            Value::Object(_) | Value::Closure(_) | Value::Native(_) => f64::NAN,
        }
    }

    /// String coercion (`String(value)`, `+` concatenation, template mixing).
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.as_ref().clone(),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| match v {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.to_display_string(),
                    })
                    .collect();
                parts.join(",")
            }
            Value::Object(_) => "[object Object]".to_string(),
            Value::Closure(_) => "[function]".to_string(),
            Value::Native(f) => format!("[function {}]", f.name),
        }
    }

    /// Strict (`===`) equality.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose (`==`) equality: `null == undefined`, number/string and boolean
    /// coercion; reference equality for compound values.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Number(_), Value::Str(_))
            | (Value::Str(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                let a = self.coerce_number();
                let b = other.coerce_number();
                a == b
            }
            _ => self.strict_equals(other),
        }
    }

    /// Convert engine JSON into a script value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s.clone()),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut object = ObjectMap::new();
                for (key, value) in map {
                    object.insert(key.clone(), Value::from_json(value));
                }
                Value::object(object)
            }
        }
    }

    /// Convert a script value back into engine JSON. `undefined`, functions,
    /// and non-finite numbers become `null`, mirroring JSON serialization.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Closure(_) | Value::Native(_) => {
                serde_json::Value::Null
            }
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Str(s) => serde_json::Value::String(s.as_ref().clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => {
                let mut object = serde_json::Map::new();
                for (key, value) in map.iter() {
                    object.insert(key.clone(), value.to_json());
                }
                serde_json::Value::Object(object)
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            other => write!(f, "{}", other.to_display_string()),
        }
    }
}

/// Format a number the way scripts render them: whole values without a
/// fractional part, `NaN`/`Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
        serde_json::Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

// ----------------------------------------------------------------------
// Scopes
// ----------------------------------------------------------------------

pub type ScopeRef = Rc<RefCell<Scope>>;

struct Binding {
    value: Value,
    mutable: bool,
}

/// A lexical scope frame. Closures hold a reference to their defining scope,
/// forming a parent chain.
pub struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
        }))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    pub fn declare(&mut self, name: &str, value: Value, mutable: bool) {
        self.vars
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// Look a name up through the scope chain.
    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Rc::clone(scope);
        loop {
            if let Some(binding) = current.borrow().vars.get(name) {
                return Some(binding.value.clone());
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return None,
            }
        }
    }

    /// Assign to an existing binding. Errors on unknown names (strict-mode
    /// behavior) and on `const` bindings.
    pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> Result<(), ScriptError> {
        let mut current = Rc::clone(scope);
        loop {
            {
                let mut frame = current.borrow_mut();
                if let Some(binding) = frame.vars.get_mut(name) {
                    if !binding.mutable {
                        return Err(ScriptError::Type(
                            "Assignment to constant variable.".to_string(),
                        ));
                    }
                    binding.value = value;
                    return Ok(());
                }
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return Err(ScriptError::UndefinedIdentifier(name.to_string())),
            }
        }
    }
}
