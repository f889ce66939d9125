//! Runtime values of the script language.
//!
//! Values follow JavaScript semantics closely enough that strategies written
//! for a browser behave the same here: numbers are `f64`, arrays and objects
//! are shared by reference, and the usual truthiness and coercion rules apply.
//!
//! Nothing here recurses without a bound. Converting a value to a string
//! stops at a byte and visit limit, and dropping a deeply nested value
//! releases its containers from an explicit work list.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use serde::Serialize;

use crate::ast::FunctionDef;
use crate::builtins::Builtin;
use crate::error::{ScriptError, ScriptResult};

/// Shared, mutable array storage.
pub type ArrayRef = Rc<RefCell<Items>>;

/// Shared, mutable object storage. Keys are kept sorted so iteration and
/// serialisation are deterministic.
pub type ObjectRef = Rc<RefCell<Fields>>;

/// Nesting depth at which array rendering stops descending.
const RENDER_DEPTH: usize = 8;

/// Most bytes [`fmt::Display`] renders for one value.
pub const DISPLAY_LIMIT: usize = 4096;

/// Most values [`Value::to_json`] visits before emitting `null` for the rest.
const JSON_NODE_LIMIT: usize = 100_000;

// ============================================================================
// Containers
// ============================================================================

/// The elements of an array.
#[derive(Default)]
pub struct Items(pub(crate) Vec<Value>);

/// The properties of an object.
#[derive(Default)]
pub struct Fields(pub(crate) BTreeMap<String, Value>);

impl Deref for Items {
    type Target = Vec<Value>;

    fn deref(&self) -> &Vec<Value> {
        &self.0
    }
}

impl DerefMut for Items {
    fn deref_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }
}

impl Deref for Fields {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

impl DerefMut for Fields {
    fn deref_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.0
    }
}

// Containers may reference themselves, so Debug never descends.
impl fmt::Debug for Items {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Items(len = {})", self.0.len())
    }
}

impl fmt::Debug for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fields(len = {})", self.0.len())
    }
}

impl Drop for Items {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.0));
    }
}

impl Drop for Fields {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.0).into_values().collect());
    }
}

/// Drops `pending` without recursing: containers whose last reference is
/// in the list are emptied into it before they are freed.
pub(crate) fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => {
                if let Ok(cell) = Rc::try_unwrap(items) {
                    let mut items = cell.into_inner();
                    pending.append(&mut items.0);
                }
            }
            Value::Object(fields) => {
                if let Ok(cell) = Rc::try_unwrap(fields) {
                    let mut fields = cell.into_inner();
                    pending.extend(std::mem::take(&mut fields.0).into_values());
                }
            }
            _ => {}
        }
    }
}

/// A rendering reached its limit and was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimit;

/// Output buffer for [`Value::render_into`]. Every value visited and every
/// byte written counts against the same limit.
struct Sink<'a> {
    out: &'a mut String,
    limit: usize,
    visits: usize,
}

impl Sink<'_> {
    fn visit(&mut self) -> Result<(), RenderLimit> {
        self.visits += 1;
        if self.visits > self.limit {
            return Err(RenderLimit);
        }
        Ok(())
    }

    fn push(&mut self, s: &str) -> Result<(), RenderLimit> {
        let room = self.limit.saturating_sub(self.out.len());
        if s.len() <= room {
            self.out.push_str(s);
            return Ok(());
        }
        let mut end = room;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.out.push_str(&s[..end]);
        Err(RenderLimit)
    }
}

// ============================================================================
// Value
// ============================================================================

/// A script value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Every number is a double.
    Number(f64),
    /// Immutable string.
    Str(Rc<str>),
    /// Array, shared by reference.
    Array(ArrayRef),
    /// Plain object, shared by reference.
    Object(ObjectRef),
    /// A function declared by the script.
    Function(Rc<FunctionDef>),
    /// A host helper such as `Math.sqrt`.
    Native(Builtin),
}

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn string(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    /// Creates an empty object.
    #[must_use]
    pub fn object() -> Self {
        Self::object_from(BTreeMap::new())
    }

    /// Creates an object with the given properties.
    #[must_use]
    pub fn object_from(fields: BTreeMap<String, Value>) -> Self {
        Self::Object(Rc::new(RefCell::new(Fields(fields))))
    }

    /// Creates an array from the given items.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(Items(items))))
    }

    /// JavaScript truthiness.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) | Self::Native(_) => true,
        }
    }

    /// Result of the `typeof` operator.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Function(_) | Self::Native(_) => "function",
        }
    }

    /// Numeric coercion (`+value`).
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Function(_) | Self::Native(_) | Self::Object(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Str(s) => parse_numeric_string(s),
            Self::Array(items) => {
                // `[[x]]` converts like `x`; below the render depth it is "".
                let mut current = Rc::clone(items);
                for _ in 0..RENDER_DEPTH {
                    let next = match current.borrow().as_slice() {
                        [] => return 0.0,
                        [Self::Array(inner)] => Rc::clone(inner),
                        [single] => return single.to_number(),
                        _ => return f64::NAN,
                    };
                    current = next;
                }
                0.0
            }
        }
    }

    /// Returns the number if this value is one, without coercion.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string if this value is one, without coercion.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Reads a property of an object value. Anything else yields `None`.
    #[must_use]
    pub fn get_field(&self, key: &str) -> Option<Value> {
        match self {
            Self::Object(map) => map.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// `===`
    #[must_use]
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => a == b,
            _ => false,
        }
    }

    /// `==`, with the primitive coercions strategies actually rely on.
    #[must_use]
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined | Self::Null, Self::Undefined | Self::Null) => true,
            (Self::Undefined | Self::Null, _) | (_, Self::Undefined | Self::Null) => false,
            (Self::Number(_), Self::Str(_) | Self::Bool(_))
            | (Self::Str(_) | Self::Bool(_), Self::Number(_))
            | (Self::Bool(_), Self::Str(_))
            | (Self::Str(_), Self::Bool(_)) => {
                #[allow(clippy::float_cmp)]
                let equal = self.to_number() == other.to_number();
                equal
            }
            _ => self.strict_equals(other),
        }
    }

    /// Converts a host value into a script value by way of its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Marshal`] if serialisation fails.
    pub fn from_serialize<T: Serialize>(value: &T) -> ScriptResult<Self> {
        let json = serde_json::to_value(value).map_err(|e| ScriptError::Marshal(e.to_string()))?;
        Ok(Self::from_json(&json))
    }

    /// Deep-copies a JSON document into script values.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::string(s),
            serde_json::Value::Array(items) => Self::array(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::object_from(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Deep-copies this value into JSON. Functions and non-finite numbers
    /// become `null`. Self-referencing structures are cut off after 32 levels,
    /// and everything past the first 100 000 values visited is `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut budget = JSON_NODE_LIMIT;
        self.to_json_bounded(32, &mut budget)
    }

    fn to_json_bounded(&self, depth: usize, budget: &mut usize) -> serde_json::Value {
        if depth == 0 || *budget == 0 {
            return serde_json::Value::Null;
        }
        *budget -= 1;
        match self {
            Self::Undefined | Self::Null | Self::Function(_) | Self::Native(_) => {
                serde_json::Value::Null
            }
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) => serde_json::Value::String(s.to_string()),
            Self::Array(items) => serde_json::Value::Array(
                items
                    .borrow()
                    .iter()
                    .map(|v| v.to_json_bounded(depth - 1, budget))
                    .collect(),
            ),
            Self::Object(map) => serde_json::Value::Object(
                map.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_bounded(depth - 1, budget)))
                    .collect(),
            ),
        }
    }

    /// Appends `String(value)` to `out`.
    ///
    /// Rendering stops once `out` would grow past `limit` bytes or once
    /// `limit` values have been visited, so the work done is proportional to
    /// `limit` however the value is shaped. Returns the number of values
    /// visited.
    ///
    /// # Errors
    ///
    /// [`RenderLimit`] if the limit was reached. `out` then holds as much of
    /// the rendering as fit.
    pub fn render_into(&self, out: &mut String, limit: usize) -> Result<usize, RenderLimit> {
        let mut sink = Sink {
            out,
            limit,
            visits: 0,
        };
        self.render(&mut sink, RENDER_DEPTH)?;
        Ok(sink.visits)
    }

    fn render(&self, sink: &mut Sink<'_>, depth: usize) -> Result<(), RenderLimit> {
        sink.visit()?;
        match self {
            Self::Undefined => sink.push("undefined"),
            Self::Null => sink.push("null"),
            Self::Bool(b) => sink.push(if *b { "true" } else { "false" }),
            Self::Number(n) => sink.push(&format_number(*n)),
            Self::Str(s) => sink.push(s),
            Self::Array(items) => {
                if depth == 0 {
                    return Ok(());
                }
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        sink.push(",")?;
                    }
                    if !matches!(item, Self::Undefined | Self::Null) {
                        item.render(sink, depth - 1)?;
                    }
                }
                Ok(())
            }
            Self::Object(_) => sink.push("[object Object]"),
            Self::Function(def) => {
                sink.push("function ")?;
                sink.push(&def.name)?;
                sink.push("()")
            }
            Self::Native(builtin) => {
                sink.push("function ")?;
                sink.push(builtin.name())?;
                sink.push("()")
            }
        }
    }
}

/// Renders at most [`DISPLAY_LIMIT`] bytes.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        // A cut-off rendering is still displayed.
        let _ = self.render_into(&mut out, DISPLAY_LIMIT);
        f.write_str(&out)
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

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

/// Formats a number the way JavaScript's `String(n)` does for the common
/// cases: integers without a fractional part, `NaN`, and `Infinity`.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

fn parse_numeric_string(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}
