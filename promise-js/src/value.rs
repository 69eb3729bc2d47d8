use crate::error::TypeError;
use crate::promise::Promise;
use ahash::AHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The outcome of calling a [`Function`]. `Err` carries the thrown value.
pub type Completion = Result<Value, Value>;

/// A value that can flow through promises: fulfillment values, rejection reasons, handler
/// arguments and return values.
///
/// Primitive variants compare by value. Reference variants (lists, objects, functions, errors,
/// promises) compare by identity, see [`Value::same_value`].
#[derive(Clone, Debug, Default)]
pub enum Value {
  #[default]
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(Rc<str>),
  /// An immutable array.
  List(Rc<[Value]>),
  Object(Object),
  Function(Function),
  Error(Rc<ErrorObject>),
  Promise(Promise),
}

impl Value {
  /// Creates a new plain `Error` object value.
  pub fn error(message: impl Into<String>) -> Self {
    Value::Error(Rc::new(ErrorObject {
      kind: ErrorKind::Error,
      message: message.into(),
    }))
  }

  /// Creates an empty list value.
  pub fn empty_list() -> Self {
    Value::List(Rc::from(Vec::new()))
  }

  /// `SameValue(x, y)`.
  ///
  /// `NaN` is the same as `NaN`, `+0` and `-0` are distinct, and reference values are the same
  /// only if they are the same allocation.
  pub fn same_value(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Undefined, Value::Undefined) => true,
      (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Number(a), Value::Number(b)) => {
        if a.is_nan() && b.is_nan() {
          return true;
        }
        if *a == 0.0 && *b == 0.0 {
          return a.is_sign_negative() == b.is_sign_negative();
        }
        a == b
      }
      (Value::String(a), Value::String(b)) => a == b,
      (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
      (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
      (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
      (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
      (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
      _ => false,
    }
  }

  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Undefined => "undefined",
      Value::Null => "null",
      Value::Bool(_) => "boolean",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::List(_) => "array",
      Value::Object(_) => "object",
      Value::Function(_) => "function",
      Value::Error(_) => "error",
      Value::Promise(_) => "promise",
    }
  }

  /// Calls this value with `this` and `args`, throwing a `TypeError` if it is not callable.
  pub fn call(&self, this: &Value, args: &[Value]) -> Completion {
    match self {
      Value::Function(f) => f.call(this, args),
      other => Err(
        TypeError::NotCallable {
          type_name: other.type_name(),
        }
        .into(),
      ),
    }
  }

  pub fn is_undefined(&self) -> bool {
    matches!(self, Value::Undefined)
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Value::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Value::List(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_object(&self) -> Option<&Object> {
    match self {
      Value::Object(obj) => Some(obj),
      _ => None,
    }
  }

  pub fn as_function(&self) -> Option<&Function> {
    match self {
      Value::Function(f) => Some(f),
      _ => None,
    }
  }

  pub fn as_error(&self) -> Option<&ErrorObject> {
    match self {
      Value::Error(err) => Some(err),
      _ => None,
    }
  }

  pub fn as_promise(&self) -> Option<&Promise> {
    match self {
      Value::Promise(p) => Some(p),
      _ => None,
    }
  }
}

/// Equality is [`Value::same_value`].
impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    self.same_value(other)
  }
}

impl From<()> for Value {
  fn from(_: ()) -> Self {
    Value::Undefined
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Number(value)
  }
}

impl From<i32> for Value {
  fn from(value: i32) -> Self {
    Value::Number(value as f64)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::String(Rc::from(value))
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::String(Rc::from(value))
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::List(Rc::from(items))
  }
}

impl From<Object> for Value {
  fn from(value: Object) -> Self {
    Value::Object(value)
  }
}

impl From<Function> for Value {
  fn from(value: Function) -> Self {
    Value::Function(value)
  }
}

impl From<Promise> for Value {
  fn from(value: Promise) -> Self {
    Value::Promise(value)
  }
}

impl From<TypeError> for Value {
  fn from(err: TypeError) -> Self {
    Value::Error(Rc::new(ErrorObject {
      kind: ErrorKind::Type(err),
      message: err.to_string(),
    }))
  }
}

/// The constructor an [`ErrorObject`] was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Error,
  Type(TypeError),
}

/// An error object used as a thrown value or rejection reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorObject {
  kind: ErrorKind,
  message: String,
}

impl ErrorObject {
  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn is_type_error(&self) -> bool {
    matches!(self.kind, ErrorKind::Type(_))
  }
}

impl fmt::Display for ErrorObject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind {
      ErrorKind::Error => write!(f, "Error: {}", self.message),
      ErrorKind::Type(_) => write!(f, "TypeError: {}", self.message),
    }
  }
}

/// An object property.
#[derive(Clone, Debug)]
pub enum Property {
  Data(Value),
  /// An accessor property. The getter is called with the object as its receiver and may throw.
  Getter(Function),
}

/// A mutable bag of named properties.
///
/// Objects whose `then` property is a function are thenables.
#[derive(Clone, Default)]
pub struct Object {
  properties: Rc<RefCell<AHashMap<Rc<str>, Property>>>,
}

impl Object {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets a data property, replacing any existing property with the same key.
  pub fn set(&self, key: &str, value: impl Into<Value>) {
    self
      .properties
      .borrow_mut()
      .insert(Rc::from(key), Property::Data(value.into()));
  }

  /// Defines an accessor property backed by `getter`.
  pub fn define_getter(&self, key: &str, getter: Function) {
    self
      .properties
      .borrow_mut()
      .insert(Rc::from(key), Property::Getter(getter));
  }

  pub fn has(&self, key: &str) -> bool {
    self.properties.borrow().contains_key(key)
  }

  /// `[[Get]]`: returns `undefined` for missing properties and propagates getter throws.
  pub fn get(&self, key: &str) -> Completion {
    // The getter may mutate this object, so release the borrow before calling it.
    let property = self.properties.borrow().get(key).cloned();
    match property {
      None => Ok(Value::Undefined),
      Some(Property::Data(value)) => Ok(value),
      Some(Property::Getter(getter)) => getter.call(&Value::Object(self.clone()), &[]),
    }
  }

  pub fn ptr_eq(&self, other: &Object) -> bool {
    Rc::ptr_eq(&self.properties, &other.properties)
  }
}

impl fmt::Debug for Object {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("Object");
    match self.properties.try_borrow() {
      Ok(properties) => {
        let mut keys: Vec<&str> = properties.keys().map(|k| &**k).collect();
        keys.sort_unstable();
        s.field("keys", &keys);
      }
      Err(_) => {
        s.field("keys", &"<borrowed>");
      }
    }
    s.finish()
  }
}

type NativeFn = dyn Fn(&Value, &[Value]) -> Completion;

/// A callable value backed by a Rust closure.
///
/// The closure receives the receiver (`this`) and the arguments explicitly; there is no ambient
/// context.
#[derive(Clone)]
pub struct Function {
  name: Option<Rc<str>>,
  call: Rc<NativeFn>,
}

impl Function {
  pub fn new(f: impl Fn(&Value, &[Value]) -> Completion + 'static) -> Self {
    Self {
      name: None,
      call: Rc::new(f),
    }
  }

  pub fn named(name: &str, f: impl Fn(&Value, &[Value]) -> Completion + 'static) -> Self {
    Self {
      name: Some(Rc::from(name)),
      call: Rc::new(f),
    }
  }

  /// Wraps a closure that only looks at its first argument (`undefined` when absent).
  pub fn unary(f: impl Fn(Value) -> Completion + 'static) -> Self {
    Self::new(move |_this, args| f(args.first().cloned().unwrap_or_default()))
  }

  pub fn name(&self) -> &str {
    self.name.as_deref().unwrap_or("")
  }

  pub fn call(&self, this: &Value, args: &[Value]) -> Completion {
    (self.call)(this, args)
  }

  pub fn ptr_eq(&self, other: &Function) -> bool {
    Rc::ptr_eq(&self.call, &other.call)
  }
}

impl fmt::Debug for Function {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Function").field("name", &self.name()).finish()
  }
}
