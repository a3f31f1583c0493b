// src/marshal.rs
//
// Host values → native arguments.
//
// All arguments of a call are checked before the engine is called, so a
// rejected call never partially mutates native state. Positions are 1-based
// to match Lua's own error messages.

use std::ffi::{CString, c_int, c_short, c_uint};
use std::rc::Rc;

use mlua::{Function, MultiValue, Value};

use crate::error::BindingError;
use crate::handle::{Capsule, Handle, NativeObject, Ownership};

/// Arguments of one binding call.
pub struct Args {
    function: &'static str,
    values: MultiValue,
}

impl Args {
    pub fn new(function: &'static str, values: MultiValue) -> Self {
        Self { function, values }
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    fn get(&self, index: usize) -> Option<&Value> {
        index.checked_sub(1).and_then(|i| self.values.get(i))
    }

    fn type_error(&self, index: usize, expected: impl Into<String>) -> BindingError {
        BindingError::ArgumentType {
            function: self.function,
            index,
            expected: expected.into(),
            found: describe(self.get(index)),
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Scalars
    // ───────────────────────────────────────────────────────────────────────

    /// Lua integer, or a float with an exact integer value.
    pub fn integer(&self, index: usize) -> Result<i64, BindingError> {
        match self.get(index) {
            Some(Value::Integer(i)) => Ok(*i),
            Some(Value::Number(n)) if is_integral(*n) => Ok(*n as i64),
            _ => Err(self.type_error(index, "integer")),
        }
    }

    /// Narrowed to the native width with wrapping conversion.
    pub fn int(&self, index: usize) -> Result<c_int, BindingError> {
        Ok(self.integer(index)? as c_int)
    }

    pub fn short(&self, index: usize) -> Result<c_short, BindingError> {
        Ok(self.integer(index)? as c_short)
    }

    pub fn uint(&self, index: usize) -> Result<c_uint, BindingError> {
        Ok(self.integer(index)? as c_uint)
    }

    pub fn number(&self, index: usize) -> Result<f64, BindingError> {
        match self.get(index) {
            Some(Value::Number(n)) => Ok(*n),
            Some(Value::Integer(i)) => Ok(*i as f64),
            _ => Err(self.type_error(index, "number")),
        }
    }

    /// Only `true` and `false`; other values are not coerced.
    pub fn boolean(&self, index: usize) -> Result<bool, BindingError> {
        match self.get(index) {
            Some(Value::Boolean(b)) => Ok(*b),
            _ => Err(self.type_error(index, "boolean")),
        }
    }

    /// Lua string as a C string. Embedded NULs are rejected.
    pub fn string(&self, index: usize) -> Result<CString, BindingError> {
        match self.get(index) {
            Some(Value::String(s)) => CString::new(s.as_bytes().to_vec())
                .map_err(|_| self.type_error(index, "string without embedded zeros")),
            _ => Err(self.type_error(index, "string")),
        }
    }

    pub fn function_arg(&self, index: usize) -> Result<Function, BindingError> {
        match self.get(index) {
            Some(Value::Function(f)) => Ok(f.clone()),
            _ => Err(self.type_error(index, "function")),
        }
    }

    /// Any value; missing trailing arguments are nil.
    pub fn value(&self, index: usize) -> Value {
        self.get(index).cloned().unwrap_or(Value::Nil)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Handles
    // ───────────────────────────────────────────────────────────────────────

    /// A live handle of kind `T`.
    pub fn capsule<T: NativeObject>(&self, index: usize) -> Result<Rc<Capsule>, BindingError> {
        let expected = || format!("{} handle", T::KIND);
        let Some(Value::UserData(ud)) = self.get(index) else {
            return Err(self.type_error(index, expected()));
        };
        let Ok(handle) = ud.borrow::<Handle>() else {
            return Err(self.type_error(index, expected()));
        };

        let capsule = handle.capsule();
        if capsule.kind() != T::KIND {
            return Err(self.type_error(index, expected()));
        }
        self.still_live::<T>(index, capsule)?;
        Ok(Rc::clone(capsule))
    }

    /// Check again a handle taken by [`Args::capsule`], once host code
    /// (queued callbacks) has had a chance to delete it.
    pub fn still_live<T: NativeObject>(
        &self,
        index: usize,
        capsule: &Capsule,
    ) -> Result<*mut T, BindingError> {
        if !capsule.is_live() {
            return Err(BindingError::UseAfterFree {
                function: self.function,
                index,
                kind: capsule.kind(),
                state: capsule.state(),
            });
        }
        Ok(capsule.as_ptr())
    }

    /// Native pointer of a live handle of kind `T`.
    pub fn handle<T: NativeObject>(&self, index: usize) -> Result<*mut T, BindingError> {
        Ok(self.capsule::<T>(index)?.as_ptr())
    }

    /// A live handle the binding is responsible for freeing.
    pub fn owned<T: NativeObject>(&self, index: usize) -> Result<Rc<Capsule>, BindingError> {
        let capsule = self.capsule::<T>(index)?;
        if capsule.ownership() != Ownership::Owned {
            return Err(self.type_error(index, format!("owned {} handle", T::KIND)));
        }
        Ok(capsule)
    }
}

fn is_integral(n: f64) -> bool {
    // 2^63 is the first float past i64::MAX
    n.fract() == 0.0 && n >= i64::MIN as f64 && n < 9_223_372_036_854_775_808.0
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "no value".to_string(),
        Some(Value::UserData(ud)) => match ud.borrow::<Handle>() {
            Ok(handle) => format!("{} handle", handle.capsule().kind()),
            Err(_) => "userdata".to_string(),
        },
        Some(value) => value.type_name().to_string(),
    }
}
