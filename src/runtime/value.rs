use std::{fmt, rc::Rc};

use crate::runtime::{gc::GcHandle, native::NativeFunction, procedure::Procedure};

/// Tag half of a [`Value`].
///
/// The constant pool keys entries on `(tag, payload)`, so two values with
/// bit-identical payloads but different tags are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTag {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Nat8,
    Nat16,
    Nat32,
    Nat64,
    Size,
    Real,
    String,
    Void,
    Object,
    Native,
    Procedure,
}

impl ValueTag {
    /// Returns the canonical label used in diagnostics.
    ///
    /// These labels are user-visible and are expected to remain stable.
    pub fn name(self) -> &'static str {
        match self {
            ValueTag::Boolean => "Bool",
            ValueTag::Int8 => "Int8",
            ValueTag::Int16 => "Int16",
            ValueTag::Int32 => "Int32",
            ValueTag::Int64 => "Int64",
            ValueTag::Nat8 => "Nat8",
            ValueTag::Nat16 => "Nat16",
            ValueTag::Nat32 => "Nat32",
            ValueTag::Nat64 => "Nat64",
            ValueTag::Size => "Size",
            ValueTag::Real => "Real",
            ValueTag::String => "String",
            ValueTag::Void => "Void",
            ValueTag::Object => "Object",
            ValueTag::Native => "Native",
            ValueTag::Procedure => "Procedure",
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime value held in registers, constant pools and instance fields.
///
/// Scalars are unboxed. Strings share their buffer through `Rc<str>`, and
/// heap instances are referenced through a [`GcHandle`] owned by the heap.
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Nat8(u8),
    Nat16(u16),
    Nat32(u32),
    Nat64(u64),
    /// Pointer-sized natural.
    Size(usize),
    Real(f64),
    String(Rc<str>),
    /// Absence of value.
    Void,
    /// Handle to a class instance on the GC heap.
    Object(GcHandle),
    /// Host-provided callback.
    Native(NativeFunction),
    /// Interpreted or native procedure descriptor.
    Procedure(Rc<Procedure>),
}

impl Value {
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Boolean(_) => ValueTag::Boolean,
            Value::Int8(_) => ValueTag::Int8,
            Value::Int16(_) => ValueTag::Int16,
            Value::Int32(_) => ValueTag::Int32,
            Value::Int64(_) => ValueTag::Int64,
            Value::Nat8(_) => ValueTag::Nat8,
            Value::Nat16(_) => ValueTag::Nat16,
            Value::Nat32(_) => ValueTag::Nat32,
            Value::Nat64(_) => ValueTag::Nat64,
            Value::Size(_) => ValueTag::Size,
            Value::Real(_) => ValueTag::Real,
            Value::String(_) => ValueTag::String,
            Value::Void => ValueTag::Void,
            Value::Object(_) => ValueTag::Object,
            Value::Native(_) => ValueTag::Native,
            Value::Procedure(_) => ValueTag::Procedure,
        }
    }

    /// Returns the canonical runtime type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    /// Only `Boolean(false)` and `Void` are falsy; all other values are truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Void)
    }

    /// Constant-pool identity: same tag and bit-identical payload.
    ///
    /// Differs from `==` for reals (`NaN` is identical to itself, `0.0` is
    /// not identical to `-0.0`) and compares descriptors by address.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<GcHandle> {
        match self {
            Value::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Converts a value to display text without quoting strings.
    pub fn to_string_value(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Nat8(a), Value::Nat8(b)) => a == b,
            (Value::Nat16(a), Value::Nat16(b)) => a == b,
            (Value::Nat32(a), Value::Nat32(b)) => a == b,
            (Value::Nat64(a), Value::Nat64(b)) => a == b,
            (Value::Size(a), Value::Size(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Void, Value::Void) => true,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}i8", v),
            Value::Int16(v) => write!(f, "{}i16", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}i64", v),
            Value::Nat8(v) => write!(f, "{}n8", v),
            Value::Nat16(v) => write!(f, "{}n16", v),
            Value::Nat32(v) => write!(f, "{}n32", v),
            Value::Nat64(v) => write!(f, "{}n64", v),
            Value::Size(v) => write!(f, "{}z", v),
            Value::Real(v) => write!(f, "{:?}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Void => write!(f, "void"),
            Value::Object(handle) => write!(f, "<object #{}>", handle.index()),
            Value::Native(native) => write!(f, "<native {}>", native.name()),
            Value::Procedure(procedure) => write!(f, "<procedure {}>", procedure.name()),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Boolean,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Nat8,
    u16 => Nat16,
    u32 => Nat32,
    u64 => Nat64,
    usize => Size,
    f64 => Real,
    Rc<str> => String,
    GcHandle => Object,
    NativeFunction => Native,
    Rc<Procedure> => Procedure,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Void
    }
}
