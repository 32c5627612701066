use std::rc::Rc;

use crate::{
    bytecode::OpCode,
    runtime::{
        error::{Result, RuntimeError},
        value::Value,
    },
};

use super::Vm;

/// Checked integer arithmetic for one value variant. Overflow and a zero
/// divisor are argument-value faults.
macro_rules! checked_integer {
    ($variant:ident, $op:expr, $l:expr, $r:expr) => {{
        let (l, r) = ($l, $r);
        if r == 0 && matches!($op, OpCode::Div | OpCode::Rem) {
            return Err(RuntimeError::ArgumentValue("division by zero".to_string()));
        }
        let result = match $op {
            OpCode::Add => l.checked_add(r),
            OpCode::Sub => l.checked_sub(r),
            OpCode::Mul => l.checked_mul(r),
            OpCode::Div => l.checked_div(r),
            OpCode::Rem => l.checked_rem(r),
            _ => return Err(unknown_operator($op)),
        };
        result.map(Value::$variant).ok_or_else(|| {
            RuntimeError::ArgumentValue(format!(
                "{} overflow in {} {} {}",
                stringify!($variant),
                l,
                $op,
                r
            ))
        })
    }};
}

impl Vm<'_> {
    pub(super) fn execute_binary_operation(
        &mut self,
        op: OpCode,
        left: Value,
        right: Value,
    ) -> Result<Value> {
        match (&left, &right) {
            (Value::Int8(l), Value::Int8(r)) => checked_integer!(Int8, op, *l, *r),
            (Value::Int16(l), Value::Int16(r)) => checked_integer!(Int16, op, *l, *r),
            (Value::Int32(l), Value::Int32(r)) => checked_integer!(Int32, op, *l, *r),
            (Value::Int64(l), Value::Int64(r)) => checked_integer!(Int64, op, *l, *r),
            (Value::Nat8(l), Value::Nat8(r)) => checked_integer!(Nat8, op, *l, *r),
            (Value::Nat16(l), Value::Nat16(r)) => checked_integer!(Nat16, op, *l, *r),
            (Value::Nat32(l), Value::Nat32(r)) => checked_integer!(Nat32, op, *l, *r),
            (Value::Nat64(l), Value::Nat64(r)) => checked_integer!(Nat64, op, *l, *r),
            (Value::Size(l), Value::Size(r)) => checked_integer!(Size, op, *l, *r),
            (Value::Real(l), Value::Real(r)) => {
                let result = match op {
                    OpCode::Add => l + r,
                    OpCode::Sub => l - r,
                    OpCode::Mul => l * r,
                    OpCode::Div => l / r,
                    OpCode::Rem => l % r,
                    _ => return Err(unknown_operator(op)),
                };
                Ok(Value::Real(result))
            }
            (Value::String(l), Value::String(r)) if op == OpCode::Add => {
                let mut joined = String::with_capacity(l.len() + r.len());
                joined.push_str(l);
                joined.push_str(r);
                Ok(Value::String(Rc::from(joined)))
            }
            _ if left.tag() != right.tag() => Err(RuntimeError::ArgumentType {
                expected: left.type_name(),
                found: right.type_name(),
            }),
            _ => Err(RuntimeError::type_mismatch("number", &left)),
        }
    }

    pub(super) fn execute_negation(&mut self, value: Value) -> Result<Value> {
        let overflow = || RuntimeError::ArgumentValue(format!("overflow negating {}", value));
        match &value {
            Value::Int8(v) => v.checked_neg().map(Value::Int8).ok_or_else(overflow),
            Value::Int16(v) => v.checked_neg().map(Value::Int16).ok_or_else(overflow),
            Value::Int32(v) => v.checked_neg().map(Value::Int32).ok_or_else(overflow),
            Value::Int64(v) => v.checked_neg().map(Value::Int64).ok_or_else(overflow),
            Value::Real(v) => Ok(Value::Real(-v)),
            other => Err(RuntimeError::type_mismatch("signed number", other)),
        }
    }
}

#[cold]
fn unknown_operator(op: OpCode) -> RuntimeError {
    RuntimeError::OperationInvalid(format!("{} is not an arithmetic operator", op))
}
