use std::cmp::Ordering;

use crate::{
    bytecode::OpCode,
    runtime::{
        error::{Result, RuntimeError},
        value::Value,
    },
};

use super::Vm;

macro_rules! same_variant_cmp {
    ($left:expr, $right:expr; $($variant:ident),*) => {
        match ($left, $right) {
            $((Value::$variant(l), Value::$variant(r)) => Some(l.partial_cmp(r)),)*
            _ => None,
        }
    };
}

impl Vm<'_> {
    /// Equality holds across any pair of values (different tags are never
    /// equal); ordering needs two numbers or two strings of the same tag.
    pub(super) fn execute_comparison(
        &mut self,
        op: OpCode,
        left: &Value,
        right: &Value,
    ) -> Result<bool> {
        match op {
            OpCode::Equal => return Ok(left == right),
            OpCode::NotEqual => return Ok(left != right),
            _ => {}
        }

        let ordering = ordering(left, right)?;
        let result = match op {
            OpCode::Less => ordering == Some(Ordering::Less),
            OpCode::LessEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            OpCode::Greater => ordering == Some(Ordering::Greater),
            OpCode::GreaterEqual => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
            _ => {
                return Err(RuntimeError::OperationInvalid(format!(
                    "{} is not a comparison",
                    op
                )));
            }
        };
        Ok(result)
    }
}

/// `None` inside `Ok` means unordered (a NaN operand).
fn ordering(left: &Value, right: &Value) -> Result<Option<Ordering>> {
    let compared = same_variant_cmp!(left, right;
        Int8, Int16, Int32, Int64, Nat8, Nat16, Nat32, Nat64, Size, Real, String);
    match compared {
        Some(ordering) => Ok(ordering),
        None if left.tag() != right.tag() => Err(RuntimeError::ArgumentType {
            expected: left.type_name(),
            found: right.type_name(),
        }),
        None => Err(RuntimeError::type_mismatch("number or String", left)),
    }
}
