use crate::{
    bytecode::{CodeUnit, OpCode, op_code::InstructionReader},
    runtime::{
        error::{Result, RuntimeError},
        gc::GcHandle,
        process::complete_registered,
        value::Value,
    },
};

use super::{Flow, Vm};

impl Vm<'_> {
    /// Decodes and executes the instruction at `ip`.
    pub(super) fn dispatch_instruction(
        &mut self,
        code: &CodeUnit,
        ip: usize,
        op: OpCode,
    ) -> Result<Flow> {
        let mut reader = InstructionReader::new(code.instructions(), ip + 1);

        match op {
            OpCode::Nop => Ok(Flow::Next(reader.offset())),
            OpCode::Move => {
                let target = reader.target()?;
                let value = self.load(code, reader.operand()?)?;
                self.store(target, value)?;
                Ok(Flow::Next(reader.offset()))
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Rem => {
                let target = reader.target()?;
                let left = self.load(code, reader.operand()?)?;
                let right = self.load(code, reader.operand()?)?;
                let result = self.execute_binary_operation(op, left, right)?;
                self.store(target, result)?;
                Ok(Flow::Next(reader.offset()))
            }
            OpCode::Equal
            | OpCode::NotEqual
            | OpCode::Less
            | OpCode::LessEqual
            | OpCode::Greater
            | OpCode::GreaterEqual => {
                let target = reader.target()?;
                let left = self.load(code, reader.operand()?)?;
                let right = self.load(code, reader.operand()?)?;
                let result = self.execute_comparison(op, &left, &right)?;
                self.store(target, Value::Boolean(result))?;
                Ok(Flow::Next(reader.offset()))
            }
            OpCode::Not => {
                let target = reader.target()?;
                let value = self.load(code, reader.operand()?)?;
                self.store(target, Value::Boolean(!value.is_truthy()))?;
                Ok(Flow::Next(reader.offset()))
            }
            OpCode::Negate => {
                let target = reader.target()?;
                let value = self.load(code, reader.operand()?)?;
                let result = self.execute_negation(value)?;
                self.store(target, result)?;
                Ok(Flow::Next(reader.offset()))
            }
            OpCode::Jump => Ok(Flow::Next(reader.address()?)),
            OpCode::JumpIf | OpCode::JumpUnless => {
                let condition = self.load(code, reader.operand()?)?;
                let address = reader.address()?;
                let taken = condition.is_truthy() == (op == OpCode::JumpIf);
                if taken {
                    Ok(Flow::Next(address))
                } else {
                    Ok(Flow::Next(reader.offset()))
                }
            }
            OpCode::Invoke => {
                let target = reader.target()?;
                let callee = reader.operand()?;
                let args = reader.arguments()?;
                self.execute_invoke(code, reader.offset(), target, callee, &args)
            }
            OpCode::InvokeMethod => {
                let target = reader.target()?;
                let receiver = reader.operand()?;
                let name = reader.operand()?;
                let args = reader.arguments()?;
                self.execute_invoke_method(code, reader.offset(), target, receiver, name, &args)
            }
            OpCode::New => {
                let target = reader.target()?;
                let name = self.load(code, reader.operand()?)?;
                let name = name
                    .as_str()
                    .ok_or_else(|| RuntimeError::type_mismatch("String", &name))?;
                let class = self.globals.class(name)?;
                complete_registered(&class, self.globals)?;
                let handle = self.allocate(&class)?;
                self.store(target, Value::Object(handle))?;
                Ok(Flow::Next(reader.offset()))
            }
            OpCode::GetField => {
                let target = reader.target()?;
                let object = self.load(code, reader.operand()?)?;
                let field = self.load(code, reader.operand()?)?;
                let (handle, index) = self.resolve_field(&object, &field)?;
                let value = self.heap.field(handle, index)?;
                self.store(target, value)?;
                Ok(Flow::Next(reader.offset()))
            }
            OpCode::SetField => {
                let object = self.load(code, reader.operand()?)?;
                let field = self.load(code, reader.operand()?)?;
                let value = self.load(code, reader.operand()?)?;
                let (handle, index) = self.resolve_field(&object, &field)?;
                self.heap.set_field(handle, index, value)?;
                Ok(Flow::Next(reader.offset()))
            }
            OpCode::Return => {
                let value = self.load(code, reader.operand()?)?;
                Ok(Flow::Return(value))
            }
            OpCode::Raise => {
                let value = self.load(code, reader.operand()?)?;
                Err(RuntimeError::Raised(value.to_string_value()))
            }
        }
    }

    fn resolve_field(
        &self,
        object: &Value,
        field: &Value,
    ) -> Result<(GcHandle, usize)> {
        let handle = object
            .as_object()
            .ok_or_else(|| RuntimeError::type_mismatch("Object", object))?;
        let name = field
            .as_str()
            .ok_or_else(|| RuntimeError::type_mismatch("String", field))?;
        let class = self.heap.class_of(handle)?;
        let class = class.try_borrow().map_err(|_| {
            RuntimeError::OperationInvalid("instance class is being completed".to_string())
        })?;
        let index = class.variable_index(name).ok_or_else(|| {
            RuntimeError::NotFound(format!("field `{}` on class {}", name, class.name()))
        })?;
        Ok((handle, index))
    }
}
