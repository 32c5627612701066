use std::collections::HashMap;

use crate::{
    bytecode::{
        code_unit::CodeUnit,
        constant_pool::ConstantPool,
        op_code::{Instructions, OpCode, Operand},
    },
    runtime::{
        error::{Result, RuntimeError},
        thread::GENERAL_REGISTERS,
        value::Value,
    },
};

/// Assembles a [`CodeUnit`].
///
/// Jump targets are named labels; forward references are patched when the
/// unit is finished. The builder records the highest register it has seen so
/// the finished unit knows its register window.
#[derive(Debug)]
pub struct CodeBuilder {
    instructions: Instructions,
    constants: ConstantPool,
    labels: HashMap<String, usize>,
    fixups: Vec<(usize, String)>,
    register_count: usize,
    register_limit: usize,
}

impl CodeBuilder {
    /// `parameter_count` registers are reserved for incoming arguments.
    pub fn new(parameter_count: usize) -> Self {
        Self {
            instructions: Vec::new(),
            constants: ConstantPool::new(),
            labels: HashMap::new(),
            fixups: Vec::new(),
            register_count: parameter_count,
            register_limit: GENERAL_REGISTERS,
        }
    }

    /// Overrides the number of general registers emitted code may address.
    pub fn with_register_limit(mut self, limit: usize) -> Self {
        self.register_limit = limit.min(Operand::MAX_INDEX as usize + 1);
        self
    }

    /// Interns `value` and returns an operand referring to it.
    pub fn constant(&mut self, value: impl Into<Value>) -> Result<Operand> {
        let index = self.constants.get_or_create(value)?;
        if index > Operand::MAX_INDEX as usize {
            return Err(RuntimeError::ConstantIndex {
                index,
                size: Operand::MAX_INDEX as usize + 1,
            });
        }
        Ok(Operand::Constant(index as u16))
    }

    pub fn register(&self, index: u16) -> Operand {
        Operand::Register(index)
    }

    /// Binds `name` to the current instruction index.
    pub fn label(&mut self, name: &str) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(RuntimeError::AlreadyExists(format!("label `{}`", name)));
        }
        self.labels
            .insert(name.to_string(), self.instructions.len());
        Ok(())
    }

    pub fn emit_nop(&mut self) {
        self.instructions.push(OpCode::Nop as u8);
    }

    pub fn emit_move(&mut self, target: u16, source: Operand) -> Result<()> {
        self.op(OpCode::Move)?;
        self.target(target)?;
        self.source(source)
    }

    /// Emits an arithmetic or comparison instruction.
    pub fn emit_binary(
        &mut self,
        op: OpCode,
        target: u16,
        left: Operand,
        right: Operand,
    ) -> Result<()> {
        if !op.is_binary() {
            return Err(RuntimeError::ArgumentValue(format!(
                "{} is not a binary operation",
                op
            )));
        }
        self.op(op)?;
        self.target(target)?;
        self.source(left)?;
        self.source(right)
    }

    /// Emits `Not` or `Negate`.
    pub fn emit_unary(&mut self, op: OpCode, target: u16, operand: Operand) -> Result<()> {
        if !matches!(op, OpCode::Not | OpCode::Negate) {
            return Err(RuntimeError::ArgumentValue(format!(
                "{} is not a unary operation",
                op
            )));
        }
        self.op(op)?;
        self.target(target)?;
        self.source(operand)
    }

    pub fn emit_jump(&mut self, label: &str) -> Result<()> {
        self.op(OpCode::Jump)?;
        self.address(label);
        Ok(())
    }

    pub fn emit_jump_if(&mut self, condition: Operand, label: &str) -> Result<()> {
        self.op(OpCode::JumpIf)?;
        self.source(condition)?;
        self.address(label);
        Ok(())
    }

    pub fn emit_jump_unless(&mut self, condition: Operand, label: &str) -> Result<()> {
        self.op(OpCode::JumpUnless)?;
        self.source(condition)?;
        self.address(label);
        Ok(())
    }

    /// `callee` must resolve to a procedure, a native, or a global procedure name.
    pub fn emit_invoke(&mut self, target: u16, callee: Operand, args: &[Operand]) -> Result<()> {
        self.op(OpCode::Invoke)?;
        self.target(target)?;
        self.source(callee)?;
        self.arguments(args)
    }

    pub fn emit_invoke_method(
        &mut self,
        target: u16,
        receiver: Operand,
        method: &str,
        args: &[Operand],
    ) -> Result<()> {
        let name = self.constant(method)?;
        self.op(OpCode::InvokeMethod)?;
        self.target(target)?;
        self.source(receiver)?;
        self.source(name)?;
        self.arguments(args)
    }

    pub fn emit_new(&mut self, target: u16, class: &str) -> Result<()> {
        let name = self.constant(class)?;
        self.op(OpCode::New)?;
        self.target(target)?;
        self.source(name)
    }

    pub fn emit_get_field(&mut self, target: u16, object: Operand, field: &str) -> Result<()> {
        let name = self.constant(field)?;
        self.op(OpCode::GetField)?;
        self.target(target)?;
        self.source(object)?;
        self.source(name)
    }

    pub fn emit_set_field(&mut self, object: Operand, field: &str, value: Operand) -> Result<()> {
        let name = self.constant(field)?;
        self.op(OpCode::SetField)?;
        self.source(object)?;
        self.source(name)?;
        self.source(value)
    }

    pub fn emit_return(&mut self, value: Operand) -> Result<()> {
        self.op(OpCode::Return)?;
        self.source(value)
    }

    pub fn emit_return_void(&mut self) -> Result<()> {
        let void = self.constant(Value::Void)?;
        self.emit_return(void)
    }

    pub fn emit_raise(&mut self, value: Operand) -> Result<()> {
        self.op(OpCode::Raise)?;
        self.source(value)
    }

    /// Patches label references and produces the code unit.
    pub fn finish(mut self) -> Result<CodeUnit> {
        for (offset, label) in std::mem::take(&mut self.fixups) {
            let address = *self
                .labels
                .get(&label)
                .ok_or_else(|| RuntimeError::ArgumentValue(format!("unknown label `{}`", label)))?;
            let address = u16::try_from(address).map_err(|_| {
                RuntimeError::ArgumentValue(format!("label `{}` beyond addressable range", label))
            })?;
            self.instructions[offset..offset + 2].copy_from_slice(&address.to_be_bytes());
        }
        Ok(CodeUnit::new(
            self.instructions,
            self.constants,
            self.register_count,
        ))
    }

    fn op(&mut self, op: OpCode) -> Result<()> {
        if self.instructions.len() >= u16::MAX as usize {
            return Err(RuntimeError::AllocationFailed(
                "code unit exceeds addressable size".to_string(),
            ));
        }
        self.instructions.push(op as u8);
        Ok(())
    }

    fn target(&mut self, register: u16) -> Result<()> {
        self.source(Operand::Register(register))
    }

    fn source(&mut self, operand: Operand) -> Result<()> {
        if let Operand::Register(index) = operand {
            let index = index as usize;
            if index >= self.register_limit {
                return Err(RuntimeError::RegisterIndex {
                    index,
                    capacity: self.register_limit,
                });
            }
            self.register_count = self.register_count.max(index + 1);
        }
        self.instructions
            .extend_from_slice(&operand.encode().to_be_bytes());
        Ok(())
    }

    fn address(&mut self, label: &str) {
        self.fixups
            .push((self.instructions.len(), label.to_string()));
        self.instructions.extend_from_slice(&[0, 0]);
    }

    fn arguments(&mut self, args: &[Operand]) -> Result<()> {
        let count = u8::try_from(args.len()).map_err(|_| {
            RuntimeError::ArgumentValue(format!("too many arguments: {}", args.len()))
        })?;
        self.instructions.push(count);
        for arg in args {
            self.source(*arg)?;
        }
        Ok(())
    }
}
