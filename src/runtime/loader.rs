use std::{fs, path::Path};

use tracing::debug;

use crate::{
    ast::{BodyDef, ClassDef, Definition, Literal, OperandDef, ProcedureDef, Statement},
    bytecode::{CodeBuilder, CodeUnit, Operand},
    runtime::{
        class::ClassDescriptor,
        error::{Result, RuntimeError},
        native::NativeRegistry,
        procedure::{Body, Procedure},
        process::ProcessState,
        value::Value,
    },
};

/// Turns parsed [`Definition`]s into registered globals.
///
/// Native bodies and native literals are resolved against the registry at
/// load time, so a missing symbol fails before anything runs.
pub struct Loader<'a> {
    natives: &'a NativeRegistry,
}

impl<'a> Loader<'a> {
    pub fn new(natives: &'a NativeRegistry) -> Self {
        Self { natives }
    }

    /// Registers every definition in order. Classes are left incomplete.
    pub fn load(&self, process: &mut ProcessState, definitions: &[Definition]) -> Result<()> {
        for definition in definitions {
            match definition {
                Definition::Procedure(def) => {
                    let procedure = self.procedure(def, false)?;
                    process.define_global_procedure(procedure)?;
                }
                Definition::Class(def) => {
                    let class = self.class(def)?;
                    process.define_global_class(class)?;
                }
            }
        }
        debug!(definitions = definitions.len(), "definitions loaded");
        Ok(())
    }

    /// Parses a JSON array of definitions and loads it. Returns the number of
    /// definitions registered.
    pub fn load_json(&self, process: &mut ProcessState, source: &str) -> Result<usize> {
        let definitions: Vec<Definition> = serde_json::from_str(source)
            .map_err(|e| RuntimeError::ArgumentValue(format!("invalid definitions: {}", e)))?;
        self.load(process, &definitions)?;
        Ok(definitions.len())
    }

    pub fn load_file(&self, process: &mut ProcessState, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| {
            RuntimeError::OperationFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.load_json(process, &source)
    }

    fn class(&self, def: &ClassDef) -> Result<ClassDescriptor> {
        let mut class = ClassDescriptor::new(def.name.as_str(), def.extends.as_deref());
        for variable in &def.variables {
            class.add_variable(variable.as_str())?;
        }
        for method in &def.methods {
            class.add_method(self.procedure(method, true)?)?;
        }
        for constructor in &def.constructors {
            class.add_constructor(self.procedure(constructor, true)?)?;
        }
        Ok(class)
    }

    /// Members reserve register 0 for the receiver.
    fn procedure(&self, def: &ProcedureDef, member: bool) -> Result<Procedure> {
        let body = match &def.body {
            Some(BodyDef::Native(symbol)) => Some(Body::Native(self.natives.get(symbol)?)),
            Some(BodyDef::Code(statements)) => {
                let reserved = def.parameters.len() + usize::from(member);
                Some(Body::from(self.assemble(statements, reserved)?))
            }
            None => None,
        };
        Procedure::try_new(def.name.as_str(), def.parameters.clone(), body)
    }

    fn assemble(&self, statements: &[Statement], reserved: usize) -> Result<CodeUnit> {
        let mut builder = CodeBuilder::new(reserved);
        for statement in statements {
            self.emit(&mut builder, statement)?;
        }
        builder.finish()
    }

    fn emit(&self, builder: &mut CodeBuilder, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Label { name } => builder.label(name),
            Statement::Nop => {
                builder.emit_nop();
                Ok(())
            }
            Statement::Move { target, source } => {
                let source = self.operand(builder, source)?;
                builder.emit_move(*target, source)
            }
            Statement::Binary {
                operator,
                target,
                left,
                right,
            } => {
                let left = self.operand(builder, left)?;
                let right = self.operand(builder, right)?;
                builder.emit_binary(operator.op_code(), *target, left, right)
            }
            Statement::Unary {
                operator,
                target,
                operand,
            } => {
                let operand = self.operand(builder, operand)?;
                builder.emit_unary(operator.op_code(), *target, operand)
            }
            Statement::Jump { label } => builder.emit_jump(label),
            Statement::JumpIf { condition, label } => {
                let condition = self.operand(builder, condition)?;
                builder.emit_jump_if(condition, label)
            }
            Statement::JumpUnless { condition, label } => {
                let condition = self.operand(builder, condition)?;
                builder.emit_jump_unless(condition, label)
            }
            Statement::Invoke {
                target,
                callee,
                args,
            } => {
                let callee = self.operand(builder, callee)?;
                let args = self.operands(builder, args)?;
                builder.emit_invoke(*target, callee, &args)
            }
            Statement::InvokeMethod {
                target,
                receiver,
                method,
                args,
            } => {
                let receiver = self.operand(builder, receiver)?;
                let args = self.operands(builder, args)?;
                builder.emit_invoke_method(*target, receiver, method, &args)
            }
            Statement::New { target, class } => builder.emit_new(*target, class),
            Statement::GetField {
                target,
                object,
                field,
            } => {
                let object = self.operand(builder, object)?;
                builder.emit_get_field(*target, object, field)
            }
            Statement::SetField {
                object,
                field,
                value,
            } => {
                let object = self.operand(builder, object)?;
                let value = self.operand(builder, value)?;
                builder.emit_set_field(object, field, value)
            }
            Statement::Return { value: Some(value) } => {
                let value = self.operand(builder, value)?;
                builder.emit_return(value)
            }
            Statement::Return { value: None } => builder.emit_return_void(),
            Statement::Raise { value } => {
                let value = self.operand(builder, value)?;
                builder.emit_raise(value)
            }
        }
    }

    fn operands(&self, builder: &mut CodeBuilder, defs: &[OperandDef]) -> Result<Vec<Operand>> {
        defs.iter().map(|def| self.operand(builder, def)).collect()
    }

    fn operand(&self, builder: &mut CodeBuilder, def: &OperandDef) -> Result<Operand> {
        match def {
            OperandDef::Reg(index) => Ok(builder.register(*index)),
            OperandDef::Const(literal) => {
                let value = self.literal(literal)?;
                builder.constant(value)
            }
        }
    }

    fn literal(&self, literal: &Literal) -> Result<Value> {
        let value = match literal {
            Literal::Bool(v) => Value::Boolean(*v),
            Literal::Int8(v) => Value::Int8(*v),
            Literal::Int16(v) => Value::Int16(*v),
            Literal::Int32(v) => Value::Int32(*v),
            Literal::Int64(v) => Value::Int64(*v),
            Literal::Nat8(v) => Value::Nat8(*v),
            Literal::Nat16(v) => Value::Nat16(*v),
            Literal::Nat32(v) => Value::Nat32(*v),
            Literal::Nat64(v) => Value::Nat64(*v),
            Literal::Size(v) => Value::Size(*v),
            Literal::Real(v) => Value::Real(*v),
            Literal::String(v) => Value::from(v.as_str()),
            Literal::Void => Value::Void,
            Literal::Native(symbol) => Value::Native(self.natives.get(symbol)?),
        };
        Ok(value)
    }
}
