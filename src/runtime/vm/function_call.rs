use std::rc::Rc;

use crate::{
    bytecode::{CodeUnit, Operand},
    runtime::{
        error::{Result, RuntimeError},
        frame::Callee,
        native::NativeFunction,
        procedure::{Body, Procedure},
        value::Value,
    },
};

use super::{Flow, Vm};

/// Where execution continues after a frame is left.
pub(super) enum Resume {
    Caller { code: Rc<CodeUnit>, ip: usize },
    /// The entry frame returned.
    Finished(Value),
}

impl Vm<'_> {
    /// Copies call arguments into the parameter registers.
    pub(super) fn stage_arguments(&mut self, args: &[Value]) -> Result<()> {
        for (index, arg) in args.iter().enumerate() {
            self.thread.set_parameter(index, arg.clone())?;
        }
        Ok(())
    }

    /// Runs a native callback between a foreign frame push and pop, passing
    /// the first `argc` parameter registers.
    pub(super) fn call_native(
        &mut self,
        return_ip: usize,
        native: NativeFunction,
        argc: usize,
    ) -> Result<Value> {
        self.thread
            .begin_foreign_procedure_call(return_ip, native.clone())?;
        let args = self.thread.parameters(argc)?;
        let mut result = Value::Void;
        native.call(&mut result, &args)?;
        self.thread.end_call()?;
        Ok(result)
    }

    /// Pushes a frame for an interpreted callee, saves the caller's register
    /// window and moves the staged parameters into registers `0..argc`.
    pub(super) fn enter(
        &mut self,
        return_ip: usize,
        procedure: Rc<Procedure>,
        argc: usize,
        target: Option<u16>,
    ) -> Result<Rc<CodeUnit>> {
        let code = procedure.code().cloned().ok_or_else(|| {
            RuntimeError::OperationInvalid(format!("{} has no code to enter", procedure.name()))
        })?;
        let window = code.register_count().max(argc);

        let frame = self.thread.begin_procedure_call(return_ip, procedure)?;
        if let Some(target) = target {
            frame.set_target(target);
        }
        let saved = self.thread.save_registers(window)?;
        for index in 0..argc {
            let value = self.thread.parameter(index)?.clone();
            self.thread.set_register(index, value)?;
        }
        if let Some(frame) = self.thread.current_call_mut() {
            frame.attach_registers(saved);
        }
        Ok(code)
    }

    /// Pops the current frame, restores the caller's registers and delivers
    /// `value` to the caller's target register.
    pub(super) fn leave(&mut self, value: Value, base_depth: usize) -> Result<Resume> {
        let mut frame = self.thread.end_call()?;
        if let Some(saved) = frame.take_registers() {
            self.thread.restore_registers(saved);
        }
        if self.thread.call_depth() <= base_depth {
            return Ok(Resume::Finished(value));
        }
        if let Some(target) = frame.target() {
            self.store(target, value)?;
        }

        let caller = match self.thread.current_call().map(|caller| caller.callee()) {
            Some(Callee::Interpreted(procedure)) => procedure.code().cloned(),
            _ => None,
        };
        let code = caller.ok_or_else(|| {
            RuntimeError::OperationInvalid("return into a frame without code".to_string())
        })?;
        Ok(Resume::Caller {
            code,
            ip: frame.return_ip(),
        })
    }

    /// `Invoke target callee argc args...`
    pub(super) fn execute_invoke(
        &mut self,
        code: &CodeUnit,
        next_ip: usize,
        target: u16,
        callee: Operand,
        args: &[Operand],
    ) -> Result<Flow> {
        let callee = self.load(code, callee)?;
        let values = self.load_all(code, args)?;

        let procedure = match callee {
            Value::Procedure(procedure) => procedure,
            Value::Native(native) => {
                self.stage_arguments(&values)?;
                let result = self.call_native(next_ip, native, values.len())?;
                self.store(target, result)?;
                return Ok(Flow::Next(next_ip));
            }
            Value::String(name) => self.globals.procedure(&name)?,
            other => {
                return Err(RuntimeError::OperationInvalid(format!(
                    "cannot invoke a value of type {}",
                    other.type_name()
                )));
            }
        };

        procedure.check_arity(values.len())?;
        self.stage_arguments(&values)?;
        self.call_procedure(next_ip, target, procedure, values.len())
    }

    /// `InvokeMethod target receiver name argc args...`
    ///
    /// Dispatch goes through the receiver's class table; the receiver becomes
    /// argument 0 and is not counted against the declared parameters.
    pub(super) fn execute_invoke_method(
        &mut self,
        code: &CodeUnit,
        next_ip: usize,
        target: u16,
        receiver: Operand,
        name: Operand,
        args: &[Operand],
    ) -> Result<Flow> {
        let receiver = self.load(code, receiver)?;
        let handle = receiver
            .as_object()
            .ok_or_else(|| RuntimeError::type_mismatch("Object", &receiver))?;
        let name = self.load(code, name)?;
        let name = name
            .as_str()
            .ok_or_else(|| RuntimeError::type_mismatch("String", &name))?;

        let class = self.heap.class_of(handle)?;
        let procedure = {
            let class = class.try_borrow().map_err(|_| {
                RuntimeError::OperationInvalid("receiver class is being completed".to_string())
            })?;
            let slot = class.lookup_method(name).ok_or_else(|| {
                RuntimeError::NotFound(format!("method `{}` on class {}", name, class.name()))
            })?;
            slot.procedure.clone()
        };

        let mut values = self.load_all(code, args)?;
        procedure.check_arity(values.len())?;
        values.insert(0, receiver);
        self.stage_arguments(&values)?;
        self.call_procedure(next_ip, target, procedure, values.len())
    }

    fn call_procedure(
        &mut self,
        next_ip: usize,
        target: u16,
        procedure: Rc<Procedure>,
        argc: usize,
    ) -> Result<Flow> {
        if let Body::Native(native) = procedure.body() {
            let native = native.clone();
            let result = self.call_native(next_ip, native, argc)?;
            self.store(target, result)?;
            return Ok(Flow::Next(next_ip));
        }
        let callee = self.enter(next_ip, procedure, argc, Some(target))?;
        Ok(Flow::Enter(callee))
    }

    fn load_all(&self, code: &CodeUnit, operands: &[Operand]) -> Result<Vec<Value>> {
        operands
            .iter()
            .map(|operand| self.load(code, *operand))
            .collect()
    }
}
