use std::{collections::BTreeMap, rc::Rc};

use crate::{
    bytecode::{CodeUnit, OpCode, Operand},
    runtime::{
        class::ClassRef,
        config::RuntimeConfig,
        error::{Result, RuntimeError},
        gc::{GcHandle, GcHeap, Trace},
        procedure::{Body, Procedure},
        process::Globals,
        thread::{Thread, ThreadId},
        value::Value,
    },
};

mod binary_ops;
mod comparison_ops;
mod dispatch;
mod function_call;
mod trace;

use function_call::Resume;

/// What the loop does after an instruction.
pub(crate) enum Flow {
    /// Continue at the given instruction index in the same code unit.
    Next(usize),
    /// An interpreted callee was entered; start its code at index 0.
    Enter(Rc<CodeUnit>),
    /// Leave the current frame with a value.
    Return(Value),
}

/// Executes code units against one thread.
///
/// The VM borrows everything it touches from the process for the duration of
/// one entry-point run: the registry (read-only), the running thread, the
/// other threads (as collection roots only) and the heap.
pub struct Vm<'a> {
    globals: &'a Globals,
    thread: &'a mut Thread,
    others: &'a BTreeMap<ThreadId, Thread>,
    heap: &'a mut GcHeap,
    config: &'a RuntimeConfig,
    executed: u64,
}

impl<'a> Vm<'a> {
    pub fn new(
        globals: &'a Globals,
        thread: &'a mut Thread,
        others: &'a BTreeMap<ThreadId, Thread>,
        heap: &'a mut GcHeap,
        config: &'a RuntimeConfig,
    ) -> Self {
        Self {
            globals,
            thread,
            others,
            heap,
            config,
            executed: 0,
        }
    }

    /// Instructions executed so far by this VM.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Invokes `procedure` with `args` and runs until it returns or faults.
    pub fn execute(&mut self, procedure: Rc<Procedure>, args: Vec<Value>) -> Result<Value> {
        procedure.check_arity(args.len())?;
        self.stage_arguments(&args)?;

        if let Body::Native(native) = procedure.body() {
            let native = native.clone();
            return self.call_native(0, native, args.len());
        }
        let base_depth = self.thread.call_depth();
        let mut code = self.enter(0, procedure, args.len(), None)?;
        let mut ip = 0;

        loop {
            let flow = if ip >= code.len() {
                Flow::Return(Value::Void)
            } else {
                self.count_instruction()?;
                let op = OpCode::try_from(code.instructions()[ip])?;
                if self.config.trace {
                    self.trace_instruction(&code, ip);
                }
                self.dispatch_instruction(&code, ip, op)?
            };

            match flow {
                Flow::Next(next) => {
                    if next > code.len() {
                        return Err(RuntimeError::OperationInvalid(format!(
                            "jump target {} beyond code of length {}",
                            next,
                            code.len()
                        )));
                    }
                    ip = next;
                }
                Flow::Enter(callee) => {
                    code = callee;
                    ip = 0;
                }
                Flow::Return(value) => match self.leave(value, base_depth)? {
                    Resume::Caller { code: caller, ip: resume } => {
                        code = caller;
                        ip = resume;
                    }
                    Resume::Finished(result) => return Ok(result),
                },
            }
        }
    }

    fn count_instruction(&mut self) -> Result<()> {
        self.executed += 1;
        if let Some(budget) = self.config.instruction_budget
            && self.executed > budget
        {
            return Err(RuntimeError::OperationFailed(format!(
                "instruction budget of {} exhausted",
                budget
            )));
        }
        Ok(())
    }

    fn load(&self, code: &CodeUnit, operand: Operand) -> Result<Value> {
        match operand {
            Operand::Register(index) => self.thread.register_at(index as usize).cloned(),
            Operand::Constant(index) => code.constants().get_at(index as usize).cloned(),
        }
    }

    fn store(&mut self, target: u16, value: Value) -> Result<()> {
        self.thread.set_register(target as usize, value)
    }

    /// Allocates an instance, collecting first when the heap asks for it.
    fn allocate(&mut self, class: &ClassRef) -> Result<GcHandle> {
        if self.heap.should_collect() {
            let mut roots: Vec<&dyn Trace> = vec![self.globals as &dyn Trace, &*self.thread];
            roots.extend(self.others.values().map(|thread| thread as &dyn Trace));
            self.heap.collect(&roots);
        }
        self.heap.alloc_instance(class)
    }
}
