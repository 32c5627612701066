use std::{fmt, rc::Rc};

use tracing::trace;

use crate::runtime::{
    config::RuntimeConfig,
    error::{Result, RuntimeError},
    frame::{CallFrame, Callee, RegisterFrame},
    gc::{Trace, Visitor},
    native::NativeFunction,
    procedure::Procedure,
    value::Value,
};

pub const GENERAL_REGISTERS: usize = 256;
pub const PARAMETER_REGISTERS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    pub const MAIN: ThreadId = ThreadId(0);
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// One logical control flow: a register bank plus a LIFO call-frame stack.
///
/// The bank holds the general registers followed by the dedicated
/// parameter-passing registers.
#[derive(Debug)]
pub struct Thread {
    id: ThreadId,
    registers: Vec<Value>,
    general: usize,
    frames: Vec<CallFrame>,
    max_depth: usize,
}

impl Thread {
    pub fn new(id: ThreadId) -> Self {
        Self::with_config(id, &RuntimeConfig::default())
    }

    pub fn with_config(id: ThreadId, config: &RuntimeConfig) -> Self {
        let general = config.general_registers.max(GENERAL_REGISTERS);
        let parameters = config.parameter_registers.max(PARAMETER_REGISTERS);
        Self {
            id,
            registers: vec![Value::Void; general + parameters],
            general,
            frames: Vec::new(),
            max_depth: config.max_call_depth,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn register_capacity(&self) -> usize {
        self.general
    }

    pub fn parameter_capacity(&self) -> usize {
        self.registers.len() - self.general
    }

    pub fn register_at(&self, index: usize) -> Result<&Value> {
        if index >= self.general {
            return Err(RuntimeError::RegisterIndex {
                index,
                capacity: self.general,
            });
        }
        Ok(&self.registers[index])
    }

    pub fn set_register(&mut self, index: usize, value: Value) -> Result<()> {
        if index >= self.general {
            return Err(RuntimeError::RegisterIndex {
                index,
                capacity: self.general,
            });
        }
        self.registers[index] = value;
        Ok(())
    }

    pub fn parameter(&self, index: usize) -> Result<&Value> {
        let slot = self.parameter_slot(index)?;
        Ok(&self.registers[slot])
    }

    pub fn set_parameter(&mut self, index: usize, value: Value) -> Result<()> {
        let slot = self.parameter_slot(index)?;
        self.registers[slot] = value;
        Ok(())
    }

    /// Copies the first `count` parameter registers out.
    pub fn parameters(&self, count: usize) -> Result<Vec<Value>> {
        if count > 0 {
            self.parameter_slot(count - 1)?;
        }
        let start = self.general;
        Ok(self.registers[start..start + count].to_vec())
    }

    fn parameter_slot(&self, index: usize) -> Result<usize> {
        let capacity = self.parameter_capacity();
        if index >= capacity {
            return Err(RuntimeError::RegisterIndex { index, capacity });
        }
        Ok(self.general + index)
    }

    /// Pushes a frame for an interpreted callee and returns it.
    pub fn begin_procedure_call(
        &mut self,
        return_ip: usize,
        procedure: Rc<Procedure>,
    ) -> Result<&mut CallFrame> {
        self.push_frame(return_ip, Callee::Interpreted(procedure))
    }

    /// Pushes a frame for a native callee and returns it.
    pub fn begin_foreign_procedure_call(
        &mut self,
        return_ip: usize,
        native: NativeFunction,
    ) -> Result<&mut CallFrame> {
        self.push_frame(return_ip, Callee::Native(native))
    }

    fn push_frame(&mut self, return_ip: usize, callee: Callee) -> Result<&mut CallFrame> {
        if self.frames.len() >= self.max_depth {
            return Err(RuntimeError::AllocationFailed(format!(
                "call stack overflow ({} frames)",
                self.max_depth
            )));
        }
        self.frames
            .try_reserve(1)
            .map_err(|e| RuntimeError::AllocationFailed(e.to_string()))?;

        let previous = self.frames.len().checked_sub(1);
        trace!(thread = %self.id, callee = callee.name(), depth = self.frames.len() + 1, "call");
        self.frames
            .push(CallFrame::new(return_ip, callee, previous));
        let depth = self.frames.len();
        Ok(&mut self.frames[depth - 1])
    }

    /// Pops the top frame. An empty stack means calls and returns are out of
    /// balance.
    #[must_use = "the popped frame carries the return point and saved registers"]
    pub fn end_call(&mut self) -> Result<CallFrame> {
        self.frames.pop().ok_or(RuntimeError::CallStackUnderflow)
    }

    /// Top frame, or `None` when the thread is not inside any call.
    pub fn current_call(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn current_call_mut(&mut self) -> Option<&mut CallFrame> {
        self.frames.last_mut()
    }

    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Moves general registers `[0, count)` out, leaving `Void` behind.
    pub fn save_registers(&mut self, count: usize) -> Result<RegisterFrame> {
        if count > self.general {
            return Err(RuntimeError::RegisterIndex {
                index: count - 1,
                capacity: self.general,
            });
        }
        let values = self.registers[..count]
            .iter_mut()
            .map(|slot| std::mem::replace(slot, Value::Void))
            .collect();
        Ok(RegisterFrame { values })
    }

    /// Writes a saved window back, starting at register 0.
    pub fn restore_registers(&mut self, saved: RegisterFrame) {
        for (slot, value) in self.registers.iter_mut().zip(saved.values) {
            *slot = value;
        }
    }

    /// Drops every frame and clears the register bank.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.registers.fill(Value::Void);
    }

    /// Callee names, innermost first.
    pub fn backtrace(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .map(|frame| frame.callee().name().to_string())
            .collect()
    }
}

impl Trace for Thread {
    fn trace(&self, visitor: &mut dyn Visitor) {
        self.registers.trace(visitor);
        self.frames.trace(visitor);
    }
}
