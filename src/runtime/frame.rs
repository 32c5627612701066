use std::rc::Rc;

use crate::runtime::{
    gc::{Trace, Visitor},
    native::NativeFunction,
    procedure::Procedure,
    value::Value,
};

/// The callee an activation record refers to.
#[derive(Debug, Clone)]
pub enum Callee {
    Interpreted(Rc<Procedure>),
    Native(NativeFunction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Interpreted,
    Native,
}

impl Callee {
    pub fn kind(&self) -> FrameKind {
        match self {
            Callee::Interpreted(_) => FrameKind::Interpreted,
            Callee::Native(_) => FrameKind::Native,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Callee::Interpreted(procedure) => procedure.name(),
            Callee::Native(native) => native.name(),
        }
    }
}

/// Caller registers saved across a nested call.
#[derive(Debug, Clone, Default)]
pub struct RegisterFrame {
    pub(crate) values: Vec<Value>,
}

impl RegisterFrame {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Trace for RegisterFrame {
    fn trace(&self, visitor: &mut dyn Visitor) {
        self.values.trace(visitor);
    }
}

/// One activation record on a thread's call stack.
#[derive(Debug, Clone)]
pub struct CallFrame {
    return_ip: usize,
    callee: Callee,
    previous: Option<usize>,
    target: Option<u16>,
    saved: Option<RegisterFrame>,
}

impl CallFrame {
    pub(crate) fn new(return_ip: usize, callee: Callee, previous: Option<usize>) -> Self {
        Self {
            return_ip,
            callee,
            previous,
            target: None,
            saved: None,
        }
    }

    /// Instruction index to resume at in the caller.
    pub fn return_ip(&self) -> usize {
        self.return_ip
    }

    pub fn kind(&self) -> FrameKind {
        self.callee.kind()
    }

    pub fn callee(&self) -> &Callee {
        &self.callee
    }

    /// Stack position of the frame that was on top when this one was pushed.
    pub fn previous(&self) -> Option<usize> {
        self.previous
    }

    /// Caller register receiving the return value.
    pub fn target(&self) -> Option<u16> {
        self.target
    }

    pub fn set_target(&mut self, register: u16) {
        self.target = Some(register);
    }

    pub fn attach_registers(&mut self, saved: RegisterFrame) {
        self.saved = Some(saved);
    }

    pub fn take_registers(&mut self) -> Option<RegisterFrame> {
        self.saved.take()
    }
}

impl Trace for CallFrame {
    fn trace(&self, visitor: &mut dyn Visitor) {
        if let Callee::Interpreted(procedure) = &self.callee {
            procedure.trace(visitor);
        }
        if let Some(saved) = &self.saved {
            saved.trace(visitor);
        }
    }
}
