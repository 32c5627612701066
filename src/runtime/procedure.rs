use std::{fmt, rc::Rc};

use crate::{
    bytecode::CodeUnit,
    runtime::{
        error::{Result, RuntimeError},
        gc::{Trace, Visitor},
        native::NativeFunction,
        value::Value,
    },
};

/// What runs when a procedure is invoked.
#[derive(Debug, Clone)]
pub enum Body {
    Native(NativeFunction),
    Interpreted(Rc<CodeUnit>),
}

impl From<NativeFunction> for Body {
    fn from(native: NativeFunction) -> Self {
        Body::Native(native)
    }
}

impl From<CodeUnit> for Body {
    fn from(code: CodeUnit) -> Self {
        Body::Interpreted(Rc::new(code))
    }
}

/// Only native callbacks and existing procedure bodies convert; anything else
/// is an argument-type error.
impl TryFrom<Value> for Body {
    type Error = RuntimeError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Native(native) => Ok(Body::Native(native)),
            Value::Procedure(procedure) => Ok(procedure.body().clone()),
            other => Err(RuntimeError::type_mismatch("Native", &other)),
        }
    }
}

/// Named, parameter-list-bearing unit of executable behavior.
///
/// Free procedures are owned by the process registry; methods and
/// constructors wrap one in a [`Method`] owned by their class.
pub struct Procedure {
    name: String,
    parameters: Vec<String>,
    body: Body,
}

impl Procedure {
    pub fn new(name: impl Into<String>, parameters: Vec<String>, body: impl Into<Body>) -> Self {
        Self {
            name: name.into(),
            parameters,
            body: body.into(),
        }
    }

    /// Builds a procedure from an optional body, failing when none was given.
    pub fn try_new(
        name: impl Into<String>,
        parameters: Vec<String>,
        body: Option<Body>,
    ) -> Result<Self> {
        let name = name.into();
        let body = body.ok_or(RuntimeError::ArgumentType {
            expected: "Native or CodeUnit",
            found: "Void",
        })?;
        Ok(Self {
            name,
            parameters,
            body,
        })
    }

    pub fn native(name: impl Into<String>, parameters: Vec<String>, native: NativeFunction) -> Self {
        Self::new(name, parameters, native)
    }

    pub fn interpreted(name: impl Into<String>, parameters: Vec<String>, code: CodeUnit) -> Self {
        Self::new(name, parameters, code)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, Body::Native(_))
    }

    pub fn code(&self) -> Option<&Rc<CodeUnit>> {
        match &self.body {
            Body::Interpreted(code) => Some(code),
            Body::Native(_) => None,
        }
    }

    /// Fails unless `got` matches the declared parameter count.
    pub fn check_arity(&self, got: usize) -> Result<()> {
        if got != self.arity() {
            return Err(RuntimeError::ArgumentCount {
                callee: self.name.clone(),
                expected: self.arity(),
                got,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_native() { "native" } else { "code" };
        write!(f, "Procedure({}({}) {})", self.name, self.parameters.join(", "), kind)
    }
}

impl Trace for Procedure {
    fn trace(&self, visitor: &mut dyn Visitor) {
        // Native bodies own no object references.
        if let Body::Interpreted(code) = &self.body {
            code.trace(visitor);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Constructor,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Method => f.write_str("method"),
            MemberKind::Constructor => f.write_str("constructor"),
        }
    }
}

/// Class member: a procedure plus the dispatch slot assigned when the owning
/// class completes.
///
/// The receiver is passed as an implicit first argument and is not part of
/// the procedure's parameter list.
#[derive(Debug, Clone)]
pub struct Method {
    procedure: Rc<Procedure>,
    kind: MemberKind,
    index: Option<usize>,
}

impl Method {
    pub fn new(procedure: impl Into<Rc<Procedure>>, kind: MemberKind) -> Self {
        Self {
            procedure: procedure.into(),
            kind,
            index: None,
        }
    }

    pub fn name(&self) -> &str {
        self.procedure.name()
    }

    pub fn procedure(&self) -> &Rc<Procedure> {
        &self.procedure
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Dispatch slot; `None` until the owning class is complete.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Set once the owning class has completed.
    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    pub(crate) fn assign_index(&mut self, index: usize) {
        self.index = Some(index);
    }
}

impl Trace for Method {
    fn trace(&self, visitor: &mut dyn Visitor) {
        self.procedure.trace(visitor);
    }
}
