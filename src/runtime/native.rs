use std::{collections::HashMap, fmt, rc::Rc};

use crate::runtime::{
    error::{Result, RuntimeError},
    value::Value,
};

/// Host callback signature: `(target, arguments)`.
///
/// The callee writes its result into `target`, which starts out as `Void`.
/// The argument count is `arguments.len()`.
pub type NativeFn = dyn Fn(&mut Value, &[Value]) -> Result<()>;

/// Named host callback shared by every procedure, method or constant that
/// refers to it.
#[derive(Clone)]
pub struct NativeFunction {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<Rc<str>>,
        func: impl Fn(&mut Value, &[Value]) -> Result<()> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, target: &mut Value, args: &[Value]) -> Result<()> {
        (self.func)(target, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// Two handles are equal when they share the same callback allocation.
impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

/// Symbol table the loader resolves `native` procedure bodies against.
#[derive(Debug, Default, Clone)]
pub struct NativeRegistry {
    natives: HashMap<String, NativeFunction>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `func` under `name`, replacing any earlier registration.
    pub fn register(
        &mut self,
        name: &str,
        func: impl Fn(&mut Value, &[Value]) -> Result<()> + 'static,
    ) -> NativeFunction {
        let native = NativeFunction::new(name, func);
        self.natives.insert(name.to_string(), native.clone());
        native
    }

    pub fn get(&self, name: &str) -> Result<NativeFunction> {
        self.natives
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(format!("native `{}`", name)))
    }

    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }
}

/// Fails unless exactly `expected` arguments were passed.
pub fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(RuntimeError::ArgumentCount {
            callee: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}
