use crate::runtime::{gc::GcHandle, value::Value};

/// Receives every heap reference reachable from a traced entity.
pub trait Visitor {
    fn visit(&mut self, handle: GcHandle);
}

/// Implemented by every runtime entity that owns values, so the collector
/// can find reachable instances.
pub trait Trace {
    fn trace(&self, visitor: &mut dyn Visitor);
}

impl Trace for Value {
    fn trace(&self, visitor: &mut dyn Visitor) {
        if let Value::Object(handle) = self {
            visitor.visit(*handle);
        }
    }
}

impl<T: Trace> Trace for [T] {
    fn trace(&self, visitor: &mut dyn Visitor) {
        for item in self {
            item.trace(visitor);
        }
    }
}

impl<T: Trace> Trace for Vec<T> {
    fn trace(&self, visitor: &mut dyn Visitor) {
        self.as_slice().trace(visitor);
    }
}

impl<T: Trace> Trace for Option<T> {
    fn trace(&self, visitor: &mut dyn Visitor) {
        if let Some(inner) = self {
            inner.trace(visitor);
        }
    }
}

/// Collects visited handles; handy for asserting what an entity reports.
#[derive(Debug, Default)]
pub struct HandleCollector {
    pub handles: Vec<GcHandle>,
}

impl Visitor for HandleCollector {
    fn visit(&mut self, handle: GcHandle) {
        self.handles.push(handle);
    }
}
