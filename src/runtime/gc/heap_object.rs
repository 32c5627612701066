use crate::runtime::{
    class::ClassRef,
    gc::{Trace, Visitor},
    value::Value,
};

/// Objects that live on the GC-managed heap.
#[derive(Debug, Clone)]
pub enum HeapObject {
    /// Instance of a completed class; `fields` is indexed by the class's
    /// completed variable layout.
    Instance { class: ClassRef, fields: Vec<Value> },
}

impl Trace for HeapObject {
    fn trace(&self, visitor: &mut dyn Visitor) {
        match self {
            HeapObject::Instance { fields, .. } => fields.trace(visitor),
        }
    }
}
