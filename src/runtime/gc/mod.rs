//! Object substrate: heap handles, the tracing contract and a mark-and-sweep
//! heap for class instances.
pub mod gc_handle;
pub mod gc_heap;
pub mod heap_object;
pub mod trace;

pub use gc_handle::GcHandle;
pub use gc_heap::GcHeap;
pub use heap_object::HeapObject;
pub use trace::{Trace, Visitor};
