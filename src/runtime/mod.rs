//! Class linking and execution engine.
//!
//! Descriptors are registered into a [`process::ProcessState`], classes are
//! completed before first use, and procedures run on a thread's register bank
//! and call-frame stack through the [`vm::Vm`] loop. Faults are returned as
//! [`error::RuntimeError`] values all the way to the host entry point.
pub mod class;
pub mod config;
pub mod error;
pub mod frame;
pub mod gc;
pub mod loader;
pub mod native;
pub mod procedure;
pub mod process;
pub mod thread;
pub mod value;
pub mod vm;

pub use class::{ClassDescriptor, ClassRef};
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use native::{NativeFunction, NativeRegistry};
pub use procedure::{Body, Method, MemberKind, Procedure};
pub use process::{Global, ProcessState};
pub use thread::{Thread, ThreadId};
pub use value::Value;
