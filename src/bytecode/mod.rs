pub mod builder;
pub mod code_unit;
pub mod constant_pool;
pub mod op_code;

pub use builder::CodeBuilder;
pub use code_unit::CodeUnit;
pub use constant_pool::ConstantPool;
pub use op_code::{OpCode, Operand};
