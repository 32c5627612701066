//! Already-parsed definitions handed to the runtime by a front-end.
//!
//! The runtime never parses source text; it consumes these shapes, usually
//! deserialized from JSON.
pub mod definition;

pub use definition::{
    BinaryOperator, BodyDef, ClassDef, Definition, Literal, OperandDef, ProcedureDef, Statement,
    UnaryOperator,
};
