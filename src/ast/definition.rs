use serde::Deserialize;

use crate::bytecode::OpCode;

/// Top-level definition: a class or a free procedure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Definition {
    Class(ClassDef),
    Procedure(ProcedureDef),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Class(class) => &class.name,
            Definition::Procedure(procedure) => &procedure.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub methods: Vec<ProcedureDef>,
    #[serde(default)]
    pub constructors: Vec<ProcedureDef>,
}

/// Procedure, method or constructor. Method and constructor bodies receive
/// the receiver in register 0 and their parameters after it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcedureDef {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    /// A missing body is rejected when the definition is loaded.
    #[serde(default)]
    pub body: Option<BodyDef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyDef {
    /// Symbol looked up in the host's native registry.
    Native(String),
    Code(Vec<Statement>),
}

/// One instruction, or a label marking the next instruction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    Label {
        name: String,
    },
    Nop,
    Move {
        target: u16,
        source: OperandDef,
    },
    Binary {
        operator: BinaryOperator,
        target: u16,
        left: OperandDef,
        right: OperandDef,
    },
    Unary {
        operator: UnaryOperator,
        target: u16,
        operand: OperandDef,
    },
    Jump {
        label: String,
    },
    JumpIf {
        condition: OperandDef,
        label: String,
    },
    JumpUnless {
        condition: OperandDef,
        label: String,
    },
    Invoke {
        target: u16,
        callee: OperandDef,
        #[serde(default)]
        args: Vec<OperandDef>,
    },
    InvokeMethod {
        target: u16,
        receiver: OperandDef,
        method: String,
        #[serde(default)]
        args: Vec<OperandDef>,
    },
    New {
        target: u16,
        class: String,
    },
    GetField {
        target: u16,
        object: OperandDef,
        field: String,
    },
    SetField {
        object: OperandDef,
        field: String,
        value: OperandDef,
    },
    Return {
        #[serde(default)]
        value: Option<OperandDef>,
    },
    Raise {
        value: OperandDef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOperator {
    pub fn op_code(self) -> OpCode {
        match self {
            BinaryOperator::Add => OpCode::Add,
            BinaryOperator::Sub => OpCode::Sub,
            BinaryOperator::Mul => OpCode::Mul,
            BinaryOperator::Div => OpCode::Div,
            BinaryOperator::Rem => OpCode::Rem,
            BinaryOperator::Equal => OpCode::Equal,
            BinaryOperator::NotEqual => OpCode::NotEqual,
            BinaryOperator::Less => OpCode::Less,
            BinaryOperator::LessEqual => OpCode::LessEqual,
            BinaryOperator::Greater => OpCode::Greater,
            BinaryOperator::GreaterEqual => OpCode::GreaterEqual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
    Negate,
}

impl UnaryOperator {
    pub fn op_code(self) -> OpCode {
        match self {
            UnaryOperator::Not => OpCode::Not,
            UnaryOperator::Negate => OpCode::Negate,
        }
    }
}

/// `{"reg": 3}` or `{"const": <literal>}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandDef {
    Reg(u16),
    Const(Literal),
}

/// Typed literal, e.g. `{"int32": 5}`, `{"string": "hi"}` or `"void"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Nat8(u8),
    Nat16(u16),
    Nat32(u32),
    Nat64(u64),
    Size(usize),
    Real(f64),
    String(String),
    Void,
    /// Native callback looked up in the host registry.
    Native(String),
}
