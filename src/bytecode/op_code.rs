use std::fmt;

use crate::runtime::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Nop = 0,
    Move = 1,
    Add = 2,
    Sub = 3,
    Mul = 4,
    Div = 5,
    Rem = 6,
    Equal = 7,
    NotEqual = 8,
    Less = 9,
    LessEqual = 10,
    Greater = 11,
    GreaterEqual = 12,
    Not = 13,
    Negate = 14,
    Jump = 15,
    JumpIf = 16,
    JumpUnless = 17,
    Invoke = 18,
    InvokeMethod = 19,
    New = 20,
    GetField = 21,
    SetField = 22,
    Return = 23,
    Raise = 24,
}

const OPCODES: [OpCode; 25] = [
    OpCode::Nop,
    OpCode::Move,
    OpCode::Add,
    OpCode::Sub,
    OpCode::Mul,
    OpCode::Div,
    OpCode::Rem,
    OpCode::Equal,
    OpCode::NotEqual,
    OpCode::Less,
    OpCode::LessEqual,
    OpCode::Greater,
    OpCode::GreaterEqual,
    OpCode::Not,
    OpCode::Negate,
    OpCode::Jump,
    OpCode::JumpIf,
    OpCode::JumpUnless,
    OpCode::Invoke,
    OpCode::InvokeMethod,
    OpCode::New,
    OpCode::GetField,
    OpCode::SetField,
    OpCode::Return,
    OpCode::Raise,
];

impl TryFrom<u8> for OpCode {
    type Error = RuntimeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OPCODES
            .get(byte as usize)
            .copied()
            .ok_or(RuntimeError::InvalidOpcode(byte))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One field of an instruction's encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Register written by the instruction (16 bits, must be a register operand).
    Target,
    /// Register or constant read by the instruction (16 bits).
    Source,
    /// Absolute instruction index (16 bits).
    Address,
    /// Argument count (8 bits) followed by that many `Source` operands.
    Arguments,
}

impl OpCode {
    /// Fixed encoding shape of the instruction following the opcode byte.
    pub fn shape(self) -> &'static [OperandKind] {
        use OperandKind::*;
        match self {
            OpCode::Nop => &[],
            OpCode::Move | OpCode::Not | OpCode::Negate | OpCode::New => &[Target, Source],
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::Less
            | OpCode::LessEqual
            | OpCode::Greater
            | OpCode::GreaterEqual
            | OpCode::GetField => &[Target, Source, Source],
            OpCode::Jump => &[Address],
            OpCode::JumpIf | OpCode::JumpUnless => &[Source, Address],
            OpCode::Invoke => &[Target, Source, Arguments],
            OpCode::InvokeMethod => &[Target, Source, Source, Arguments],
            OpCode::SetField => &[Source, Source, Source],
            OpCode::Return | OpCode::Raise => &[Source],
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Rem
                | OpCode::Equal
                | OpCode::NotEqual
                | OpCode::Less
                | OpCode::LessEqual
                | OpCode::Greater
                | OpCode::GreaterEqual
        )
    }
}

/// Register-or-constant operand, encoded in 16 bits: the high bit selects the
/// constant pool, the low 15 bits carry the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Register(u16),
    Constant(u16),
}

impl Operand {
    pub const CONSTANT_FLAG: u16 = 0x8000;
    pub const MAX_INDEX: u16 = 0x7FFF;

    pub fn decode(raw: u16) -> Self {
        if raw & Self::CONSTANT_FLAG != 0 {
            Operand::Constant(raw & Self::MAX_INDEX)
        } else {
            Operand::Register(raw)
        }
    }

    pub fn encode(self) -> u16 {
        match self {
            Operand::Register(index) => index & Self::MAX_INDEX,
            Operand::Constant(index) => (index & Self::MAX_INDEX) | Self::CONSTANT_FLAG,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(index) => write!(f, "r{}", index),
            Operand::Constant(index) => write!(f, "k{}", index),
        }
    }
}

pub type Instructions = Vec<u8>;

/// Encodes one instruction.
///
/// `operands` holds one raw field per shape entry; an `Arguments` entry takes
/// the count followed by that many encoded operands.
pub fn make(op: OpCode, operands: &[usize]) -> Instructions {
    let mut instruction = vec![op as u8];
    let mut fields = operands.iter().copied();

    for kind in op.shape() {
        match kind {
            OperandKind::Arguments => {
                let count = fields.next().unwrap_or(0);
                instruction.push(count as u8);
                for _ in 0..count {
                    push_u16(&mut instruction, fields.next().unwrap_or(0));
                }
            }
            _ => push_u16(&mut instruction, fields.next().unwrap_or(0)),
        }
    }

    instruction
}

fn push_u16(instruction: &mut Instructions, value: usize) {
    instruction.push((value >> 8) as u8);
    instruction.push(value as u8);
}

pub fn read_u16(instructions: &[u8], offset: usize) -> Option<u16> {
    let hi = *instructions.get(offset)? as u16;
    let lo = *instructions.get(offset + 1)? as u16;
    Some((hi << 8) | lo)
}

pub fn read_u8(instructions: &[u8], offset: usize) -> Option<u8> {
    instructions.get(offset).copied()
}

/// Sequential operand reader over an instruction stream.
pub struct InstructionReader<'a> {
    instructions: &'a [u8],
    offset: usize,
}

impl<'a> InstructionReader<'a> {
    /// Starts reading at `offset`, normally just past an opcode byte.
    pub fn new(instructions: &'a [u8], offset: usize) -> Self {
        Self {
            instructions,
            offset,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn u8(&mut self) -> Result<u8, RuntimeError> {
        let value = read_u8(self.instructions, self.offset).ok_or_else(|| self.truncated())?;
        self.offset += 1;
        Ok(value)
    }

    pub fn u16(&mut self) -> Result<u16, RuntimeError> {
        let value = read_u16(self.instructions, self.offset).ok_or_else(|| self.truncated())?;
        self.offset += 2;
        Ok(value)
    }

    pub fn operand(&mut self) -> Result<Operand, RuntimeError> {
        self.u16().map(Operand::decode)
    }

    /// Reads a target field, which must name a register.
    pub fn target(&mut self) -> Result<u16, RuntimeError> {
        match self.operand()? {
            Operand::Register(index) => Ok(index),
            Operand::Constant(index) => Err(RuntimeError::OperationInvalid(format!(
                "cannot write to constant k{}",
                index
            ))),
        }
    }

    pub fn address(&mut self) -> Result<usize, RuntimeError> {
        self.u16().map(usize::from)
    }

    /// Reads an argument count and its operands.
    pub fn arguments(&mut self) -> Result<Vec<Operand>, RuntimeError> {
        let count = self.u8()? as usize;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.operand()?);
        }
        Ok(args)
    }

    fn truncated(&self) -> RuntimeError {
        RuntimeError::OperationInvalid(format!("truncated instruction at offset {}", self.offset))
    }
}

pub fn disassemble(instructions: &[u8]) -> String {
    let mut result = String::new();
    let mut i = 0;

    while i < instructions.len() {
        let op = match OpCode::try_from(instructions[i]) {
            Ok(op) => op,
            Err(err) => {
                result.push_str(&format!("{:04} <{}>\n", i, err));
                break;
            }
        };

        let mut reader = InstructionReader::new(instructions, i + 1);
        match render_operands(op, &mut reader) {
            Ok(operands) if operands.is_empty() => result.push_str(&format!("{:04} {}\n", i, op)),
            Ok(operands) => {
                result.push_str(&format!("{:04} {} {}\n", i, op, operands.join(" ")))
            }
            Err(err) => {
                result.push_str(&format!("{:04} {} <{}>\n", i, op, err));
                break;
            }
        }
        i = reader.offset();
    }

    result
}

/// Renders the instruction at `offset` and returns the offset of the next one.
pub fn format_instruction(
    instructions: &[u8],
    offset: usize,
) -> Result<(String, usize), RuntimeError> {
    let byte = read_u8(instructions, offset).ok_or_else(|| {
        RuntimeError::OperationInvalid(format!("no instruction at offset {}", offset))
    })?;
    let op = OpCode::try_from(byte)?;
    let mut reader = InstructionReader::new(instructions, offset + 1);
    let operands = render_operands(op, &mut reader)?;
    let text = if operands.is_empty() {
        op.to_string()
    } else {
        format!("{} {}", op, operands.join(" "))
    };
    Ok((text, reader.offset()))
}

fn render_operands(
    op: OpCode,
    reader: &mut InstructionReader<'_>,
) -> Result<Vec<String>, RuntimeError> {
    let mut operands = Vec::new();
    for kind in op.shape() {
        match kind {
            OperandKind::Target | OperandKind::Source => {
                operands.push(reader.operand()?.to_string())
            }
            OperandKind::Address => operands.push(format!("@{}", reader.address()?)),
            OperandKind::Arguments => {
                let args = reader.arguments()?;
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                operands.push(format!("({})", rendered.join(", ")));
            }
        }
    }
    Ok(operands)
}
