use sha2::{Digest, Sha256};

use crate::{
    bytecode::{
        constant_pool::ConstantPool,
        op_code::{Instructions, disassemble},
    },
    runtime::gc::{Trace, Visitor},
};

/// Instruction stream paired with the constant pool it indexes.
///
/// `register_count` is the width of the general-register window the code
/// touches; callers save exactly that many registers around a call.
#[derive(Debug, Clone)]
pub struct CodeUnit {
    instructions: Instructions,
    constants: ConstantPool,
    register_count: usize,
}

impl CodeUnit {
    pub fn new(instructions: Instructions, constants: ConstantPool, register_count: usize) -> Self {
        Self {
            instructions,
            constants,
            register_count,
        }
    }

    pub fn instructions(&self) -> &[u8] {
        &self.instructions
    }

    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    pub fn register_count(&self) -> usize {
        self.register_count
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// SHA-256 over the instruction bytes and the tagged constant entries.
    ///
    /// Two code units with the same fingerprint execute identically.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.instructions.len() as u64).to_le_bytes());
        hasher.update(&self.instructions);
        hasher.update((self.register_count as u64).to_le_bytes());
        for constant in self.constants.iter() {
            hasher.update(constant.type_name().as_bytes());
            hasher.update([0]);
            hasher.update(constant.to_string().as_bytes());
            hasher.update([0]);
        }
        hasher.finalize().into()
    }

    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Renders the constant table followed by the instruction listing.
    pub fn disassemble(&self) -> String {
        let mut output = String::from("Constants:\n");
        for (i, constant) in self.constants.iter().enumerate() {
            output.push_str(&format!("  k{}: {}\n", i, constant));
        }
        output.push_str("\nInstructions:\n");
        output.push_str(&disassemble(&self.instructions));
        output
    }
}

impl Trace for CodeUnit {
    fn trace(&self, visitor: &mut dyn Visitor) {
        self.constants.trace(visitor);
    }
}
