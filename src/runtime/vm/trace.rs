use tracing::trace;

use crate::bytecode::{CodeUnit, op_code::format_instruction};

use super::Vm;

impl Vm<'_> {
    pub(super) fn trace_instruction(&self, code: &CodeUnit, ip: usize) {
        let instruction = render_instruction(code, ip);
        trace!(
            thread = %self.thread.id(),
            depth = self.thread.call_depth(),
            callee = self.current_callee(),
            "{:04} {}",
            ip,
            instruction
        );
    }

    fn current_callee(&self) -> &str {
        self.thread
            .current_call()
            .map(|frame| frame.callee().name())
            .unwrap_or("<none>")
    }
}

pub(super) fn render_instruction(code: &CodeUnit, ip: usize) -> String {
    match format_instruction(code.instructions(), ip) {
        Ok((text, _)) => text,
        Err(err) => format!("<{}>", err),
    }
}
