//! Runtime configuration.

use std::path::Path;

use serde::Deserialize;

use crate::runtime::{
    error::{Result, RuntimeError},
    gc::gc_heap::{DEFAULT_GC_THRESHOLD, MIN_GC_THRESHOLD},
    thread::{GENERAL_REGISTERS, PARAMETER_REGISTERS},
};

const DEFAULT_MAX_CALL_DEPTH: usize = 4096;

/// Knobs for one process. Unset fields take their defaults, so `{}` is a
/// valid configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub general_registers: usize,
    pub parameter_registers: usize,
    pub max_call_depth: usize,
    /// Instructions a single entry-point run may execute.
    pub instruction_budget: Option<u64>,
    pub gc_enabled: bool,
    pub gc_threshold: usize,
    /// Log every executed instruction at `trace` level.
    pub trace: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            general_registers: GENERAL_REGISTERS,
            parameter_registers: PARAMETER_REGISTERS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            instruction_budget: None,
            gc_enabled: true,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            trace: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)
            .map_err(|e| RuntimeError::ArgumentValue(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::OperationFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.general_registers < GENERAL_REGISTERS {
            return Err(RuntimeError::ArgumentValue(format!(
                "general_registers must be at least {}, got {}",
                GENERAL_REGISTERS, self.general_registers
            )));
        }
        if self.parameter_registers < PARAMETER_REGISTERS {
            return Err(RuntimeError::ArgumentValue(format!(
                "parameter_registers must be at least {}, got {}",
                PARAMETER_REGISTERS, self.parameter_registers
            )));
        }
        if self.max_call_depth == 0 {
            return Err(RuntimeError::ArgumentValue(
                "max_call_depth must be positive".to_string(),
            ));
        }
        if self.gc_threshold < MIN_GC_THRESHOLD {
            return Err(RuntimeError::ArgumentValue(format!(
                "gc_threshold must be at least {}, got {}",
                MIN_GC_THRESHOLD, self.gc_threshold
            )));
        }
        Ok(())
    }
}
