use crate::runtime::{
    error::{Result, RuntimeError},
    gc::{Trace, Visitor},
    value::Value,
};

const INITIAL_CAPACITY: usize = 8;

/// Append-only, deduplicated table of literal values referenced by a code unit.
///
/// `get_or_create` is a pure function of `(tag, payload)`: equal pairs always
/// map to the same index and distinct pairs never share one. Entries are never
/// removed or reordered, so an index stays valid for the pool's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Value>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `value`, appending it if no identical entry exists.
    ///
    /// Capacity doubles when exhausted; a failed reservation reports
    /// allocation failure instead of aborting.
    pub fn get_or_create(&mut self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        if let Some(index) = self.index_of(&value) {
            return Ok(index);
        }

        if self.entries.len() == self.entries.capacity() {
            let additional = self.entries.capacity().max(INITIAL_CAPACITY);
            self.entries
                .try_reserve_exact(additional)
                .map_err(|e| RuntimeError::AllocationFailed(e.to_string()))?;
        }
        self.entries.push(value);
        Ok(self.entries.len() - 1)
    }

    /// Looks up an existing entry without inserting.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.entries.iter().position(|entry| entry.is_identical(value))
    }

    /// Bounds-checked read.
    pub fn get_at(&self, index: usize) -> Result<&Value> {
        self.entries.get(index).ok_or(RuntimeError::ConstantIndex {
            index,
            size: self.entries.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }
}

impl Trace for ConstantPool {
    fn trace(&self, visitor: &mut dyn Visitor) {
        self.entries.trace(visitor);
    }
}
