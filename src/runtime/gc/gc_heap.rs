use tracing::debug;

use crate::runtime::{
    class::ClassRef,
    error::{Result, RuntimeError},
    gc::{GcHandle, HeapObject, Trace, Visitor},
    value::Value,
};

pub(crate) const DEFAULT_GC_THRESHOLD: usize = 10_000;
pub(crate) const MIN_GC_THRESHOLD: usize = 1024;
const MAX_GC_THRESHOLD: usize = 1_000_000;

struct HeapEntry {
    object: HeapObject,
    marked: bool,
}

/// Worklist of handles still to be marked.
#[derive(Default)]
struct Marker {
    worklist: Vec<GcHandle>,
}

impl Visitor for Marker {
    fn visit(&mut self, handle: GcHandle) {
        self.worklist.push(handle);
    }
}

/// Stop-the-world mark-and-sweep garbage collector heap.
///
/// Class instances are allocated here. The VM triggers collection when the
/// allocation count reaches the threshold; roots are whatever the caller
/// passes to [`GcHeap::collect`].
pub struct GcHeap {
    entries: Vec<Option<HeapEntry>>,
    free_list: Vec<u32>,
    allocation_count: usize,
    gc_threshold: usize,
    gc_enabled: bool,
    total_collections: usize,
    total_allocations: usize,
}

impl Default for GcHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl GcHeap {
    /// Creates a new GC heap with default collection settings.
    ///
    /// Defaults:
    /// - threshold: `10_000` allocations
    /// - GC enabled: `true`
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            allocation_count: 0,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_enabled: true,
            total_collections: 0,
            total_allocations: 0,
        }
    }

    /// Creates a new heap with a custom GC allocation threshold.
    ///
    /// Unlike [`Self::set_threshold`], this does not clamp to `MIN_GC_THRESHOLD`.
    pub fn with_threshold(threshold: usize) -> Self {
        let mut heap = Self::new();
        heap.gc_threshold = threshold;
        heap
    }

    /// Enables or disables automatic collection checks.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.gc_enabled = enabled
    }

    /// Sets the allocation threshold that triggers collection.
    ///
    /// Values below `MIN_GC_THRESHOLD` are clamped upward.
    pub fn set_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold.max(MIN_GC_THRESHOLD)
    }

    pub fn threshold(&self) -> usize {
        self.gc_threshold
    }

    /// Returns `true` when GC is enabled and the threshold was reached.
    pub fn should_collect(&self) -> bool {
        self.gc_enabled && self.allocation_count >= self.gc_threshold
    }

    /// Allocates a new heap object and returns a stable handle to it.
    ///
    /// Freed slots are reused through the internal free-list before growing
    /// the storage vector.
    pub fn alloc(&mut self, object: HeapObject) -> Result<GcHandle> {
        let entry = HeapEntry {
            object,
            marked: false,
        };

        let handle = if let Some(idx) = self.free_list.pop() {
            self.entries[idx as usize] = Some(entry);
            GcHandle(idx)
        } else {
            let idx = u32::try_from(self.entries.len())
                .map_err(|_| RuntimeError::AllocationFailed("heap exhausted".to_string()))?;
            self.entries
                .try_reserve(1)
                .map_err(|e| RuntimeError::AllocationFailed(e.to_string()))?;
            self.entries.push(Some(entry));
            GcHandle(idx)
        };

        self.allocation_count += 1;
        self.total_allocations += 1;
        Ok(handle)
    }

    /// Allocates an instance of `class` with every field set to `Void`.
    ///
    /// The class must already be complete, since its variable count is only
    /// known afterwards.
    pub fn alloc_instance(&mut self, class: &ClassRef) -> Result<GcHandle> {
        let variable_count = {
            let descriptor = class.borrow();
            if !descriptor.is_complete() {
                return Err(RuntimeError::OperationInvalid(format!(
                    "cannot instantiate incomplete class {}",
                    descriptor.name()
                )));
            }
            descriptor.variable_count()
        };
        let mut fields = Vec::new();
        fields
            .try_reserve_exact(variable_count)
            .map_err(|e| RuntimeError::AllocationFailed(e.to_string()))?;
        fields.resize(variable_count, Value::Void);
        self.alloc(HeapObject::Instance {
            class: class.clone(),
            fields,
        })
    }

    /// Returns an immutable reference to a live object by handle.
    pub fn get(&self, handle: GcHandle) -> Result<&HeapObject> {
        match self.entries.get(handle.0 as usize) {
            Some(Some(entry)) => Ok(&entry.object),
            _ => Err(dangling(handle)),
        }
    }

    pub fn get_mut(&mut self, handle: GcHandle) -> Result<&mut HeapObject> {
        match self.entries.get_mut(handle.0 as usize) {
            Some(Some(entry)) => Ok(&mut entry.object),
            _ => Err(dangling(handle)),
        }
    }

    /// Returns the class of the instance behind `handle`.
    pub fn class_of(&self, handle: GcHandle) -> Result<ClassRef> {
        match self.get(handle)? {
            HeapObject::Instance { class, .. } => Ok(class.clone()),
        }
    }

    pub fn field(&self, handle: GcHandle, index: usize) -> Result<Value> {
        match self.get(handle)? {
            HeapObject::Instance { fields, .. } => fields.get(index).cloned().ok_or_else(|| {
                RuntimeError::ArgumentValue(format!("field index {} out of bounds", index))
            }),
        }
    }

    pub fn set_field(&mut self, handle: GcHandle, index: usize, value: Value) -> Result<()> {
        match self.get_mut(handle)? {
            HeapObject::Instance { fields, .. } => {
                let slot = fields.get_mut(index).ok_or_else(|| {
                    RuntimeError::ArgumentValue(format!("field index {} out of bounds", index))
                })?;
                *slot = value;
                Ok(())
            }
        }
    }

    /// Returns the number of currently live heap entries.
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    /// Returns the total number of allocations performed by this heap.
    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }

    /// Returns the total number of completed GC cycles.
    pub fn total_collections(&self) -> usize {
        self.total_collections
    }

    /// Runs a full stop-the-world mark-and-sweep collection.
    ///
    /// Every object reachable from `roots` survives; everything else is freed
    /// and its slot goes onto the free list.
    pub fn collect(&mut self, roots: &[&dyn Trace]) {
        let mut marker = Marker::default();
        for root in roots {
            root.trace(&mut marker);
        }

        while let Some(handle) = marker.worklist.pop() {
            let Some(Some(entry)) = self.entries.get_mut(handle.0 as usize) else {
                continue;
            };
            // Mark first so shared instances are visited once.
            if entry.marked {
                continue;
            }
            entry.marked = true;
            entry.object.trace(&mut marker);
        }

        let live_before = self.live_count();
        self.sweep();
        let live_after = self.live_count();
        let collected = live_before.saturating_sub(live_after);

        self.total_collections += 1;
        self.allocation_count = 0;
        debug!(collected, live = live_after, "gc cycle complete");

        self.adapt_threshold(collected, live_before);
    }

    fn sweep(&mut self) {
        for (i, slot) in self.entries.iter_mut().enumerate() {
            if let Some(entry) = slot {
                if entry.marked {
                    entry.marked = false;
                } else {
                    *slot = None;
                    self.free_list.push(i as u32);
                }
            }
        }
    }

    fn adapt_threshold(&mut self, collected: usize, total_before: usize) {
        if total_before == 0 {
            return;
        }

        let ratio = collected as f64 / total_before as f64;
        if ratio < 0.25 {
            self.gc_threshold = (self.gc_threshold * 2).min(MAX_GC_THRESHOLD);
        } else if ratio > 0.75 {
            self.gc_threshold = (self.gc_threshold / 2).max(MIN_GC_THRESHOLD)
        }
    }
}

fn dangling(handle: GcHandle) -> RuntimeError {
    RuntimeError::OperationInvalid(format!("dangling object handle #{}", handle.0))
}
