use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    rc::Rc,
};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::runtime::{
    class::{ClassDescriptor, ClassRef, ClassResolver},
    config::RuntimeConfig,
    error::{Result, RuntimeError},
    gc::{GcHandle, GcHeap, Trace, Visitor},
    procedure::Procedure,
    thread::{Thread, ThreadId},
    value::Value,
    vm::Vm,
};

/// Entity registered under a global name.
#[derive(Debug, Clone)]
pub enum Global {
    Class(ClassRef),
    Procedure(Rc<Procedure>),
}

impl Global {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Global::Class(_) => "class",
            Global::Procedure(_) => "procedure",
        }
    }

    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Global::Class(class) => Some(class),
            Global::Procedure(_) => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&Rc<Procedure>> {
        match self {
            Global::Procedure(procedure) => Some(procedure),
            Global::Class(_) => None,
        }
    }
}

impl Trace for Global {
    fn trace(&self, visitor: &mut dyn Visitor) {
        match self {
            Global::Procedure(procedure) => procedure.trace(visitor),
            // A class mid-completion is mutably borrowed and owns no
            // instance references yet.
            Global::Class(class) => {
                if let Ok(class) = class.try_borrow() {
                    class.trace(visitor);
                }
            }
        }
    }
}

/// Name -> entity map. Classes and procedures share one namespace.
#[derive(Debug, Default)]
pub struct Globals {
    entries: IndexMap<String, Global>,
}

impl Globals {
    pub fn define(&mut self, name: &str, global: Global) -> Result<()> {
        if let Some(existing) = self.entries.get(name) {
            return Err(RuntimeError::AlreadyExists(format!(
                "{} `{}`",
                existing.kind_name(),
                name
            )));
        }
        self.entries
            .try_reserve(1)
            .map_err(|e| RuntimeError::AllocationFailed(e.to_string()))?;
        self.entries.insert(name.to_string(), global);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Global> {
        self.entries
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound(format!("global `{}`", name)))
    }

    pub fn class(&self, name: &str) -> Result<ClassRef> {
        self.get(name)?
            .as_class()
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(format!("class `{}`", name)))
    }

    pub fn procedure(&self, name: &str) -> Result<Rc<Procedure>> {
        self.get(name)?
            .as_procedure()
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(format!("procedure `{}`", name)))
    }

    /// Registered class names in definition order.
    pub fn class_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, global)| global.as_class().is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ClassResolver for Globals {
    fn resolve_class(&self, name: &str) -> Result<ClassRef> {
        self.class(name)
    }
}

impl Trace for Globals {
    fn trace(&self, visitor: &mut dyn Visitor) {
        for global in self.entries.values() {
            global.trace(visitor);
        }
    }
}

#[derive(Debug)]
struct PendingCall {
    thread: ThreadId,
    procedure: String,
    args: Vec<Value>,
}

/// Process-wide state: the global registry, the threads, and the object heap.
///
/// Exactly one thread is current at any time. Only [`ProcessState::switch_to`]
/// and the entry points (for the duration of a run) change it.
pub struct ProcessState {
    globals: Globals,
    threads: BTreeMap<ThreadId, Thread>,
    current: ThreadId,
    next_thread_id: u32,
    pending: VecDeque<PendingCall>,
    heap: GcHeap,
    config: RuntimeConfig,
    last_backtrace: Vec<String>,
}

impl ProcessState {
    /// Creates the process with default configuration and its main thread.
    pub fn startup() -> Self {
        Self::build(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        let mut heap = GcHeap::new();
        heap.set_threshold(config.gc_threshold);
        heap.set_enabled(config.gc_enabled);

        let mut threads = BTreeMap::new();
        threads.insert(ThreadId::MAIN, Thread::with_config(ThreadId::MAIN, &config));
        debug!("process started");

        Self {
            globals: Globals::default(),
            threads,
            current: ThreadId::MAIN,
            next_thread_id: 1,
            pending: VecDeque::new(),
            heap,
            config,
            last_backtrace: Vec::new(),
        }
    }

    /// Tears down every thread, then the registry.
    pub fn shutdown(mut self) {
        debug!(
            threads = self.threads.len(),
            globals = self.globals.len(),
            "process shutting down"
        );
        self.pending.clear();
        self.threads.clear();
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn define_global_procedure(&mut self, procedure: Procedure) -> Result<Rc<Procedure>> {
        let procedure = Rc::new(procedure);
        let name = procedure.name().to_string();
        self.globals
            .define(&name, Global::Procedure(procedure.clone()))?;
        debug!(procedure = %name, "defined global procedure");
        Ok(procedure)
    }

    pub fn define_global_class(&mut self, class: ClassDescriptor) -> Result<ClassRef> {
        let name = class.name().to_string();
        let class = Rc::new(RefCell::new(class));
        self.globals.define(&name, Global::Class(class.clone()))?;
        debug!(class = %name, "defined global class");
        Ok(class)
    }

    pub fn get_global(&self, name: &str) -> Result<&Global> {
        self.globals.get(name)
    }

    pub fn get_class(&self, name: &str) -> Result<ClassRef> {
        self.globals.class(name)
    }

    pub fn get_procedure(&self, name: &str) -> Result<Rc<Procedure>> {
        self.globals.procedure(name)
    }

    /// Completes the named class and its ancestors.
    pub fn complete_class(&self, name: &str) -> Result<ClassRef> {
        let class = self.globals.class(name)?;
        complete_registered(&class, &self.globals)?;
        Ok(class)
    }

    /// Completes every registered class in definition order.
    pub fn complete_all(&self) -> Result<()> {
        for name in self.globals.class_names() {
            self.complete_class(&name)?;
        }
        Ok(())
    }

    pub fn main_thread(&self) -> Result<&Thread> {
        self.thread(ThreadId::MAIN)
    }

    pub fn current_thread(&self) -> Result<&Thread> {
        self.thread(self.current)
    }

    pub fn current_thread_mut(&mut self) -> Result<&mut Thread> {
        let id = self.current;
        self.threads
            .get_mut(&id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    pub fn current_thread_id(&self) -> ThreadId {
        self.current
    }

    pub fn thread(&self, id: ThreadId) -> Result<&Thread> {
        self.threads
            .get(&id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.threads.keys().copied().collect()
    }

    pub fn spawn_thread(&mut self) -> Result<ThreadId> {
        let id = ThreadId(self.next_thread_id);
        self.next_thread_id = self
            .next_thread_id
            .checked_add(1)
            .ok_or_else(|| RuntimeError::AllocationFailed("thread ids exhausted".to_string()))?;
        self.threads
            .insert(id, Thread::with_config(id, &self.config));
        debug!(thread = %id, "spawned thread");
        Ok(id)
    }

    pub fn switch_to(&mut self, id: ThreadId) -> Result<()> {
        if !self.threads.contains_key(&id) {
            return Err(RuntimeError::NotFound(id.to_string()));
        }
        debug!(from = %self.current, to = %id, "switching thread");
        self.current = id;
        Ok(())
    }

    /// Destroys a non-main thread. If it was current, main becomes current.
    pub fn terminate_thread(&mut self, id: ThreadId) -> Result<()> {
        if id == ThreadId::MAIN {
            return Err(RuntimeError::OperationInvalid(
                "cannot terminate the main thread".to_string(),
            ));
        }
        self.threads
            .remove(&id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        self.pending.retain(|call| call.thread != id);
        if self.current == id {
            self.current = ThreadId::MAIN;
        }
        debug!(thread = %id, "terminated thread");
        Ok(())
    }

    /// Runs a global procedure on the main thread until it returns or faults.
    pub fn run(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        self.run_on(ThreadId::MAIN, name, args)
    }

    pub fn run_on(&mut self, id: ThreadId, name: &str, args: Vec<Value>) -> Result<Value> {
        let procedure = self.globals.procedure(name)?;
        self.execute_on(id, procedure, args)
    }

    /// Runs a procedure that need not be registered.
    pub fn run_procedure(&mut self, procedure: Rc<Procedure>, args: Vec<Value>) -> Result<Value> {
        self.execute_on(ThreadId::MAIN, procedure, args)
    }

    /// On a fault the thread's frames and registers are discarded and the
    /// callee chain is kept for [`ProcessState::last_backtrace`].
    fn execute_on(
        &mut self,
        id: ThreadId,
        procedure: Rc<Procedure>,
        args: Vec<Value>,
    ) -> Result<Value> {
        let mut thread = self
            .threads
            .remove(&id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut self.current, id);

        let result = Vm::new(
            &self.globals,
            &mut thread,
            &self.threads,
            &mut self.heap,
            &self.config,
        )
        .execute(procedure, args);

        if let Err(err) = &result {
            self.last_backtrace = thread.backtrace();
            warn!(thread = %id, code = err.code(), error = %err, "uncaught fault");
            thread.reset();
        }
        self.threads.insert(id, thread);
        self.current = previous;
        result
    }

    /// Queues `name` on a fresh thread; see [`ProcessState::run_pending`].
    pub fn spawn(&mut self, name: &str, args: Vec<Value>) -> Result<ThreadId> {
        self.globals.procedure(name)?;
        let thread = self.spawn_thread()?;
        self.pending.push_back(PendingCall {
            thread,
            procedure: name.to_string(),
            args,
        });
        Ok(thread)
    }

    /// Drives queued threads one at a time, in spawn order, each to
    /// completion. Finished threads are terminated.
    pub fn run_pending(&mut self) -> Vec<(ThreadId, Result<Value>)> {
        let mut results = Vec::new();
        while let Some(call) = self.pending.pop_front() {
            let result = self.run_on(call.thread, &call.procedure, call.args);
            if let Err(err) = self.terminate_thread(call.thread) {
                warn!(thread = %call.thread, error = %err, "could not terminate finished thread");
            }
            results.push((call.thread, result));
        }
        results
    }

    /// Callee chain, innermost first, of the most recent uncaught fault.
    pub fn last_backtrace(&self) -> &[String] {
        &self.last_backtrace
    }

    /// Completes the class if needed and allocates an instance.
    pub fn instantiate(&mut self, class_name: &str) -> Result<GcHandle> {
        let class = self.complete_class(class_name)?;
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.alloc_instance(&class)
    }

    pub fn heap(&self) -> &GcHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut GcHeap {
        &mut self.heap
    }

    /// Collects with every global and every thread as roots.
    pub fn collect_garbage(&mut self) {
        let mut roots: Vec<&dyn Trace> = vec![&self.globals as &dyn Trace];
        roots.extend(self.threads.values().map(|thread| thread as &dyn Trace));
        self.heap.collect(&roots);
    }
}

impl ClassResolver for ProcessState {
    fn resolve_class(&self, name: &str) -> Result<ClassRef> {
        self.globals.class(name)
    }
}

impl Trace for ProcessState {
    fn trace(&self, visitor: &mut dyn Visitor) {
        self.globals.trace(visitor);
        for thread in self.threads.values() {
            thread.trace(visitor);
        }
    }
}

/// Completes a registry-owned class, reporting re-entrant completion instead
/// of panicking on the borrow.
pub(crate) fn complete_registered(class: &ClassRef, globals: &Globals) -> Result<()> {
    if class.try_borrow().map(|c| c.is_complete()).unwrap_or(false) {
        return Ok(());
    }
    let mut descriptor = class.try_borrow_mut().map_err(|_| {
        RuntimeError::OperationInvalid("class is already being completed".to_string())
    })?;
    descriptor.complete(globals)
}
