use std::{
    cell::RefCell,
    fmt::Write as _,
    rc::{Rc, Weak},
};

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::runtime::{
    error::{Result, RuntimeError},
    gc::{Trace, Visitor},
    procedure::{MemberKind, Method, Procedure},
};

/// Shared handle to a registered class. The registry owns the strong
/// reference; subclasses keep a weak back-reference to their parent.
pub type ClassRef = Rc<RefCell<ClassDescriptor>>;

/// Resolves a parent class by name during completion.
pub trait ClassResolver {
    fn resolve_class(&self, name: &str) -> Result<ClassRef>;
}

/// One entry of a completed class's flat dispatch table.
#[derive(Debug, Clone)]
pub struct DispatchSlot {
    pub name: String,
    /// Class that declared the member occupying this slot.
    pub owner: String,
    pub kind: MemberKind,
    pub procedure: Rc<Procedure>,
}

#[derive(Debug, Clone, Default)]
struct Layout {
    /// Visible variable name -> field index. A redeclared name points at the
    /// newest slot.
    variables: IndexMap<String, usize>,
    /// Field index -> (name, declaring class).
    slots: Vec<(String, String)>,
    methods: IndexMap<String, usize>,
    dispatch: Vec<DispatchSlot>,
}

/// Runtime representation of a declared type.
///
/// A descriptor is built incrementally with `add_*` and then completed, which
/// assigns instance-variable indices and dispatch indices across the whole
/// ancestor chain. Once complete the layout never changes.
#[derive(Debug)]
pub struct ClassDescriptor {
    name: String,
    parent_name: Option<String>,
    parent: Option<Weak<RefCell<ClassDescriptor>>>,
    variables: IndexSet<String>,
    members: IndexMap<String, Method>,
    complete: bool,
    layout: Layout,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            name: name.into(),
            parent_name: parent.map(str::to_string),
            parent: None,
            variables: IndexSet::new(),
            members: IndexMap::new(),
            complete: false,
            layout: Layout::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }

    /// Resolved parent; `None` before completion or for a root class.
    pub fn parent(&self) -> Option<ClassRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Declared (non-inherited) variable names in declaration order.
    pub fn declared_variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// Declared (non-inherited) members in declaration order.
    pub fn members(&self) -> impl Iterator<Item = &Method> {
        self.members.values()
    }

    pub fn add_variable(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.ensure_open("variable", &name)?;
        if self.variables.contains(&name) {
            return Err(self.duplicate(name));
        }
        self.variables.insert(name);
        Ok(())
    }

    pub fn add_method(&mut self, procedure: impl Into<Rc<Procedure>>) -> Result<()> {
        self.add_member(Method::new(procedure, MemberKind::Method))
    }

    /// Constructors share the member namespace and dispatch index space with
    /// methods.
    pub fn add_constructor(&mut self, procedure: impl Into<Rc<Procedure>>) -> Result<()> {
        self.add_member(Method::new(procedure, MemberKind::Constructor))
    }

    fn add_member(&mut self, member: Method) -> Result<()> {
        self.ensure_open(&member.kind().to_string(), member.name())?;
        if self.members.contains_key(member.name()) {
            return Err(self.duplicate(member.name().to_string()));
        }
        self.members.insert(member.name().to_string(), member);
        Ok(())
    }

    fn ensure_open(&self, what: &str, name: &str) -> Result<()> {
        if self.complete {
            return Err(RuntimeError::OperationInvalid(format!(
                "cannot add {} `{}` to completed class {}",
                what, name, self.name
            )));
        }
        Ok(())
    }

    fn duplicate(&self, member: String) -> RuntimeError {
        RuntimeError::DuplicateMember {
            class: self.name.clone(),
            member,
        }
    }

    /// Assigns variable and dispatch indices, completing the parent first.
    ///
    /// Returns immediately when already complete. On failure the descriptor is
    /// left untouched and may be completed again later.
    pub fn complete<R: ClassResolver + ?Sized>(&mut self, registry: &R) -> Result<()> {
        let mut chain = Vec::new();
        self.complete_in(registry, &mut chain)
    }

    fn complete_in<R: ClassResolver + ?Sized>(
        &mut self,
        registry: &R,
        chain: &mut Vec<String>,
    ) -> Result<()> {
        if self.complete {
            return Ok(());
        }
        chain.push(self.name.clone());

        let (parent, mut layout) = match self.parent_name.clone() {
            None => (None, Layout::default()),
            Some(parent_name) => {
                if chain.contains(&parent_name) {
                    let mut cycle = chain.clone();
                    cycle.push(parent_name);
                    return Err(RuntimeError::ExtensionCycle { chain: cycle });
                }
                let parent = registry.resolve_class(&parent_name)?;
                let layout = {
                    let mut descriptor = parent.try_borrow_mut().map_err(|_| {
                        RuntimeError::OperationInvalid(format!(
                            "class {} is already being completed",
                            parent_name
                        ))
                    })?;
                    descriptor.complete_in(registry, chain)?;
                    descriptor.layout.clone()
                };
                (Some(parent), layout)
            }
        };

        for variable in &self.variables {
            let index = layout.slots.len();
            layout.slots.push((variable.clone(), self.name.clone()));
            layout.variables.insert(variable.clone(), index);
        }

        for (name, member) in self.members.iter_mut() {
            let slot = DispatchSlot {
                name: name.clone(),
                owner: self.name.clone(),
                kind: member.kind(),
                procedure: member.procedure().clone(),
            };
            let index = match layout.methods.get(name) {
                Some(&inherited) => {
                    layout.dispatch[inherited] = slot;
                    inherited
                }
                None => {
                    let index = layout.dispatch.len();
                    layout.dispatch.push(slot);
                    layout.methods.insert(name.clone(), index);
                    index
                }
            };
            member.assign_index(index);
        }

        self.parent = parent.as_ref().map(Rc::downgrade);
        self.layout = layout;
        self.complete = true;
        debug!(
            class = %self.name,
            variables = self.layout.slots.len(),
            methods = self.layout.dispatch.len(),
            "class completed"
        );
        Ok(())
    }

    /// Own plus inherited instance variables; zero before completion.
    pub fn variable_count(&self) -> usize {
        self.layout.slots.len()
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.layout.variables.get(name).copied()
    }

    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.layout.methods.get(name).copied()
    }

    pub fn method_count(&self) -> usize {
        self.layout.dispatch.len()
    }

    /// A member declared on this class (not inherited).
    pub fn member(&self, name: &str) -> Option<&Method> {
        self.members.get(name)
    }

    /// Resolves a visible member, inherited or declared, by name.
    pub fn lookup_method(&self, name: &str) -> Option<&DispatchSlot> {
        self.method_index(name)
            .and_then(|index| self.layout.dispatch.get(index))
    }

    pub fn dispatch(&self, index: usize) -> Option<&DispatchSlot> {
        self.layout.dispatch.get(index)
    }

    /// Human-readable layout listing.
    pub fn describe(&self) -> String {
        let mut out = format!("class {}", self.name);
        if let Some(parent) = &self.parent_name {
            let _ = write!(out, " extends {}", parent);
        }
        if !self.complete {
            out.push_str(" (incomplete)\n");
            return out;
        }
        out.push('\n');
        out.push_str("  variables:\n");
        for (index, (name, owner)) in self.layout.slots.iter().enumerate() {
            let _ = writeln!(out, "    {} {} ({})", index, name, owner);
        }
        out.push_str("  dispatch:\n");
        for (index, slot) in self.layout.dispatch.iter().enumerate() {
            let _ = writeln!(
                out,
                "    {} {} ({}, {})",
                index, slot.name, slot.kind, slot.owner
            );
        }
        out
    }
}

impl Trace for ClassDescriptor {
    fn trace(&self, visitor: &mut dyn Visitor) {
        for member in self.members.values() {
            member.trace(visitor);
        }
    }
}
