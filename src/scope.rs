use std::fmt;

use fnv::FnvHashMap;

use crate::common::ValueType;

// copied into every child scope
pub const PROMOTED_PREFIX: char = '^';

pub const MAX_LOCALS: &str = "^MAX LOCALS";

const CONTINUE_KEY: &str = "NEXT LOOP";
const BREAK_KEY: &str = "EXIT LOOP";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub base: String,
    pub suffix: u32,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.base.replace(' ', "_"), self.suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Count(u16),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    LocalSlot(u16, ValueType),
    Label(Label),
    Constant(Constant),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopLabel {
    Continue,
    Break,
}

impl LoopLabel {
    fn key(self) -> &'static str {
        match self {
            LoopLabel::Continue => CONTINUE_KEY,
            LoopLabel::Break => BREAK_KEY,
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    bindings: FnvHashMap<String, Binding>,
    next_slot: u16,
}

impl Scope {
    fn child_of(parent: &Scope) -> Self {
        let bindings = parent
            .bindings
            .iter()
            .filter(|(name, _)| name.starts_with(PROMOTED_PREFIX))
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect();
        Self {
            bindings,
            next_slot: parent.next_slot,
        }
    }

    fn peak(&self) -> u16 {
        match self.bindings.get(MAX_LOCALS) {
            Some(Binding::Constant(Constant::Count(max))) => (*max).max(self.next_slot),
            _ => self.next_slot,
        }
    }
}

#[derive(Debug)]
pub struct ScopeStack {
    root: Scope,
    inner: Vec<Scope>,
    next_label: u32,
}

impl ScopeStack {
    pub fn new() -> Self {
        let mut root = Scope::default();
        root.bindings
            .insert(MAX_LOCALS.to_string(), Binding::Constant(Constant::Count(0)));
        Self {
            root,
            inner: Vec::new(),
            next_label: 0,
        }
    }

    fn current(&self) -> &Scope {
        self.inner.last().unwrap_or(&self.root)
    }

    fn current_mut(&mut self) -> &mut Scope {
        match self.inner.last_mut() {
            Some(scope) => scope,
            None => &mut self.root,
        }
    }

    pub fn depth(&self) -> usize {
        self.inner.len()
    }

    pub fn begin_scope(&mut self) -> () {
        let child = Scope::child_of(self.current());
        self.inner.push(child);
        tracing::trace!(depth = self.depth(), "begin scope");
    }

    pub fn end_scope(&mut self) -> () {
        let child = match self.inner.pop() {
            Some(child) => child,
            None => {
                tracing::warn!("end_scope called on the function root");
                return;
            }
        };
        let peak = child.peak();
        let parent = self.current_mut();
        parent.next_slot = parent.next_slot.max(child.next_slot);
        let folded = parent.peak().max(peak);
        parent
            .bindings
            .insert(MAX_LOCALS.to_string(), Binding::Constant(Constant::Count(folded)));
        tracing::trace!(depth = self.depth(), peak, "end scope");
    }

    pub fn declare_local(&mut self, name: &str, value_type: ValueType) -> Binding {
        let scope = self.current_mut();
        let binding = Binding::LocalSlot(scope.next_slot, value_type);
        scope.next_slot += 1;
        scope.bindings.insert(name.to_string(), binding.clone());
        binding
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.inner
            .iter()
            .rev()
            .chain(std::iter::once(&self.root))
            .find_map(|scope| scope.bindings.get(name))
    }

    pub fn new_label(&mut self, base: &str) -> Label {
        let label = Label {
            base: base.to_string(),
            suffix: self.next_label,
        };
        self.next_label += 1;
        label
    }

    pub fn set_loop_labels(&mut self, continue_label: &Label, break_label: &Label) -> () {
        let scope = self.current_mut();
        scope.bindings.insert(
            LoopLabel::Continue.key().to_string(),
            Binding::Label(continue_label.clone()),
        );
        scope
            .bindings
            .insert(LoopLabel::Break.key().to_string(), Binding::Label(break_label.clone()));
    }

    pub fn loop_label(&self, kind: LoopLabel) -> Option<&Label> {
        match self.lookup(kind.key()) {
            Some(Binding::Label(label)) => Some(label),
            _ => None,
        }
    }

    pub fn promote(&mut self, name: &str, value: Constant) -> () {
        let key = if name.starts_with(PROMOTED_PREFIX) {
            name.to_string()
        } else {
            format!("{}{}", PROMOTED_PREFIX, name)
        };
        self.current_mut().bindings.insert(key, Binding::Constant(value));
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        match self.current().bindings.get(name) {
            Some(Binding::Constant(value)) => Some(value),
            _ => None,
        }
    }

    pub fn finish(mut self) -> u16 {
        while !self.inner.is_empty() {
            self.end_scope();
        }
        self.root.peak()
    }
}
