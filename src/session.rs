//! Per-compilation state.
//!
//! One `Session` is constructed for each compiler invocation and passed
//! explicitly into every component; nothing in the crate holds global
//! state, so many small compilations can run in one process.

use crate::alloc::FileTable;
use crate::diagnostic::{MessageId, Messages};
use crate::op::{NeuronRef, Op, RefId};
use crate::reader::Reader;
use crate::span::{SourceMap, Span};
use crate::storage::Store;
use crate::sym::{SymTab, SymbolId};

/// A BEGIN block on the scope stack.
#[derive(Clone, Debug)]
pub struct BeginScope {
    /// Named group symbol for qualifier resolution; `None` for an
    /// anonymous block, which delegates to the enclosing named group.
    pub group: Option<SymbolId>,
    /// Output-file descriptor active inside this block.
    pub file: u16,
    /// Source file the BEGIN appeared in; the matching END must be there.
    pub source_file: u16,
    /// Most recently declared NEURON, the implicit FANIN/ENTRY target.
    pub default_neuron: Option<SymbolId>,
    pub span: Span,
}

/// A DO block on the scope stack.
#[derive(Clone, Copy, Debug)]
pub struct DoScope {
    /// Position of the loop operator in the late worklist; everything
    /// queued after it is spliced into the loop body at END.
    pub op_index: usize,
}

#[derive(Clone, Debug)]
pub enum ScopeEntry {
    Begin(BeginScope),
    Do(DoScope),
}

pub struct Session {
    pub sources: SourceMap,
    pub msgs: Messages,
    pub reader: Reader,
    pub syms: SymTab,
    pub files: FileTable,
    pub store: Store,

    /// Neuron address references, patched in place by deferred resolution.
    pub refs: Vec<NeuronRef>,
    /// Pass-1 worklist: scope replay and deferred resolution.
    pub pass1: Vec<Op>,
    /// Pass-2 worklist: neuron definition.
    pub pass2: Vec<Op>,
    /// Late worklist, traversed twice: fanin count, then fanin emit.
    pub pass_n: Vec<Op>,

    pub scopes: Vec<ScopeEntry>,
    /// Default neuron at the outermost level, outside any BEGIN.
    root_default_neuron: Option<SymbolId>,
    /// Output file used outside any BEGIN FILE block.
    pub default_file: u16,
    pub entry_seen: bool,

    /// Set during the fanin-count traversal, cleared for emit.
    pub counting: bool,
    pub debug: u8,
}

impl Session {
    /// `default_output` names the file bound outside any BEGIN FILE
    /// clause, conventionally the input stem with a `.000` suffix.
    pub fn new(default_output: &str, render: bool) -> Self {
        let mut files = FileTable::new();
        let (default_file, _) = files.open(default_output, "");
        Self {
            sources: SourceMap::new(),
            msgs: Messages::new(render),
            reader: Reader::new(),
            syms: SymTab::new(),
            files,
            store: Store::new(),
            refs: Vec::new(),
            pass1: Vec::new(),
            pass2: Vec::new(),
            pass_n: Vec::new(),
            scopes: Vec::new(),
            root_default_neuron: None,
            default_file,
            entry_seen: false,
            counting: false,
            debug: 0,
        }
    }

    pub fn report(&mut self, id: MessageId, span: Span, message: String) {
        self.msgs.report(&self.sources, id, span, message);
    }

    /// Innermost named group, the qualifier for new symbols and the start
    /// of qualified lookups.
    pub fn current_group(&self) -> Option<SymbolId> {
        for entry in self.scopes.iter().rev() {
            if let ScopeEntry::Begin(b) = entry {
                if b.group.is_some() {
                    return b.group;
                }
            }
        }
        None
    }

    /// Output file active at the current scope.
    pub fn current_file(&self) -> u16 {
        for entry in self.scopes.iter().rev() {
            if let ScopeEntry::Begin(b) = entry {
                return b.file;
            }
        }
        self.default_file
    }

    pub fn default_neuron(&self) -> Option<SymbolId> {
        for entry in self.scopes.iter().rev() {
            if let ScopeEntry::Begin(b) = entry {
                return b.default_neuron;
            }
        }
        self.root_default_neuron
    }

    pub fn set_default_neuron(&mut self, id: SymbolId) {
        for entry in self.scopes.iter_mut().rev() {
            if let ScopeEntry::Begin(b) = entry {
                b.default_neuron = Some(id);
                return;
            }
        }
        self.root_default_neuron = Some(id);
    }

    pub fn push_ref(&mut self, r: NeuronRef) -> RefId {
        let id = RefId(self.refs.len() as u32);
        self.refs.push(r);
        id
    }

    pub fn neuron_ref(&self, id: RefId) -> &NeuronRef {
        &self.refs[id.0 as usize]
    }

    pub fn neuron_ref_mut(&mut self, id: RefId) -> &mut NeuronRef {
        &mut self.refs[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sym::{GroupSym, SymbolKind, Table};

    #[test]
    fn test_scope_defaults() {
        let mut s = Session::new("test.000", false);
        assert_eq!(s.current_file(), s.default_file);
        assert_eq!(s.current_group(), None);
        assert_eq!(s.default_neuron(), None);

        let g = s
            .syms
            .insert(
                Table::Internal,
                None,
                "A",
                Span::dummy(),
                SymbolKind::Group(GroupSym {
                    parent_group: None,
                    file: s.default_file,
                    source_file: 0,
                }),
            )
            .unwrap();
        let (other, _) = s.files.open("other.000", "");
        s.scopes.push(ScopeEntry::Begin(BeginScope {
            group: Some(g),
            file: other,
            source_file: 0,
            default_neuron: None,
            span: Span::dummy(),
        }));
        // Anonymous block under A: group delegates, file binds.
        s.scopes.push(ScopeEntry::Begin(BeginScope {
            group: None,
            file: other,
            source_file: 0,
            default_neuron: None,
            span: Span::dummy(),
        }));
        assert_eq!(s.current_group(), Some(g));
        assert_eq!(s.current_file(), other);
    }
}
