//! Scoped symbol table.
//!
//! All symbols live in one arena; two independent name indexes exist, the
//! *internal* table (loop variables, BEGIN group markers, visible only
//! during compilation) and the *external* table (neuron definitions,
//! visible to the storage layer). Both share the qualified-lookup
//! algorithm: an exact (qualifier, name) probe, then a climb outward along
//! the qualifier's named-group chain.

use std::collections::HashMap;

use crate::span::Span;

/// Index into the symbol arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Which name index a symbol is registered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Internal,
    External,
}

/// Maximum dimensionality of a neuron symbol.
pub const MAX_DIM: usize = 32;

/// Shared bound array for symbols declared with at most one dimension:
/// every bound is "unbounded". Immutable, referenced by every such symbol.
pub static DEFAULT_BOUNDS: [i32; MAX_DIM] = [i32::MAX; MAX_DIM];

/// Maximum qualifier depth accepted when building a fully-qualified name.
pub const MAX_QUALIFIER: usize = 32;

/// A BEGIN group marker. Named groups qualify the symbols declared inside
/// them; unnamed groups delegate to the innermost named ancestor.
#[derive(Clone, Debug)]
pub struct GroupSym {
    /// Innermost named group enclosing this one (the climb chain).
    pub parent_group: Option<SymbolId>,
    /// Output-file descriptor bound to this group.
    pub file: u16,
    /// Source file the BEGIN appeared in; the matching END must be in it.
    pub source_file: u16,
}

/// A neuron definition in the external table.
#[derive(Clone, Debug)]
pub struct NeuronSym {
    pub type_code: u16,
    /// Declared dimension count, 0 for a scalar.
    pub dim: usize,
    /// Per-dimension bounds; `None` selects `DEFAULT_BOUNDS`.
    pub bounds: Option<Vec<i32>>,
    /// Product of bounds (1 for a scalar), overflow-checked at parse time.
    pub count: u64,
    /// Output-file descriptor the neuron records are allocated in.
    pub file: u16,
    /// Base offset within the neuron partition, assigned during resolve.
    pub addr: u64,
    pub defined: bool,
    pub referenced: bool,
}

impl NeuronSym {
    pub fn bounds(&self) -> &[i32] {
        match &self.bounds {
            Some(b) => b,
            None => &DEFAULT_BOUNDS,
        }
    }
}

#[derive(Clone, Debug)]
pub enum SymbolKind {
    /// Mutable integer, mutated by the loop driver each iteration.
    Fixed { value: i32 },
    Group(GroupSym),
    Neuron(NeuronSym),
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    /// Named group this symbol was declared under; `None` at the root.
    pub qualifier: Option<SymbolId>,
    /// Declaration site, for diagnostics and the report pass.
    pub span: Span,
    pub kind: SymbolKind,
}

/// Distinct insertion failures; the caller picks the diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertError {
    BadName,
    Duplicate,
}

pub struct SymTab {
    syms: Vec<Symbol>,
    internal: HashMap<(Option<SymbolId>, String), SymbolId>,
    external: HashMap<(Option<SymbolId>, String), SymbolId>,
}

fn valid_name(name: &str) -> bool {
    if name.len() > crate::scan::MAX_SYMBOL {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SymTab {
    pub fn new() -> Self {
        Self {
            syms: Vec::new(),
            internal: HashMap::new(),
            external: HashMap::new(),
        }
    }

    fn index(&self, table: Table) -> &HashMap<(Option<SymbolId>, String), SymbolId> {
        match table {
            Table::Internal => &self.internal,
            Table::External => &self.external,
        }
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.syms[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.syms[id.0 as usize]
    }

    /// Every symbol id in arena order; the report pass scans this.
    pub fn ids(&self) -> impl Iterator<Item = SymbolId> {
        (0..self.syms.len() as u32).map(SymbolId)
    }

    pub fn insert(
        &mut self,
        table: Table,
        qualifier: Option<SymbolId>,
        name: &str,
        span: Span,
        kind: SymbolKind,
    ) -> Result<SymbolId, InsertError> {
        if !valid_name(name) {
            return Err(InsertError::BadName);
        }
        let key = (qualifier, name.to_string());
        let map = match table {
            Table::Internal => &mut self.internal,
            Table::External => &mut self.external,
        };
        if map.contains_key(&key) {
            return Err(InsertError::Duplicate);
        }
        let id = SymbolId(self.syms.len() as u32);
        self.syms.push(Symbol {
            name: name.to_string(),
            qualifier,
            span,
            kind,
        });
        match table {
            Table::Internal => self.internal.insert(key, id),
            Table::External => self.external.insert(key, id),
        };
        Ok(id)
    }

    /// Exact (qualifier, name) probe, no climbing.
    pub fn lookup_exact(
        &self,
        table: Table,
        qualifier: Option<SymbolId>,
        name: &str,
    ) -> Option<SymbolId> {
        self.index(table).get(&(qualifier, name.to_string())).copied()
    }

    /// Qualified lookup: exact probe at `qualifier`, then retry at each
    /// enclosing named group out to the root.
    pub fn locate(
        &self,
        table: Table,
        mut qualifier: Option<SymbolId>,
        name: &str,
    ) -> Option<SymbolId> {
        loop {
            if let Some(id) = self.lookup_exact(table, qualifier, name) {
                return Some(id);
            }
            match qualifier {
                None => return None,
                Some(q) => {
                    qualifier = match &self.get(q).kind {
                        SymbolKind::Group(g) => g.parent_group,
                        _ => None,
                    };
                }
            }
        }
    }

    /// Lookup of a possibly `::`-qualified name. A leading `::` anchors at
    /// the root; otherwise the first segment itself resolves by climbing
    /// from `qualifier`. Every segment but the last must name a group.
    pub fn locate_qualified(
        &self,
        table: Table,
        qualifier: Option<SymbolId>,
        full: &str,
    ) -> Option<SymbolId> {
        if !full.contains("::") {
            return self.locate(table, qualifier, full);
        }
        let mut segments = full.split("::").peekable();
        let mut scope = qualifier;
        let mut first = true;
        while let Some(seg) = segments.next() {
            if seg.is_empty() {
                // Leading "::": anchor at the root.
                if first {
                    scope = None;
                    first = false;
                    continue;
                }
                return None;
            }
            let last = segments.peek().is_none();
            if last {
                return self.lookup_exact(table, scope, seg);
            }
            // Qualifier segments live in the internal table as groups.
            let id = if first {
                self.locate(Table::Internal, scope, seg)?
            } else {
                self.lookup_exact(Table::Internal, scope, seg)?
            };
            first = false;
            match &self.get(id).kind {
                SymbolKind::Group(_) => scope = Some(id),
                _ => return None,
            }
        }
        None
    }

    /// Qualifier components of a symbol, innermost first. `None` when the
    /// chain exceeds `MAX_QUALIFIER`.
    pub fn qualifier_chain(&self, id: SymbolId) -> Option<Vec<&str>> {
        let mut chain = Vec::new();
        let mut q = self.get(id).qualifier;
        while let Some(g) = q {
            if chain.len() >= MAX_QUALIFIER {
                return None;
            }
            let sym = self.get(g);
            chain.push(sym.name.as_str());
            q = sym.qualifier;
        }
        Some(chain)
    }

    /// Display form, outermost qualifier first: `A::B::name`.
    pub fn qualified_name(&self, id: SymbolId) -> String {
        let mut parts = self.qualifier_chain(id).unwrap_or_default();
        parts.reverse();
        parts.push(self.get(id).name.as_str());
        parts.join("::")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(parent: Option<SymbolId>) -> SymbolKind {
        SymbolKind::Group(GroupSym {
            parent_group: parent,
            file: 0,
            source_file: 0,
        })
    }

    fn neuron() -> SymbolKind {
        SymbolKind::Neuron(NeuronSym {
            type_code: 29,
            dim: 0,
            bounds: None,
            count: 1,
            file: 0,
            addr: 0,
            defined: true,
            referenced: false,
        })
    }

    #[test]
    fn test_insert_validation() {
        let mut t = SymTab::new();
        assert_eq!(
            t.insert(Table::Internal, None, "9bad", Span::dummy(), neuron()),
            Err(InsertError::BadName)
        );
        t.insert(Table::Internal, None, "ok", Span::dummy(), neuron())
            .unwrap();
        assert_eq!(
            t.insert(Table::Internal, None, "ok", Span::dummy(), neuron()),
            Err(InsertError::Duplicate)
        );
        // Same name in the other table is a different symbol.
        t.insert(Table::External, None, "ok", Span::dummy(), neuron())
            .unwrap();
    }

    #[test]
    fn test_locate_climbs_group_chain() {
        let mut t = SymTab::new();
        let a = t
            .insert(Table::Internal, None, "A", Span::dummy(), group(None))
            .unwrap();
        let b = t
            .insert(Table::Internal, Some(a), "B", Span::dummy(), group(Some(a)))
            .unwrap();
        let x = t
            .insert(Table::External, Some(b), "x", Span::dummy(), neuron())
            .unwrap();
        let outer = t
            .insert(Table::External, None, "y", Span::dummy(), neuron())
            .unwrap();

        // Unqualified from inside B finds x; y is found by climbing out.
        assert_eq!(t.locate(Table::External, Some(b), "x"), Some(x));
        assert_eq!(t.locate(Table::External, Some(b), "y"), Some(outer));
        // x is invisible from outside B.
        assert_eq!(t.locate(Table::External, Some(a), "x"), None);
        assert_eq!(t.locate(Table::External, None, "x"), None);
    }

    #[test]
    fn test_locate_qualified() {
        let mut t = SymTab::new();
        let a = t
            .insert(Table::Internal, None, "A", Span::dummy(), group(None))
            .unwrap();
        let b = t
            .insert(Table::Internal, Some(a), "B", Span::dummy(), group(Some(a)))
            .unwrap();
        let x = t
            .insert(Table::External, Some(b), "x", Span::dummy(), neuron())
            .unwrap();

        assert_eq!(t.locate_qualified(Table::External, None, "A::B::x"), Some(x));
        assert_eq!(
            t.locate_qualified(Table::External, Some(b), "::A::B::x"),
            Some(x)
        );
        // Same symbol instance as the unqualified lookup from inside B.
        assert_eq!(
            t.locate_qualified(Table::External, Some(b), "x"),
            t.locate_qualified(Table::External, None, "A::B::x")
        );
        assert_eq!(t.locate_qualified(Table::External, None, "A::x"), None);
        assert_eq!(t.qualified_name(x), "A::B::x");
    }
}
