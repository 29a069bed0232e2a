//! Symbol-table report.
//!
//! Dumps every external neuron symbol twice: ordered by (file, offset)
//! and ordered by fully-qualified name. The name order compares qualifier
//! components innermost first. The table has no native ordering, so each
//! dump repeatedly scans for the next-larger key; fine for compiler-time
//! tooling.

use crate::diagnostic::MessageId;
use crate::session::Session;
use crate::sym::{NeuronSym, SymbolId, SymbolKind};

pub fn symbol_table(s: &mut Session) {
    let neurons: Vec<SymbolId> = s
        .syms
        .ids()
        .filter(|&id| matches!(s.syms.get(id).kind, SymbolKind::Neuron(_)))
        .collect();

    println!("--- Neurons by address ---");
    let mut remaining = neurons.clone();
    while !remaining.is_empty() {
        let mut best = 0;
        for i in 1..remaining.len() {
            if addr_key(s, remaining[i]) < addr_key(s, remaining[best]) {
                best = i;
            }
        }
        let id = remaining.swap_remove(best);
        print_neuron(s, id);
    }

    println!("--- Neurons by name ---");
    let mut keyed: Vec<(Vec<String>, SymbolId)> = Vec::new();
    for &id in &neurons {
        match name_key(s, id) {
            Some(key) => keyed.push((key, id)),
            None => {
                let span = s.syms.get(id).span;
                s.report(
                    MessageId::SymDepth,
                    span,
                    "qualifier depth exceeded in report".to_string(),
                );
            }
        }
    }
    while !keyed.is_empty() {
        let mut best = 0;
        for i in 1..keyed.len() {
            if keyed[i].0 < keyed[best].0 {
                best = i;
            }
        }
        let (_, id) = keyed.swap_remove(best);
        print_neuron(s, id);
    }
}

fn addr_key(s: &Session, id: SymbolId) -> (u16, u64) {
    match &s.syms.get(id).kind {
        SymbolKind::Neuron(n) => (n.file, n.addr),
        _ => (u16::MAX, u64::MAX),
    }
}

/// Name plus qualifier components, innermost first. `None` when the
/// qualifier chain is deeper than the report supports.
fn name_key(s: &Session, id: SymbolId) -> Option<Vec<String>> {
    let mut key = vec![s.syms.get(id).name.clone()];
    for part in s.syms.qualifier_chain(id)? {
        key.push(part.to_string());
    }
    Some(key)
}

fn print_neuron(s: &Session, id: SymbolId) {
    let sym = s.syms.get(id);
    let n = match &sym.kind {
        SymbolKind::Neuron(n) => n,
        _ => return,
    };
    println!(
        "file {:>3} +{:08x} x{:<6} type {:>3}{} {}",
        n.file,
        n.addr,
        n.count,
        n.type_code,
        flags(n),
        s.syms.qualified_name(id)
    );
}

fn flags(n: &NeuronSym) -> &'static str {
    match (n.defined, n.referenced) {
        (true, true) => " DR",
        (true, false) => " D-",
        (false, true) => " -R",
        (false, false) => " --",
    }
}
