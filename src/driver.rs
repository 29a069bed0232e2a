//! Multi-pass execution driver.
//!
//! Strictly ordered states: scan the source, resolve names and allocate
//! neuron space, define neuron records, count fanins, allocate fanin
//! arrays, emit fanin records, then optionally report. Every state
//! transition is gated on the message watermark; once the stop threshold
//! is crossed the run falls through to teardown.

use crate::alloc::index;
use crate::diagnostic::{MessageId, Severity};
use crate::record::NeuronRecord;
use crate::session::{ScopeEntry, Session};
use crate::storage::{PART_FANIN, PART_NEURON};
use crate::stmt;
use crate::sym::{SymbolId, SymbolKind};

pub struct Options {
    pub debug: u8,
    pub listing: bool,
    pub symtab: bool,
    /// Suppress the banner and message id prefixes. Diagnostics and the
    /// end-of-run summary still print.
    pub quiet: bool,
    /// Write output containers at teardown. Off for in-memory runs.
    pub flush: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            debug: 0,
            listing: false,
            symtab: false,
            quiet: false,
            flush: true,
        }
    }
}

/// Run every compilation state against an already-opened root source.
/// Returns true when no diagnostic reached the stop threshold.
pub fn run(s: &mut Session, opts: &Options) -> bool {
    s.debug = opts.debug;

    scan(s, opts.listing);
    if !s.msgs.stopped() {
        resolve(s);
    }
    if !s.msgs.stopped() {
        run_list(s, WorkList::Pass2);
    }
    if !s.msgs.stopped() {
        s.counting = true;
        run_list(s, WorkList::PassN);
        s.counting = false;
    }
    if !s.msgs.stopped() {
        allocate_fanins(s);
    }
    if !s.msgs.stopped() {
        run_list(s, WorkList::PassN);
    }
    if !s.msgs.stopped() && opts.symtab {
        crate::report::symbol_table(s);
    }

    // Teardown runs regardless of the watermark: partitions written so
    // far are flushed to their container files.
    if opts.flush {
        teardown(s);
    }
    !s.msgs.stopped()
}

/// State 0: read and dispatch every statement, includes and all.
fn scan(s: &mut Session, listing: bool) {
    loop {
        let stmt = match s.reader.next_statement(&s.sources, &mut s.msgs) {
            Some(stmt) => stmt,
            None => break,
        };
        if listing && !stmt.is_empty() {
            let origin = s.sources.origin(stmt.span);
            println!(
                "{:>5} {} {}",
                origin.line,
                s.sources.name(origin.file_id),
                String::from_utf8_lossy(&stmt.buf)
            );
        }
        stmt::dispatch(s, &stmt);
        if s.msgs.high_level >= Severity::Terminating {
            return;
        }
    }

    // Force-close anything left open, one diagnostic per block.
    while let Some(entry) = s.scopes.pop() {
        match entry {
            ScopeEntry::Begin(b) => s.report(
                MessageId::BeginUnclosed,
                b.span,
                "BEGIN without a matching END".to_string(),
            ),
            ScopeEntry::Do(_) => {
                let span = crate::span::Span::dummy();
                s.report(
                    MessageId::BeginUnclosed,
                    span,
                    "DO without a matching END".to_string(),
                );
            }
        }
    }

    if !s.entry_seen {
        s.report(
            MessageId::EntMissing,
            crate::span::Span::dummy(),
            "no ENTRY statement".to_string(),
        );
    }
}

/// State 1: replay scope operators, resolve forward references, then
/// give every external neuron symbol its base address.
fn resolve(s: &mut Session) {
    run_list(s, WorkList::Pass1);
    s.scopes.clear();
    if s.msgs.stopped() {
        return;
    }

    let neurons: Vec<SymbolId> = s
        .syms
        .ids()
        .filter(|&id| matches!(s.syms.get(id).kind, SymbolKind::Neuron(_)))
        .collect();
    for id in neurons {
        let (file, count, span) = match &s.syms.get(id).kind {
            SymbolKind::Neuron(n) => (n.file, n.count, s.syms.get(id).span),
            _ => continue,
        };
        let Some((base, wrapped)) = s.files.allocate(file, PART_NEURON, count) else {
            s.report(
                MessageId::BugNoOutputFile,
                span,
                "output file descriptor missing".to_string(),
            );
            continue;
        };
        if wrapped {
            s.report(MessageId::StoreFull, span, "file space full".to_string());
        }
        if let SymbolKind::Neuron(n) = &mut s.syms.get_mut(id).kind {
            n.addr = base;
        }
    }
}

/// Between count and emit: turn each neuron element's accumulated fanin
/// count into an allocated fanin array, then zero the count so the emit
/// pass can reuse the field as its running cursor.
fn allocate_fanins(s: &mut Session) {
    let neurons: Vec<SymbolId> = s
        .syms
        .ids()
        .filter(|&id| matches!(s.syms.get(id).kind, SymbolKind::Neuron(_)))
        .collect();
    for id in neurons {
        let (file, count, addr, span) = match &s.syms.get(id).kind {
            SymbolKind::Neuron(n) => (n.file, n.count, n.addr, s.syms.get(id).span),
            _ => continue,
        };
        for e in 0..count {
            let offset = index(addr, e, PART_NEURON);
            let mut rec: NeuronRecord = match s.store.read_pod(file, PART_NEURON, offset) {
                Ok(r) => r,
                Err(_) => {
                    s.report(
                        MessageId::StoreFault,
                        span,
                        "storage fault sizing fanin array".to_string(),
                    );
                    return;
                }
            };
            if rec.fanin_count == 0 {
                continue;
            }
            let Some((base, wrapped)) = s.files.allocate(file, PART_FANIN, rec.fanin_count as u64)
            else {
                s.report(
                    MessageId::BugNoOutputFile,
                    span,
                    "output file descriptor missing".to_string(),
                );
                continue;
            };
            if wrapped {
                s.report(MessageId::StoreFull, span, "file space full".to_string());
            }
            rec.fanin_vaddr = base;
            rec.fanin_count = 0;
            if s.store.write_pod(file, PART_NEURON, offset, &rec).is_err() {
                s.report(
                    MessageId::StoreFault,
                    span,
                    "storage fault sizing fanin array".to_string(),
                );
                return;
            }
        }
    }
}

enum WorkList {
    Pass1,
    Pass2,
    PassN,
}

/// Execute one worklist in queue order. The list is restored afterwards
/// since the late list is traversed twice.
fn run_list(s: &mut Session, which: WorkList) {
    let list = match which {
        WorkList::Pass1 => std::mem::take(&mut s.pass1),
        WorkList::Pass2 => std::mem::take(&mut s.pass2),
        WorkList::PassN => std::mem::take(&mut s.pass_n),
    };
    for op in &list {
        op.operate(s);
        if s.msgs.high_level >= Severity::Terminating {
            break;
        }
    }
    match which {
        WorkList::Pass1 => s.pass1 = list,
        WorkList::Pass2 => s.pass2 = list,
        WorkList::PassN => s.pass_n = list,
    }
}

/// Flush every output file's partitions to disk.
fn teardown(s: &mut Session) {
    let files: Vec<(u16, String)> = s
        .files
        .iter()
        .map(|(id, f)| (id, f.path.clone()))
        .collect();
    for (id, path) in files {
        if let Err(e) = s.store.flush_file(id, &path) {
            s.report(
                MessageId::StoreOpen,
                crate::span::Span::dummy(),
                format!("cannot write '{}': {}", path, e),
            );
        }
    }
}
