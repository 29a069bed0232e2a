//! Compile-time operators.
//!
//! Statement handlers do not act on storage directly; they queue `Op`
//! values onto one of three ordered worklists and the driver executes
//! each list in pass order. An `Op` captures everything its action needs,
//! independent of the statement text that produced it.

use crate::alloc::{element_number, index, DimError};
use crate::diagnostic::MessageId;
use crate::expr::{fixed_value, set_fixed, BinOp, Expr};
use crate::record::{FaninRecord, NeuronRecord, PsvRecord};
use crate::session::{BeginScope, ScopeEntry, Session};
use crate::span::Span;
use crate::storage::{PART_CONTROL, PART_FANIN, PART_NEURON};
use crate::sym::{SymbolId, SymbolKind, Table};

/// Index into the session's neuron-reference arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefId(pub u32);

/// A neuron storage address as written in source: a (possibly qualified)
/// name plus deferred per-dimension index expressions. `sym` is filled at
/// parse time when the name is already known, otherwise by a deferred
/// resolution operator on pass 1.
#[derive(Clone, Debug)]
pub struct NeuronRef {
    pub name: String,
    /// Named group at the reference site, for the deferred lookup.
    pub qualifier: Option<SymbolId>,
    pub sym: Option<SymbolId>,
    pub indexes: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Op {
    /// Replay a BEGIN scope push (pass 1).
    Begin(BeginScope),
    /// Replay the matching END (pass 1).
    End { span: Span },
    /// Deferred forward-reference resolution (pass 1).
    Resolve { target: RefId },
    /// Write one neuron symbol's zeroed records (pass 2).
    Neuron {
        sym: SymbolId,
        value: Option<Expr>,
        span: Span,
    },
    /// Count, then emit, one fanin record (late passes).
    Fanin {
        fetch: RefId,
        store: RefId,
        weight: Expr,
        span: Span,
    },
    /// DO loop controller; the body is re-executed per iteration.
    For {
        var: SymbolId,
        init: Expr,
        to: Expr,
        by: Expr,
        body: Vec<Op>,
        span: Span,
    },
    /// Write the process state vector (late emit pass only).
    Entry { target: RefId, span: Span },
    /// Development trace marker.
    Debug { span: Span },
}

impl Op {
    pub fn operate(&self, s: &mut Session) {
        match self {
            Op::Begin(scope) => s.scopes.push(ScopeEntry::Begin(scope.clone())),
            Op::End { span } => {
                if s.scopes.pop().is_none() {
                    s.report(
                        MessageId::BugScopeStack,
                        *span,
                        "scope stack underflow during replay".to_string(),
                    );
                }
            }
            Op::Resolve { target } => resolve_deferred(s, *target),
            Op::Neuron { sym, value, span } => define_neuron(s, *sym, value.as_ref(), *span),
            Op::Fanin {
                fetch,
                store,
                weight,
                span,
            } => {
                if s.counting {
                    count_fanin(s, *store, *span);
                } else {
                    emit_fanin(s, *fetch, *store, weight, *span);
                }
            }
            Op::For {
                var,
                init,
                to,
                by,
                body,
                span,
            } => run_loop(s, *var, init, to, by, body, *span),
            Op::Entry { target, span } => {
                if !s.counting {
                    emit_entry(s, *target, *span);
                }
            }
            Op::Debug { span } => {
                if s.debug > 0 {
                    let origin = s.sources.origin(*span);
                    println!(
                        "*DEBUG* {}:{}",
                        s.sources.name(origin.file_id),
                        origin.line
                    );
                }
            }
        }
    }
}

/// Re-resolve a forward reference now that every declaration is known.
fn resolve_deferred(s: &mut Session, target: RefId) {
    let (name, qualifier, span, dims) = {
        let nr = s.neuron_ref(target);
        if nr.sym.is_some() {
            return;
        }
        (
            nr.name.clone(),
            nr.qualifier,
            nr.span,
            nr.indexes.len(),
        )
    };
    match s.syms.locate_qualified(Table::External, qualifier, &name) {
        Some(id) => {
            if let SymbolKind::Neuron(n) = &s.syms.get(id).kind {
                if n.dim != dims {
                    s.report(
                        MessageId::DimMismatch,
                        span,
                        format!("'{}' has {} dimensions, referenced with {}", name, n.dim, dims),
                    );
                    return;
                }
            }
            if let SymbolKind::Neuron(n) = &mut s.syms.get_mut(id).kind {
                n.referenced = true;
            }
            s.neuron_ref_mut(target).sym = Some(id);
        }
        None => s.report(
            MessageId::SymNotFound,
            span,
            format!("symbol not found: '{}'", name),
        ),
    }
}

/// Resolve a neuron reference to its (file, neuron-partition offset)
/// address, evaluating any index expressions against the declared bounds.
pub fn resolve_addr(s: &mut Session, target: RefId) -> Option<(u16, u64)> {
    let (sym, indexes, span, name) = {
        let nr = s.neuron_ref(target);
        (nr.sym, nr.indexes.clone(), nr.span, nr.name.clone())
    };
    let sym = match sym {
        Some(id) => id,
        None => {
            s.report(
                MessageId::SymNotFound,
                span,
                format!("symbol not found: '{}'", name),
            );
            return None;
        }
    };

    let mut vals = Vec::with_capacity(indexes.len());
    for e in &indexes {
        let v = e.eval(&mut s.syms, &s.sources, &mut s.msgs, span);
        vals.push(v.as_fixed());
    }

    let (bounds, dim, addr, file) = match &s.syms.get(sym).kind {
        SymbolKind::Neuron(n) => (n.bounds().to_vec(), n.dim, n.addr, n.file),
        _ => return None,
    };
    match element_number(&bounds, dim, &vals) {
        Ok(e) => Some((file, index(addr, e, PART_NEURON))),
        Err(DimError::Mismatch) => {
            s.report(
                MessageId::DimMismatch,
                span,
                format!("'{}' has {} dimensions, referenced with {}", name, dim, vals.len()),
            );
            None
        }
        Err(DimError::Range(i)) => {
            s.report(
                MessageId::DimRange,
                span,
                format!("index {} of '{}' out of range", i + 1, name),
            );
            None
        }
    }
}

fn define_neuron(s: &mut Session, sym: SymbolId, value: Option<&Expr>, span: Span) {
    let (type_code, count, addr, file) = match &s.syms.get(sym).kind {
        SymbolKind::Neuron(n) => (n.type_code, n.count, n.addr, n.file),
        _ => return,
    };
    let v = match value {
        Some(e) => e.eval(&mut s.syms, &s.sources, &mut s.msgs, span).as_float() as f32,
        None => 0.0,
    };
    let rec = NeuronRecord::new(type_code, v);
    for e in 0..count {
        if s.store
            .write_pod(file, PART_NEURON, index(addr, e, PART_NEURON), &rec)
            .is_err()
        {
            s.report(
                MessageId::StoreFault,
                span,
                "storage fault writing neuron record".to_string(),
            );
            return;
        }
    }
}

fn count_fanin(s: &mut Session, store: RefId, span: Span) {
    let Some((file, offset)) = resolve_addr(s, store) else {
        return;
    };
    if s.store
        .update_pod::<NeuronRecord>(file, PART_NEURON, offset, |r| r.fanin_count += 1)
        .is_err()
    {
        s.report(
            MessageId::StoreFault,
            span,
            "storage fault counting fanin".to_string(),
        );
    }
}

fn emit_fanin(s: &mut Session, fetch: RefId, store: RefId, weight: &Expr, span: Span) {
    let Some((sfile, soff)) = resolve_addr(s, store) else {
        return;
    };
    let Some((ffile, foff)) = resolve_addr(s, fetch) else {
        return;
    };
    let w = weight.eval(&mut s.syms, &s.sources, &mut s.msgs, span).as_float() as f32;

    let rec: NeuronRecord = match s.store.read_pod(sfile, PART_NEURON, soff) {
        Ok(r) => r,
        Err(_) => {
            s.report(
                MessageId::StoreFault,
                span,
                "storage fault reading neuron record".to_string(),
            );
            return;
        }
    };
    // fanin_count is the running emit cursor here; the allocation step
    // between the count and emit passes reset it to zero.
    let slot = index(rec.fanin_vaddr, rec.fanin_count as u64, PART_FANIN);
    let fanin = FaninRecord {
        neuron: foff,
        file_id: ffile,
        _pad0: 0,
        weight: w,
    };
    let fault = s.store.write_pod(sfile, PART_FANIN, slot, &fanin).is_err()
        || s.store
            .update_pod::<NeuronRecord>(sfile, PART_NEURON, soff, |r| r.fanin_count += 1)
            .is_err();
    if fault {
        s.report(
            MessageId::StoreFault,
            span,
            "storage fault writing fanin record".to_string(),
        );
    }
}

fn emit_entry(s: &mut Session, target: RefId, span: Span) {
    let Some((file, offset)) = resolve_addr(s, target) else {
        return;
    };
    let psv = PsvRecord::new(file, PART_NEURON, offset);
    if s.store.write_pod(file, PART_CONTROL, 0, &psv).is_err() {
        s.report(
            MessageId::StoreFault,
            span,
            "storage fault writing process state vector".to_string(),
        );
    }
}

fn run_loop(
    s: &mut Session,
    var: SymbolId,
    init: &Expr,
    to: &Expr,
    by: &Expr,
    body: &[Op],
    span: Span,
) {
    let start = init.eval(&mut s.syms, &s.sources, &mut s.msgs, span).as_fixed();
    let limit = to.eval(&mut s.syms, &s.sources, &mut s.msgs, span).as_fixed();
    let step = by.eval(&mut s.syms, &s.sources, &mut s.msgs, span).as_fixed();
    if step == 0 {
        s.report(
            MessageId::DoZeroBy,
            span,
            "zero loop increment, loop does not execute".to_string(),
        );
        return;
    }
    set_fixed(&mut s.syms, var, start);

    let advance = match step {
        1 => Expr::Inc(var),
        -1 => Expr::Dec(var),
        _ => Expr::Set(
            var,
            Box::new(Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Get(var)),
                Box::new(Expr::fixed(step)),
            )),
        ),
    };
    loop {
        let v = fixed_value(&s.syms, var);
        let done = if step > 0 { v > limit } else { v < limit };
        if done {
            break;
        }
        for op in body {
            op.operate(s);
        }
        advance.eval(&mut s.syms, &s.sources, &mut s.msgs, span);
    }
}
