//! Statement handlers.
//!
//! The dispatcher routes one assembled statement to the handler for its
//! leading keyword. Handlers share one shape: scan clause words, validate
//! cross-clause consistency, queue a compile-time operator, and for BEGIN
//! and END also apply the scope effect immediately so later statements in
//! the same source resolve against the current scope.
//!
//! Handlers report diagnostics at the point of detection and return a
//! sentinel `Err(())`; the dispatcher abandons only the current statement
//! so one malformed statement does not hide later ones.

pub mod begin;
pub mod do_loop;
pub mod end;
pub mod entry;
pub mod fanin;
pub mod neuron;

use crate::diagnostic::MessageId;
use crate::expr::{self, Expr, ExprEnv, Terminator};
use crate::op::{NeuronRef, Op, RefId};
use crate::reader::Statement;
use crate::scan::{extract_string, next_word, peek, skip_blanks, StringError};
use crate::session::Session;
use crate::span::Span;
use crate::sym::{SymbolKind, Table};

/// Route one statement to its handler. Parse failures have already been
/// reported; the statement is simply dropped.
pub fn dispatch(s: &mut Session, stmt: &Statement) {
    if stmt.is_empty() {
        return;
    }
    if stmt.is_control() {
        control(s, stmt);
        return;
    }
    if s.debug >= 2 {
        s.pass_n.push(Op::Debug { span: stmt.span });
    }
    let (pos, word) = next_word(&stmt.buf, 0);
    let result = match word.to_ascii_uppercase().as_str() {
        "BEGIN" => begin::parse(s, stmt, pos),
        "END" => end::parse(s, stmt, pos),
        "DO" => do_loop::parse(s, stmt, pos),
        "NEURON" => neuron::parse(s, stmt, pos),
        "CONSTANT" => neuron::parse_constant(s, stmt, pos),
        "FANIN" => fanin::parse(s, stmt, pos),
        "ENTRY" => entry::parse(s, stmt, pos),
        _ => {
            s.report(
                MessageId::SynGeneric,
                stmt.span,
                format!("unrecognized statement '{}'", word),
            );
            Err(())
        }
    };
    let _ = result;
}

/// `#control` statements. Only `#include ("path")` is recognized.
fn control(s: &mut Session, stmt: &Statement) {
    let (pos, word) = next_word(&stmt.buf, 1);
    match word.to_ascii_lowercase().as_str() {
        "include" => match extract_string(&stmt.buf, pos) {
            Ok((_, path)) => {
                let _ = s.reader.push_file(&path, &mut s.sources, &mut s.msgs);
            }
            Err(_) => s.report(
                MessageId::SynBadString,
                stmt.span,
                "malformed include path".to_string(),
            ),
        },
        _ => s.report(
            MessageId::BadControl,
            stmt.span,
            format!("unrecognized control statement '#{}'", word),
        ),
    }
}

/// Parse one expression at `pos`, resolving identifiers against the
/// current scope.
pub(crate) fn parse_expr(
    s: &mut Session,
    buf: &[u8],
    pos: usize,
    span: Span,
    term: Terminator,
) -> Result<(usize, Expr), ()> {
    let scope = s.current_group();
    let mut env = ExprEnv {
        syms: &s.syms,
        scope,
        sources: &s.sources,
        msgs: &mut s.msgs,
        span,
    };
    expr::generate(&mut env, buf, pos, term)
}

/// Extract a possibly `::`-qualified identifier.
pub(crate) fn next_qualified(buf: &[u8], pos: usize) -> (usize, String) {
    let mut pos = skip_blanks(buf, pos);
    let mut name = String::new();
    if buf[pos..].starts_with(b"::") {
        name.push_str("::");
        pos += 2;
    }
    let (p, word) = next_word(buf, pos);
    if word.is_empty() {
        return (p, name);
    }
    name.push_str(&word);
    pos = p;
    continue_qualified(buf, pos, name)
}

/// Extend an already-read identifier with any `::segment` suffixes.
pub(crate) fn continue_qualified(buf: &[u8], mut pos: usize, mut name: String) -> (usize, String) {
    while buf[pos..].starts_with(b"::") {
        let (p, word) = next_word(buf, pos + 2);
        if word.is_empty() {
            break;
        }
        name.push_str("::");
        name.push_str(&word);
        pos = p;
    }
    (pos, name)
}

/// Report an `extract_string` failure with the right diagnostic.
pub(crate) fn report_string_error(s: &mut Session, err: StringError, span: Span) {
    match err {
        StringError::TooLong => s.report(
            MessageId::SynStringTooLong,
            span,
            "clause string too long".to_string(),
        ),
        StringError::Malformed => s.report(
            MessageId::SynBadString,
            span,
            "malformed clause string".to_string(),
        ),
    }
}

/// Finish a neuron address reference whose name is already consumed:
/// parse deferred `[expr]` indexes, resolve the name against the external
/// table, and fall back to a pass-1 deferred-resolution operator for
/// forward references.
pub(crate) fn finish_ref(
    s: &mut Session,
    buf: &[u8],
    mut pos: usize,
    name: String,
    span: Span,
) -> Result<(usize, RefId), ()> {
    let mut indexes = Vec::new();
    while peek(buf, pos) == b'[' {
        let start = skip_blanks(buf, pos);
        let (p, e) = parse_expr(s, buf, start, span, Terminator::Bracket)?;
        indexes.push(e);
        pos = p;
    }

    let qualifier = s.current_group();
    let sym = s.syms.locate_qualified(Table::External, qualifier, &name);
    if let Some(id) = sym {
        if let SymbolKind::Neuron(n) = &mut s.syms.get_mut(id).kind {
            n.referenced = true;
        }
    }
    let deferred = sym.is_none();
    let rid = s.push_ref(NeuronRef {
        name,
        qualifier,
        sym,
        indexes,
        span,
    });
    if deferred {
        s.pass1.push(Op::Resolve { target: rid });
    }
    Ok((pos, rid))
}

/// Parse a full neuron address reference starting at `pos`.
pub(crate) fn parse_ref(
    s: &mut Session,
    buf: &[u8],
    pos: usize,
    span: Span,
) -> Result<(usize, RefId), ()> {
    let (pos, name) = next_qualified(buf, pos);
    if name.is_empty() {
        s.report(
            MessageId::SynGeneric,
            span,
            "neuron name expected".to_string(),
        );
        return Err(());
    }
    if name.len() > crate::scan::MAX_SYMBOL {
        s.report(
            MessageId::SynSymbolTooLong,
            span,
            "neuron name too long".to_string(),
        );
        return Err(());
    }
    finish_ref(s, buf, pos, name, span)
}

/// The implicit target when a FANIN or ENTRY address is omitted: the
/// current scope's most recently declared neuron.
pub(crate) fn default_ref(s: &mut Session, span: Span) -> Result<RefId, ()> {
    match s.default_neuron() {
        Some(id) => {
            let name = s.syms.get(id).name.clone();
            let qualifier = s.current_group();
            Ok(s.push_ref(NeuronRef {
                name,
                qualifier,
                sym: Some(id),
                indexes: Vec::new(),
                span,
            }))
        }
        None => {
            s.report(
                MessageId::FanNoNeuron,
                span,
                "no default neuron in this scope".to_string(),
            );
            Err(())
        }
    }
}
