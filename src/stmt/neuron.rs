//! NEURON statement: `NEURON (type) VALUE[expr] name[bound]...`.
//!
//! The type keyword defaults to sigmoid. Dimension bounds are evaluated
//! immediately through the fixed-expression path, with the element-count
//! product overflow checked; the VALUE expression stays deferred until
//! the define pass.

use crate::diagnostic::MessageId;
use crate::expr::{Expr, Terminator};
use crate::op::Op;
use crate::reader::Statement;
use crate::record::NeuronType;
use crate::scan::{next_word, peek, skip_blanks};
use crate::session::Session;
use crate::span::Span;
use crate::sym::{InsertError, NeuronSym, SymbolKind, Table, MAX_DIM};

pub fn parse(s: &mut Session, stmt: &Statement, mut pos: usize) -> Result<(), ()> {
    let buf = &stmt.buf;
    let span = stmt.span;
    let mut type_code: Option<u16> = None;
    let mut value: Option<Expr> = None;
    let mut name: Option<String> = None;
    let mut bounds: Vec<i32> = Vec::new();
    let mut count: u64 = 1;

    // Optional parenthesized type keyword, directly after NEURON.
    if peek(buf, pos) == b'(' {
        pos = skip_blanks(buf, pos) + 1;
        let (p, word) = next_word(buf, pos);
        match NeuronType::from_keyword(&word) {
            Some(t) => type_code = Some(t.code()),
            None => {
                s.report(
                    MessageId::NeuBadType,
                    span,
                    format!("unknown neuron type '{}'", word),
                );
                return Err(());
            }
        }
        pos = skip_blanks(buf, p);
        if buf.get(pos) != Some(&b')') {
            s.report(
                MessageId::SynGeneric,
                span,
                "')' expected after neuron type".to_string(),
            );
            return Err(());
        }
        pos += 1;
    }

    loop {
        let (p, word) = next_word(buf, pos);
        if word.is_empty() {
            if p >= buf.len() {
                break;
            }
            s.report(
                MessageId::SynGeneric,
                span,
                "unexpected character in NEURON statement".to_string(),
            );
            return Err(());
        }
        if word.eq_ignore_ascii_case("VALUE") && peek(buf, p) == b'[' {
            let (p2, e) =
                super::parse_expr(s, buf, skip_blanks(buf, p), span, Terminator::Bracket)?;
            if value.is_some() {
                s.report(
                    MessageId::NeuDupClause,
                    span,
                    "duplicate VALUE clause".to_string(),
                );
            } else {
                value = Some(e);
            }
            pos = p2;
            continue;
        }

        if name.is_some() {
            s.report(
                MessageId::SynGeneric,
                span,
                "more than one neuron name".to_string(),
            );
            return Err(());
        }
        name = Some(word);
        pos = p;

        // Dimension bounds, evaluated now.
        while peek(buf, pos) == b'[' {
            if bounds.len() >= MAX_DIM {
                s.report(
                    MessageId::DimTooMany,
                    span,
                    format!("more than {} dimensions", MAX_DIM),
                );
                return Err(());
            }
            let (p2, e) =
                super::parse_expr(s, buf, skip_blanks(buf, pos), span, Terminator::Bracket)?;
            let bound = eval_bound(s, &e, span)?;
            match count.checked_mul(bound as u64) {
                Some(c) => count = c,
                None => {
                    s.report(
                        MessageId::DimTooManyElements,
                        span,
                        "element count overflows".to_string(),
                    );
                    return Err(());
                }
            }
            bounds.push(bound);
            pos = p2;
        }
    }

    let name = match name {
        Some(n) => n,
        None => {
            s.report(MessageId::NeuNoName, span, "neuron name missing".to_string());
            return Err(());
        }
    };

    let dim = bounds.len();
    let kind = SymbolKind::Neuron(NeuronSym {
        type_code: type_code.unwrap_or(NeuronType::Sigmoid.code()),
        dim,
        bounds: if dim > 0 { Some(bounds) } else { None },
        count,
        file: s.current_file(),
        addr: 0,
        defined: true,
        referenced: false,
    });
    let qualifier = s.current_group();
    let sym = match s.syms.insert(Table::External, qualifier, &name, span, kind) {
        Ok(id) => id,
        Err(InsertError::Duplicate) => {
            s.report(
                MessageId::SymDuplicate,
                span,
                format!("duplicate symbol '{}'", name),
            );
            return Err(());
        }
        Err(InsertError::BadName) => {
            s.report(
                MessageId::SymBadName,
                span,
                format!("invalid neuron name '{}'", name),
            );
            return Err(());
        }
    };

    s.set_default_neuron(sym);
    s.pass2.push(Op::Neuron { sym, value, span });
    Ok(())
}

fn eval_bound(s: &mut Session, e: &Expr, span: Span) -> Result<i32, ()> {
    let v = e.eval(&mut s.syms, &s.sources, &mut s.msgs, span).as_fixed();
    if v < 1 {
        s.report(
            MessageId::DimRange,
            span,
            "dimension bound must be positive".to_string(),
        );
        return Err(());
    }
    Ok(v)
}

/// CONSTANT is sugar: rewrite the statement as `NEURON (CONSTANT) ...`
/// and hand it straight back to the NEURON handler.
pub fn parse_constant(s: &mut Session, stmt: &Statement, pos: usize) -> Result<(), ()> {
    let mut buf = b"NEURON (CONSTANT) ".to_vec();
    buf.extend_from_slice(&stmt.buf[pos..]);
    let rewritten = Statement {
        buf,
        span: stmt.span,
    };
    let (p, _) = next_word(&rewritten.buf, 0);
    parse(s, &rewritten, p)
}
