//! FANIN statement: `FANIN (fetch-addr) WEIGHT(expr) store-addr`.
//!
//! Both addresses default to the scope's current default neuron, the
//! weight defaults to 1.0, and index expressions inside the addresses
//! stay deferred until the count and emit passes evaluate them.

use crate::diagnostic::MessageId;
use crate::expr::{Expr, Terminator};
use crate::op::{Op, RefId};
use crate::reader::Statement;
use crate::scan::{next_word, peek, skip_blanks};
use crate::session::Session;

pub fn parse(s: &mut Session, stmt: &Statement, mut pos: usize) -> Result<(), ()> {
    let buf = &stmt.buf;
    let span = stmt.span;
    let mut fetch: Option<RefId> = None;
    let mut weight: Option<Expr> = None;
    let mut store: Option<RefId> = None;

    // Optional parenthesized fetch address, directly after FANIN.
    if peek(buf, pos) == b'(' {
        pos = skip_blanks(buf, pos) + 1;
        let (p, rid) = super::parse_ref(s, buf, pos, span)?;
        pos = skip_blanks(buf, p);
        if buf.get(pos) != Some(&b')') {
            s.report(
                MessageId::SynGeneric,
                span,
                "')' expected after fetch address".to_string(),
            );
            return Err(());
        }
        pos += 1;
        fetch = Some(rid);
    }

    loop {
        let (p, word) = next_word(buf, pos);
        if word.is_empty() {
            if p >= buf.len() {
                break;
            }
            // A root-anchored store address starts with "::".
            if buf[p..].starts_with(b"::") && store.is_none() {
                let (p2, rid) = super::parse_ref(s, buf, p, span)?;
                store = Some(rid);
                pos = p2;
                continue;
            }
            s.report(
                MessageId::SynGeneric,
                span,
                "unexpected character in FANIN statement".to_string(),
            );
            return Err(());
        }
        if word.eq_ignore_ascii_case("WEIGHT") && peek(buf, p) == b'(' {
            let (p2, e) =
                super::parse_expr(s, buf, skip_blanks(buf, p), span, Terminator::Paren)?;
            if weight.is_some() {
                s.report(
                    MessageId::FanDupClause,
                    span,
                    "duplicate WEIGHT clause".to_string(),
                );
            } else {
                weight = Some(e);
            }
            pos = p2;
            continue;
        }

        if store.is_some() {
            s.report(
                MessageId::SynGeneric,
                span,
                "more than one store address".to_string(),
            );
            return Err(());
        }
        let (p2, name) = super::continue_qualified(buf, p, word);
        let (p3, rid) = super::finish_ref(s, buf, p2, name, span)?;
        store = Some(rid);
        pos = p3;
    }

    let fetch = match fetch {
        Some(r) => r,
        None => super::default_ref(s, span)?,
    };
    let store = match store {
        Some(r) => r,
        None => super::default_ref(s, span)?,
    };
    s.pass_n.push(Op::Fanin {
        fetch,
        store,
        weight: weight.unwrap_or_else(|| Expr::float(1.0)),
        span,
    });
    Ok(())
}
