//! DO statement: `DO name = expr TO expr [BY expr]`.
//!
//! The loop variable registers in the internal table at the current
//! scope, created fresh when absent. The loop operator queues onto the
//! late worklist; statements between DO and its END become the
//! operator's private body when the END is parsed.

use crate::diagnostic::MessageId;
use crate::expr::{Expr, Terminator};
use crate::op::Op;
use crate::reader::Statement;
use crate::scan::{next_word, skip_blanks};
use crate::session::{DoScope, ScopeEntry, Session};
use crate::sym::{InsertError, SymbolKind, Table};

pub fn parse(s: &mut Session, stmt: &Statement, pos: usize) -> Result<(), ()> {
    let buf = &stmt.buf;
    let span = stmt.span;

    let (pos, name) = next_word(buf, pos);
    if name.is_empty() {
        s.report(
            MessageId::SynGeneric,
            span,
            "loop variable name expected".to_string(),
        );
        return Err(());
    }

    let qualifier = s.current_group();
    let var = match s.syms.locate(Table::Internal, qualifier, &name) {
        Some(id) => match s.syms.get(id).kind {
            SymbolKind::Fixed { .. } => id,
            _ => {
                s.report(
                    MessageId::SymDuplicate,
                    span,
                    format!("'{}' is already defined and is not a loop variable", name),
                );
                return Err(());
            }
        },
        None => match s.syms.insert(
            Table::Internal,
            qualifier,
            &name,
            span,
            SymbolKind::Fixed { value: 0 },
        ) {
            Ok(id) => id,
            Err(InsertError::BadName) | Err(InsertError::Duplicate) => {
                s.report(
                    MessageId::SymBadName,
                    span,
                    format!("invalid loop variable name '{}'", name),
                );
                return Err(());
            }
        },
    };

    let mut pos = skip_blanks(buf, pos);
    if buf.get(pos) != Some(&b'=') {
        s.report(
            MessageId::SynGeneric,
            span,
            "'=' expected after loop variable".to_string(),
        );
        return Err(());
    }
    pos += 1;

    // The three sub-expressions are delimited by the top-level TO and BY
    // keywords rather than punctuation; carve the statement first, then
    // parse each slice to its end.
    let (init_end, to_range, by_range) = split_bounds(buf, pos);
    let to_range = match to_range {
        Some(r) => r,
        None => {
            s.report(MessageId::DoMissingTo, span, "TO clause missing".to_string());
            return Err(());
        }
    };

    let (_, init) = super::parse_expr(s, &buf[..init_end], pos, span, Terminator::Statement)?;
    let (_, to) = super::parse_expr(s, &buf[..to_range.1], to_range.0, span, Terminator::Statement)?;
    let by = match by_range {
        Some((start, end)) => {
            super::parse_expr(s, &buf[..end], start, span, Terminator::Statement)?.1
        }
        None => Expr::fixed(1),
    };

    let op_index = s.pass_n.len();
    s.pass_n.push(Op::For {
        var,
        init,
        to,
        by,
        body: Vec::new(),
        span,
    });
    s.scopes.push(ScopeEntry::Do(DoScope { op_index }));
    Ok(())
}

/// Locate the top-level TO and BY keywords. Returns the end of the init
/// expression and the (start, end) ranges of the TO and BY expressions.
fn split_bounds(
    buf: &[u8],
    start: usize,
) -> (usize, Option<(usize, usize)>, Option<(usize, usize)>) {
    let mut depth = 0i32;
    let mut init_end = buf.len();
    let mut to_start = None;
    let mut by_start = None;
    let mut by_kw = buf.len();
    let mut pos = start;
    while pos < buf.len() {
        let c = buf[pos];
        if c == b'(' || c == b'[' {
            depth += 1;
            pos += 1;
        } else if c == b')' || c == b']' {
            depth -= 1;
            pos += 1;
        } else if depth == 0 && (c.is_ascii_alphabetic() || c == b'_') {
            let (p, word) = next_word(buf, pos);
            if word.eq_ignore_ascii_case("TO") && to_start.is_none() {
                init_end = pos;
                to_start = Some(skip_blanks(buf, p));
            } else if word.eq_ignore_ascii_case("BY") && by_start.is_none() {
                by_kw = pos;
                by_start = Some(skip_blanks(buf, p));
            }
            pos = p;
        } else {
            pos += 1;
        }
    }
    let to_range = to_start.map(|t| (t, by_start.map(|_| by_kw).unwrap_or(buf.len())));
    let by_range = by_start.map(|b| (b, buf.len()));
    (init_end, to_range, by_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_bounds() {
        let buf = b"1 TO 10 BY 2";
        let (init_end, to, by) = split_bounds(buf, 0);
        assert_eq!(&buf[..init_end], b"1 ");
        let (ts, te) = to.unwrap();
        assert_eq!(&buf[ts..te], b"10 ");
        let (bs, be) = by.unwrap();
        assert_eq!(&buf[bs..be], b"2");
    }

    #[test]
    fn test_split_bounds_defaults_and_nesting() {
        let buf = b"(1 TO 2) TO n";
        let (init_end, to, by) = split_bounds(buf, 0);
        // The parenthesized TO is not a clause boundary.
        assert_eq!(&buf[..init_end], b"(1 TO 2) ");
        let (ts, te) = to.unwrap();
        assert_eq!(&buf[ts..te], b"n");
        assert!(by.is_none());

        let (_, to, _) = split_bounds(b"1", 0);
        assert!(to.is_none());
    }
}
