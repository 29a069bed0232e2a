//! ENTRY statement: record the runtime's starting neuron.

use crate::diagnostic::MessageId;
use crate::op::Op;
use crate::reader::Statement;
use crate::scan::{next_word, peek, skip_blanks};
use crate::session::Session;

pub fn parse(s: &mut Session, stmt: &Statement, mut pos: usize) -> Result<(), ()> {
    let buf = &stmt.buf;
    let span = stmt.span;

    let target = if peek(buf, pos) == b'(' {
        pos = skip_blanks(buf, pos) + 1;
        let (p, rid) = super::parse_ref(s, buf, pos, span)?;
        pos = skip_blanks(buf, p);
        if buf.get(pos) != Some(&b')') {
            s.report(
                MessageId::SynGeneric,
                span,
                "')' expected after entry address".to_string(),
            );
            return Err(());
        }
        pos += 1;
        rid
    } else {
        super::default_ref(s, span)?
    };

    let (p, word) = next_word(buf, pos);
    if !word.is_empty() || p < buf.len() {
        s.report(
            MessageId::SynGeneric,
            span,
            "unexpected text after ENTRY address".to_string(),
        );
        return Err(());
    }

    // One entry point per compilation; later ones are ignored with a
    // warning.
    if s.entry_seen {
        s.report(
            MessageId::EntDuplicate,
            span,
            "duplicate ENTRY statement ignored".to_string(),
        );
        return Ok(());
    }
    s.entry_seen = true;
    s.pass_n.push(Op::Entry { target, span });
    Ok(())
}
