//! END statement: close the innermost BEGIN or DO block.

use crate::diagnostic::MessageId;
use crate::op::Op;
use crate::reader::Statement;
use crate::scan::next_word;
use crate::session::{ScopeEntry, Session};

pub fn parse(s: &mut Session, stmt: &Statement, pos: usize) -> Result<(), ()> {
    let span = stmt.span;
    let (p, word) = next_word(&stmt.buf, pos);
    if !word.is_empty() || p < stmt.buf.len() {
        s.report(
            MessageId::SynGeneric,
            span,
            "END takes no clauses".to_string(),
        );
        return Err(());
    }

    match s.scopes.pop() {
        None => {
            s.report(
                MessageId::EndWithoutBegin,
                span,
                "END without a matching BEGIN or DO".to_string(),
            );
            Err(())
        }
        Some(ScopeEntry::Begin(b)) => {
            // Blocks nest within a single source file only.
            if b.source_file != span.file_id {
                s.report(
                    MessageId::EndWrongFile,
                    span,
                    format!(
                        "END in '{}' closes a BEGIN from '{}'",
                        s.sources.name(span.file_id),
                        s.sources.name(b.source_file)
                    ),
                );
            }
            s.pass1.push(Op::End { span });
            Ok(())
        }
        Some(ScopeEntry::Do(d)) => {
            // Splice everything queued since the loop operator out of the
            // flat late worklist and into the loop's private body; the
            // controller stays behind where the body began.
            if d.op_index >= s.pass_n.len() {
                s.report(
                    MessageId::BugScopeStack,
                    span,
                    "loop operator missing from worklist".to_string(),
                );
                return Err(());
            }
            let body = s.pass_n.split_off(d.op_index + 1);
            match s.pass_n.get_mut(d.op_index) {
                Some(Op::For { body: slot, .. }) => *slot = body,
                _ => {
                    s.report(
                        MessageId::BugScopeStack,
                        span,
                        "loop operator missing from worklist".to_string(),
                    );
                    return Err(());
                }
            }
            Ok(())
        }
    }
}
