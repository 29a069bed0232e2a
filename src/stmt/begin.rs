//! BEGIN statement: open a block, optionally named and optionally bound
//! to an output file.

use crate::diagnostic::MessageId;
use crate::op::Op;
use crate::reader::Statement;
use crate::scan::{extract_string, next_word};
use crate::session::{BeginScope, ScopeEntry, Session};
use crate::sym::{GroupSym, InsertError, SymbolKind, Table};

pub fn parse(s: &mut Session, stmt: &Statement, mut pos: usize) -> Result<(), ()> {
    let buf = &stmt.buf;
    let span = stmt.span;
    let mut path: Option<String> = None;
    let mut info: Option<String> = None;
    let mut name: Option<String> = None;

    loop {
        let (p, word) = next_word(buf, pos);
        if word.is_empty() {
            if p >= buf.len() {
                break;
            }
            s.report(
                MessageId::SynGeneric,
                span,
                "unexpected character in BEGIN statement".to_string(),
            );
            return Err(());
        }
        match word.to_ascii_uppercase().as_str() {
            "FILE" => {
                if path.is_some() {
                    s.report(
                        MessageId::SynGeneric,
                        span,
                        "duplicate FILE clause".to_string(),
                    );
                    return Err(());
                }
                match extract_string(buf, p) {
                    Ok((p2, text)) => {
                        path = Some(text);
                        pos = p2;
                    }
                    Err(e) => {
                        super::report_string_error(s, e, span);
                        return Err(());
                    }
                }
            }
            "INFO" => {
                if info.is_some() {
                    s.report(
                        MessageId::SynGeneric,
                        span,
                        "duplicate INFO clause".to_string(),
                    );
                    return Err(());
                }
                match extract_string(buf, p) {
                    Ok((p2, text)) => {
                        info = Some(text);
                        pos = p2;
                    }
                    Err(e) => {
                        super::report_string_error(s, e, span);
                        return Err(());
                    }
                }
            }
            _ => {
                if name.is_some() {
                    s.report(
                        MessageId::SynGeneric,
                        span,
                        "more than one group name".to_string(),
                    );
                    return Err(());
                }
                name = Some(word);
                pos = p;
            }
        }
    }

    // A FILE clause binds (and possibly creates) an output descriptor,
    // deduplicated by path; without one the block inherits the enclosing
    // scope's file and default neuron.
    let (mut file, default_neuron) = match &path {
        Some(p) => {
            let text = info.clone().unwrap_or_default();
            let (id, existing) = s.files.open(p, &text);
            if existing && info.is_some() {
                let known = s.files.get(id).map(|f| f.info.clone()).unwrap_or_default();
                if known != text {
                    s.report(
                        MessageId::BegInfoDiffers,
                        span,
                        format!("INFO differs from earlier BEGIN for '{}'", p),
                    );
                }
            }
            (id, None)
        }
        None => (s.current_file(), s.default_neuron()),
    };

    let qualifier = s.current_group();
    let group = match name {
        Some(n) => match s.syms.lookup_exact(Table::Internal, qualifier, &n) {
            // Re-opening a named group makes the existing symbol current
            // again; neurons keep accumulating into it.
            Some(id) => match &s.syms.get(id).kind {
                SymbolKind::Group(g) => {
                    if path.is_none() {
                        file = g.file;
                    }
                    Some(id)
                }
                _ => {
                    s.report(
                        MessageId::SymDuplicate,
                        span,
                        format!("'{}' is already defined and is not a group", n),
                    );
                    return Err(());
                }
            },
            None => {
                let kind = SymbolKind::Group(GroupSym {
                    parent_group: qualifier,
                    file,
                    source_file: span.file_id,
                });
                match s.syms.insert(Table::Internal, qualifier, &n, span, kind) {
                    Ok(id) => Some(id),
                    Err(InsertError::BadName) => {
                        s.report(
                            MessageId::SymBadName,
                            span,
                            format!("invalid group name '{}'", n),
                        );
                        return Err(());
                    }
                    Err(InsertError::Duplicate) => {
                        s.report(
                            MessageId::SymDuplicate,
                            span,
                            format!("duplicate symbol '{}'", n),
                        );
                        return Err(());
                    }
                }
            }
        },
        None => None,
    };

    let scope = BeginScope {
        group,
        file,
        source_file: span.file_id,
        default_neuron,
        span,
    };
    s.scopes.push(ScopeEntry::Begin(scope.clone()));
    s.pass1.push(Op::Begin(scope));
    Ok(())
}
