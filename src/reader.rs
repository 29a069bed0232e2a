//! Statement loader.
//!
//! Assembles one logical statement at a time from a stack of open source
//! files (nested `#include`s), stripping comments, joining backslash
//! continuations, and collapsing blank runs while leaving quoted strings
//! untouched. A statement normally ends at `;`; a line whose first
//! non-blank character is `#` is a self-contained control statement ended
//! by its own newline.

use crate::diagnostic::{MessageId, Messages};
use crate::span::{SourceMap, Span};

/// Maximum assembled statement length. Longer statements are diagnosed,
/// discarded up to the next `;`, and returned empty.
pub const MAX_STATEMENT: usize = 4096;

/// One assembled statement plus its source range.
#[derive(Clone, Debug)]
pub struct Statement {
    pub buf: Vec<u8>,
    pub span: Span,
}

impl Statement {
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True for `#control` statements.
    pub fn is_control(&self) -> bool {
        self.buf.first() == Some(&b'#')
    }
}

struct Frame {
    file_id: u16,
    pos: usize,
}

/// The include stack. Frames close strictly LIFO; popping happens only
/// when the top frame's source is exhausted.
pub struct Reader {
    stack: Vec<Frame>,
}

impl Reader {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Open a file from disk and make it the current source.
    pub fn push_file(
        &mut self,
        path: &str,
        sources: &mut SourceMap,
        msgs: &mut Messages,
    ) -> Result<(), ()> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let file_id = sources.insert(path.to_string(), text);
                self.stack.push(Frame { file_id, pos: 0 });
                Ok(())
            }
            Err(e) => {
                msgs.report(
                    sources,
                    MessageId::FileOpen,
                    Span::dummy(),
                    format!("cannot open '{}': {}", path, e),
                );
                Err(())
            }
        }
    }

    /// Make an in-memory source current, for library and test use.
    pub fn push_source(&mut self, name: &str, text: &str, sources: &mut SourceMap) {
        let file_id = sources.insert(name.to_string(), text.to_string());
        self.stack.push(Frame { file_id, pos: 0 });
    }

    /// Id of the file currently being read.
    pub fn current_file(&self) -> Option<u16> {
        self.stack.last().map(|f| f.file_id)
    }

    /// Assemble the next statement, popping exhausted include frames as
    /// needed. `None` means the whole input is consumed.
    pub fn next_statement(
        &mut self,
        sources: &SourceMap,
        msgs: &mut Messages,
    ) -> Option<Statement> {
        loop {
            let frame = self.stack.last_mut()?;
            let src = match sources.get(frame.file_id) {
                Some(f) => f.source.as_bytes(),
                None => {
                    self.stack.pop();
                    continue;
                }
            };
            if frame.pos >= src.len() {
                self.stack.pop();
                continue;
            }
            let file_id = frame.file_id;
            let (stmt, new_pos) = scan_statement(src, frame.pos, file_id, sources, msgs);
            frame.pos = new_pos;
            match stmt {
                Some(s) => return Some(s),
                None => continue, // only trailing blanks/comments remained
            }
        }
    }
}

/// Scan one statement starting at `pos`. Returns `(statement, new_pos)`;
/// the statement is `None` when only whitespace and comments remained.
fn scan_statement(
    src: &[u8],
    mut pos: usize,
    file_id: u16,
    sources: &SourceMap,
    msgs: &mut Messages,
) -> (Option<Statement>, usize) {
    let mut buf: Vec<u8> = Vec::new();
    let mut start = pos;
    let mut bol = true; // at beginning of a (logical) line
    let mut overflow = false;

    while pos < src.len() {
        let c = src[pos];

        // Block comment.
        if c == b'/' && pos + 1 < src.len() && src[pos + 1] == b'*' {
            pos += 2;
            while pos + 1 < src.len() && !(src[pos] == b'*' && src[pos + 1] == b'/') {
                pos += 1;
            }
            pos = (pos + 2).min(src.len());
            push_blank(&mut buf);
            continue;
        }
        // Line comment.
        if c == b'/' && pos + 1 < src.len() && src[pos + 1] == b'/' {
            while pos < src.len() && src[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        // Backslash continuation.
        if c == b'\\' && pos + 1 < src.len() && src[pos + 1] == b'\n' {
            pos += 2;
            continue;
        }

        if c == b'\n' {
            if buf.first() == Some(&b'#') {
                pos += 1;
                break; // control statement ends at its newline
            }
            pos += 1;
            bol = true;
            push_blank(&mut buf);
            continue;
        }
        if c == b' ' || c == b'\t' || c == b'\r' {
            pos += 1;
            if !buf.is_empty() {
                push_blank(&mut buf);
            }
            continue;
        }

        if c == b'#' && bol && buf.is_empty() {
            start = pos;
            buf.push(b'#');
            pos += 1;
            continue;
        }
        bol = false;

        if buf.is_empty() {
            start = pos;
        }

        // Quoted strings pass through verbatim, escapes included.
        if c == b'"' || c == b'\'' {
            let quote = c;
            buf.push(c);
            pos += 1;
            while pos < src.len() && src[pos] != quote {
                if src[pos] == b'\\' && pos + 1 < src.len() {
                    buf.push(src[pos]);
                    pos += 1;
                }
                buf.push(src[pos]);
                pos += 1;
            }
            if pos < src.len() {
                buf.push(quote);
                pos += 1;
            }
            continue;
        }

        if c == b';' {
            pos += 1;
            if overflow {
                return (
                    Some(Statement {
                        buf: Vec::new(),
                        span: Span::new(file_id, start as u32, pos as u32),
                    }),
                    pos,
                );
            }
            while buf.last() == Some(&b' ') {
                buf.pop();
            }
            return (
                Some(Statement {
                    buf,
                    span: Span::new(file_id, start as u32, pos as u32),
                }),
                pos,
            );
        }

        buf.push(c);
        pos += 1;

        if !overflow && buf.len() > MAX_STATEMENT {
            msgs.report(
                sources,
                MessageId::StmtTooLong,
                Span::new(file_id, start as u32, pos as u32),
                format!("statement exceeds {} characters", MAX_STATEMENT),
            );
            overflow = true;
        }
    }

    // End of source.
    while buf.last() == Some(&b' ') {
        buf.pop();
    }
    if buf.is_empty() || overflow {
        (None, pos)
    } else {
        (
            Some(Statement {
                buf,
                span: Span::new(file_id, start as u32, pos as u32),
            }),
            pos,
        )
    }
}

fn push_blank(buf: &mut Vec<u8>) {
    if !buf.is_empty() && buf.last() != Some(&b' ') {
        buf.push(b' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(text: &str) -> Vec<String> {
        let mut sources = SourceMap::new();
        let mut msgs = Messages::new(false);
        let mut reader = Reader::new();
        reader.push_source("test.n", text, &mut sources);
        let mut out = Vec::new();
        while let Some(stmt) = reader.next_statement(&sources, &mut msgs) {
            out.push(String::from_utf8_lossy(&stmt.buf).into_owned());
        }
        out
    }

    #[test]
    fn test_simple_statements() {
        let stmts = read_all("BEGIN;\nNEURON a;\nEND;\n");
        assert_eq!(stmts, vec!["BEGIN", "NEURON a", "END"]);
    }

    #[test]
    fn test_comments_stripped() {
        let stmts = read_all("NEURON /* type */ a; // trailing\n// whole line\nEND;");
        assert_eq!(stmts, vec!["NEURON a", "END"]);
    }

    #[test]
    fn test_continuation_and_blank_collapse() {
        let stmts = read_all("NEURON \\\n    a;");
        assert_eq!(stmts, vec!["NEURON a"]);

        let stmts = read_all("NEURON      (ADD)\n\n   b;");
        assert_eq!(stmts, vec!["NEURON (ADD) b"]);
    }

    #[test]
    fn test_quoted_strings_verbatim() {
        let stmts = read_all("BEGIN FILE(\"a // b; /* c */\");");
        assert_eq!(stmts, vec!["BEGIN FILE(\"a // b; /* c */\")"]);
    }

    #[test]
    fn test_control_line() {
        let stmts = read_all("#include (\"other.n\")\nEND;");
        assert_eq!(stmts, vec!["#include (\"other.n\")", "END"]);
    }

    #[test]
    fn test_overflow_yields_empty() {
        let long = format!("NEURON {};END;", "x".repeat(MAX_STATEMENT + 16));
        let mut sources = SourceMap::new();
        let mut msgs = Messages::new(false);
        let mut reader = Reader::new();
        reader.push_source("test.n", &long, &mut sources);
        let first = reader.next_statement(&sources, &mut msgs).unwrap();
        assert!(first.is_empty());
        assert_eq!(msgs.error_count, 1);
        let second = reader.next_statement(&sources, &mut msgs).unwrap();
        assert_eq!(second.buf, b"END");
    }

    #[test]
    fn test_include_stack() {
        let mut sources = SourceMap::new();
        let mut msgs = Messages::new(false);
        let mut reader = Reader::new();
        reader.push_source("outer.n", "ENTRY(b);", &mut sources);
        reader.push_source("inner.n", "NEURON b;", &mut sources);
        let s1 = reader.next_statement(&sources, &mut msgs).unwrap();
        assert_eq!(s1.buf, b"NEURON b");
        let s2 = reader.next_statement(&sources, &mut msgs).unwrap();
        assert_eq!(s2.buf, b"ENTRY(b)");
        assert!(reader.next_statement(&sources, &mut msgs).is_none());
    }
}
