/// A byte range within one source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    /// A span that points nowhere (for diagnostics with no source position).
    pub fn dummy() -> Self {
        Self {
            file_id: 0,
            start: 0,
            end: 0,
        }
    }
}

/// Source origin of a statement, kept for diagnostics and the listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Origin {
    pub file_id: u16,
    pub line: u32,
    pub column: u32,
}

impl Origin {
    pub fn dummy() -> Self {
        Self {
            file_id: 0,
            line: 0,
            column: 0,
        }
    }
}

/// All source files seen during a compilation, for diagnostic rendering.
/// File ids are assigned in open order; the stack of active includes is
/// tracked separately by the reader.
#[derive(Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

pub struct SourceFile {
    pub name: String,
    pub source: String,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, source: String) -> u16 {
        self.files.push(SourceFile { name, source });
        (self.files.len() - 1) as u16
    }

    pub fn get(&self, file_id: u16) -> Option<&SourceFile> {
        self.files.get(file_id as usize)
    }

    /// Line and column (1 based) of a span's start.
    pub fn origin(&self, span: Span) -> Origin {
        let mut origin = Origin {
            file_id: span.file_id,
            line: 1,
            column: 1,
        };
        if let Some(file) = self.get(span.file_id) {
            for &b in file.source.as_bytes().iter().take(span.start as usize) {
                if b == b'\n' {
                    origin.line += 1;
                    origin.column = 1;
                } else {
                    origin.column += 1;
                }
            }
        }
        origin
    }

    pub fn name(&self, file_id: u16) -> &str {
        self.files
            .get(file_id as usize)
            .map(|f| f.name.as_str())
            .unwrap_or("*UndefinedFile*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_map_ids() {
        let mut map = SourceMap::new();
        let a = map.insert("a.n".into(), "BEGIN;".into());
        let b = map.insert("b.n".into(), "END;".into());
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(map.name(a), "a.n");
        assert_eq!(map.name(b), "b.n");
        assert_eq!(map.name(7), "*UndefinedFile*");
    }

    #[test]
    fn test_origin() {
        let mut map = SourceMap::new();
        let id = map.insert("a.n".into(), "BEGIN;\nNEURON a;\n".into());
        let origin = map.origin(Span::new(id, 7, 15));
        assert_eq!(origin.line, 2);
        assert_eq!(origin.column, 1);
    }
}
