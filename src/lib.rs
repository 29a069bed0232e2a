//! nnc: a compiler for textual neural-network descriptions.
//!
//! The input language describes neurons, their weighted fanin
//! connections, and structural constructs (BEGIN/END groups, DO loops).
//! Compilation resolves names to stable (file, partition, offset)
//! addresses and lays the network out as fixed binary records in paged
//! output containers; a separate runtime walks those records to evaluate
//! the network.
//!
//! The pipeline: the statement loader assembles one statement at a time,
//! handlers queue deferred compile-time operators onto per-pass
//! worklists, and the driver executes the worklists in strict pass order
//! (resolve, define, fanin count, fanin emit) with storage allocation
//! between passes.

pub mod alloc;
pub mod diagnostic;
pub mod driver;
pub mod expr;
pub mod op;
pub mod reader;
pub mod record;
pub mod report;
pub mod scan;
pub mod session;
pub mod span;
pub mod stmt;
pub mod storage;
pub mod sym;

pub use driver::Options;
pub use session::Session;

/// Compile a source file. The binary output lands next to the input as
/// `<stem>.000` unless the source binds its own FILE clauses. Returns the
/// process exit code.
pub fn compile_file(path: &str, opts: &Options) -> i32 {
    if !opts.quiet {
        println!("nnc {}", env!("CARGO_PKG_VERSION"));
        println!("Compiling '{}'", path);
    }
    let output = default_output(path);
    let mut s = Session::new(&output, true);
    s.msgs.headers = !opts.quiet;
    if s.reader
        .push_file(path, &mut s.sources, &mut s.msgs)
        .is_err()
    {
        s.msgs.summarize();
        return 1;
    }
    let ok = driver::run(&mut s, opts);
    s.msgs.summarize();
    if ok {
        0
    } else {
        1
    }
}

/// Compile an in-memory source under the given options, returning the
/// whole session for inspection. Diagnostics are collected, not printed.
pub fn compile_source(name: &str, text: &str, output: &str, opts: &Options) -> Session {
    let mut s = Session::new(output, false);
    s.reader.push_source(name, text, &mut s.sources);
    driver::run(&mut s, opts);
    s
}

/// Compile a snippet entirely in memory, without touching the
/// filesystem.
pub fn compile_snippet(text: &str) -> Session {
    let opts = Options {
        flush: false,
        ..Options::default()
    };
    compile_source("snippet.n", text, "snippet.000", &opts)
}

/// Default output path: the input stem with a `.000` suffix.
fn default_output(input: &str) -> String {
    let path = std::path::Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "network".to_string());
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir
            .join(format!("{}.000", stem))
            .to_string_lossy()
            .into_owned(),
        _ => format!("{}.000", stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output() {
        assert_eq!(default_output("net.n"), "net.000");
        assert_eq!(default_output("dir/sub/net.n"), "dir/sub/net.000");
        assert_eq!(default_output("net"), "net.000");
    }
}
