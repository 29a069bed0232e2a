use crate::span::{SourceMap, Span};

/// Message severity, ordered. The driver's pass gates and the end-of-run
/// summary both key off the highest severity seen so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Severe,
    Terminating,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Severe => "severe",
            Severity::Terminating => "terminating",
        }
    }
}

/// Stable numeric message identifiers, grouped by subsystem:
/// 1xx I/O, 15x storage, 2xx neuron statement, 25x fanin statement,
/// 3xx begin/end/do scoping, 35x entry, 4xx syntax, 45x symbol table,
/// 5xx dimensionality, 55x expression complexity, 9xx compiler bugs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageId {
    // I/O
    FileOpen = 101,
    StmtTooLong = 103,
    BadControl = 104,
    // Storage
    StoreOpen = 151,
    StoreFault = 152,
    StoreFull = 153,
    // NEURON statement
    NeuNoName = 201,
    NeuBadType = 202,
    NeuDupClause = 203,
    // FANIN statement
    FanDupClause = 251,
    FanNoNeuron = 253,
    // BEGIN / END / DO scoping
    EndWithoutBegin = 301,
    EndWrongFile = 302,
    BeginUnclosed = 303,
    BegInfoDiffers = 304,
    DoZeroBy = 305,
    DoMissingTo = 306,
    // ENTRY
    EntMissing = 351,
    EntDuplicate = 352,
    // Syntax
    SynGeneric = 401,
    SynSymbolTooLong = 402,
    SynStringTooLong = 403,
    SynBadString = 404,
    // Symbol table
    SymNotFound = 451,
    SymDuplicate = 452,
    SymBadName = 453,
    SymDepth = 454,
    // Dimensionality
    DimTooMany = 501,
    DimTooManyElements = 502,
    DimMismatch = 503,
    DimRange = 504,
    // Expression
    ExpComplex = 551,
    ExpDivZero = 552,
    // Internal compiler bugs
    BugOperandStack = 901,
    BugNoOutputFile = 902,
    BugBadPass = 903,
    BugScopeStack = 904,
    BugErrorLimit = 905,
}

impl MessageId {
    pub fn severity(self) -> Severity {
        use MessageId::*;
        match self {
            BegInfoDiffers | EntDuplicate | FanDupClause | NeuDupClause | DoZeroBy
            | BadControl | ExpDivZero => Severity::Warning,
            StoreOpen | StoreFault => Severity::Severe,
            BugOperandStack | BugNoOutputFile | BugBadPass | BugScopeStack => Severity::Severe,
            BugErrorLimit => Severity::Terminating,
            _ => Severity::Error,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// One reported condition: identifier, rendered text, source position.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub id: MessageId,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(id: MessageId, message: String, span: Span) -> Self {
        Self {
            id,
            severity: id.severity(),
            message,
            span,
        }
    }

    /// The plain one-line form used when the span maps to no source text.
    /// `headers` controls the numeric id prefix.
    pub fn plain_line(&self, headers: bool) -> String {
        if headers {
            format!(
                "NNC{:04} {}: {}",
                self.id.code(),
                self.severity.label(),
                self.message
            )
        } else {
            format!("{}: {}", self.severity.label(), self.message)
        }
    }

    /// Render this diagnostic using ariadne when the span maps into a known
    /// source file; span-less diagnostics print as one plain line.
    pub fn render(&self, sources: &SourceMap, headers: bool) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let file = match sources.get(self.span.file_id) {
            Some(f) if self.span.end > self.span.start => f,
            _ => {
                println!("{}", self.plain_line(headers));
                return;
            }
        };

        let kind = match self.severity {
            Severity::Info => ReportKind::Advice,
            Severity::Warning => ReportKind::Warning,
            _ => ReportKind::Error,
        };
        let color = match self.severity {
            Severity::Info => Color::Cyan,
            Severity::Warning => Color::Yellow,
            _ => Color::Red,
        };

        let filename = file.name.as_str();
        let mut report = Report::build(kind, filename, self.span.start as usize);
        if headers {
            report = report.with_code(format!("NNC{:04}", self.id.code()));
        }
        report
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.start as usize..self.span.end as usize))
                    .with_message(&self.message)
                    .with_color(color),
            )
            .finish()
            .print((filename, Source::from(file.source.as_str())))
            .ok();
    }
}

/// Hard cap on combined Error + Severe count before compilation is forced
/// to terminate mid-pass.
pub const MAX_ERRORS: u32 = 32;

/// The running message log: collects diagnostics, keeps per-severity counts
/// and the highest-severity watermark the driver gates on.
pub struct Messages {
    pub collected: Vec<Diagnostic>,
    pub high_level: Severity,
    /// Compilation stops before the next pass once `high_level` exceeds this.
    pub stop_level: Severity,
    pub warn_count: u32,
    pub error_count: u32,
    pub severe_count: u32,
    pub term_count: u32,
    /// When false, diagnostics are collected but not rendered (library and
    /// test use).
    pub render: bool,
    /// When false, rendered diagnostics drop their numeric id prefix.
    pub headers: bool,
}

impl Messages {
    pub fn new(render: bool) -> Self {
        Self {
            collected: Vec::new(),
            high_level: Severity::Info,
            stop_level: Severity::Warning,
            warn_count: 0,
            error_count: 0,
            severe_count: 0,
            term_count: 0,
            render,
            headers: true,
        }
    }

    pub fn report(&mut self, sources: &SourceMap, id: MessageId, span: Span, message: String) {
        let diag = Diagnostic::new(id, message, span);
        match diag.severity {
            Severity::Info => {}
            Severity::Warning => self.warn_count += 1,
            Severity::Error => self.error_count += 1,
            Severity::Severe => self.severe_count += 1,
            Severity::Terminating => self.term_count += 1,
        }
        if diag.severity > self.high_level {
            self.high_level = diag.severity;
        }
        if self.render {
            diag.render(sources, self.headers);
        }
        self.collected.push(diag);

        // Too many hard failures: escalate to a synthetic terminating
        // condition so the driver abandons the remaining passes.
        if self.error_count + self.severe_count >= MAX_ERRORS
            && self.high_level < Severity::Terminating
        {
            self.high_level = Severity::Terminating;
            self.term_count += 1;
            let diag = Diagnostic::new(
                MessageId::BugErrorLimit,
                "error limit reached".to_string(),
                Span::dummy(),
            );
            if self.render {
                diag.render(sources, self.headers);
            }
            self.collected.push(diag);
        }
    }

    /// True once the stop threshold has been crossed; the driver checks
    /// this at every pass boundary.
    pub fn stopped(&self) -> bool {
        self.high_level > self.stop_level
    }

    /// End-of-run summary, one line per severity bucket at or below the
    /// watermark.
    pub fn summarize(&self) {
        if self.high_level >= Severity::Warning {
            println!("{:5} Warnings", self.warn_count);
        }
        if self.high_level >= Severity::Error {
            println!("{:5} Errors", self.error_count);
        }
        if self.high_level >= Severity::Severe {
            println!("{:5} Severe errors", self.severe_count);
        }
        if self.high_level >= Severity::Terminating {
            println!("{:5} Terminating errors", self.term_count);
            println!("Compile aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Messages {
        Messages::new(false)
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Severe);
        assert!(Severity::Severe < Severity::Terminating);
    }

    #[test]
    fn test_watermark_and_stop() {
        let sources = SourceMap::new();
        let mut msgs = quiet();
        msgs.report(
            &sources,
            MessageId::BegInfoDiffers,
            Span::dummy(),
            "x".into(),
        );
        assert_eq!(msgs.high_level, Severity::Warning);
        assert!(!msgs.stopped());

        msgs.report(&sources, MessageId::SynGeneric, Span::dummy(), "y".into());
        assert_eq!(msgs.high_level, Severity::Error);
        assert!(msgs.stopped());
        assert_eq!(msgs.warn_count, 1);
        assert_eq!(msgs.error_count, 1);
    }

    #[test]
    fn test_error_cap_escalates() {
        let sources = SourceMap::new();
        let mut msgs = quiet();
        for _ in 0..MAX_ERRORS {
            msgs.report(&sources, MessageId::SynGeneric, Span::dummy(), "e".into());
        }
        assert_eq!(msgs.high_level, Severity::Terminating);
        assert_eq!(msgs.term_count, 1);
    }

    #[test]
    fn test_header_suppression() {
        let diag = Diagnostic::new(MessageId::SynGeneric, "bad token".into(), Span::dummy());
        assert_eq!(diag.plain_line(true), "NNC0401 error: bad token");
        assert_eq!(diag.plain_line(false), "error: bad token");
    }

    #[test]
    fn test_ids_are_stable() {
        assert_eq!(MessageId::SynGeneric.code(), 401);
        assert_eq!(MessageId::SymNotFound.code(), 451);
        assert_eq!(MessageId::DimRange.code(), 504);
        assert_eq!(MessageId::BugOperandStack.code(), 901);
    }
}
