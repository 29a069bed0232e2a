//! Operator-precedence expression evaluator.
//!
//! `generate` converts an arithmetic sub-expression into a small typed
//! operator tree using the classic two-stack algorithm: operands on one
//! stack, operators on the other, reducing whenever an incoming operator
//! binds no tighter than the stack top. Trees carry their type statically:
//! mixing a fixed and a float operand inserts an explicit promotion node
//! on the fixed side.

use crate::diagnostic::{MessageId, Messages};
use crate::scan::{next_word, skip_blanks};
use crate::span::{SourceMap, Span};
use crate::sym::{SymTab, SymbolId, SymbolKind, Table};

/// Maximum operand/operator stack depth.
pub const MAX_DEPTH: usize = 128;

/// A fixed or floating result value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Fixed(i32),
    Float(f64),
}

impl Value {
    pub fn is_float(self) -> bool {
        matches!(self, Value::Float(_))
    }

    /// Truncating conversion, matching binary-record field widths.
    pub fn as_fixed(self) -> i32 {
        match self {
            Value::Fixed(v) => v,
            Value::Float(v) => v as i32,
        }
    }

    pub fn as_float(self) -> f64 {
        match self {
            Value::Fixed(v) => v as f64,
            Value::Float(v) => v,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Operator tree node. Immutable once built; evaluation recurses through
/// the operands.
#[derive(Clone, Debug)]
pub enum Expr {
    Const(Value),
    /// Read a fixed-value symbol (loop variable).
    Get(SymbolId),
    /// Assign a fixed-value symbol, yielding the stored value.
    Set(SymbolId, Box<Expr>),
    /// Increment or decrement a fixed-value symbol in place.
    Inc(SymbolId),
    Dec(SymbolId),
    Negate(Box<Expr>),
    /// Fixed-to-float promotion.
    ToFloat(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn fixed(v: i32) -> Self {
        Expr::Const(Value::Fixed(v))
    }

    pub fn float(v: f64) -> Self {
        Expr::Const(Value::Float(v))
    }

    /// Static result type of this tree.
    pub fn is_float(&self) -> bool {
        match self {
            Expr::Const(v) => v.is_float(),
            Expr::Get(_) | Expr::Set(..) | Expr::Inc(_) | Expr::Dec(_) => false,
            Expr::Negate(e) => e.is_float(),
            Expr::ToFloat(_) => true,
            Expr::Binary(_, a, b) => a.is_float() || b.is_float(),
        }
    }

    /// Evaluate the tree. Division by zero is reported as a diagnostic and
    /// yields zero rather than faulting.
    pub fn eval(
        &self,
        syms: &mut SymTab,
        sources: &SourceMap,
        msgs: &mut Messages,
        span: Span,
    ) -> Value {
        match self {
            Expr::Const(v) => *v,
            Expr::Get(id) => Value::Fixed(fixed_value(syms, *id)),
            Expr::Set(id, e) => {
                let v = e.eval(syms, sources, msgs, span).as_fixed();
                set_fixed(syms, *id, v);
                Value::Fixed(v)
            }
            Expr::Inc(id) => {
                let v = fixed_value(syms, *id).wrapping_add(1);
                set_fixed(syms, *id, v);
                Value::Fixed(v)
            }
            Expr::Dec(id) => {
                let v = fixed_value(syms, *id).wrapping_sub(1);
                set_fixed(syms, *id, v);
                Value::Fixed(v)
            }
            Expr::Negate(e) => match e.eval(syms, sources, msgs, span) {
                Value::Fixed(v) => Value::Fixed(v.wrapping_neg()),
                Value::Float(v) => Value::Float(-v),
            },
            Expr::ToFloat(e) => Value::Float(e.eval(syms, sources, msgs, span).as_float()),
            Expr::Binary(op, a, b) => {
                let lhs = a.eval(syms, sources, msgs, span);
                let rhs = b.eval(syms, sources, msgs, span);
                if lhs.is_float() || rhs.is_float() {
                    let (l, r) = (lhs.as_float(), rhs.as_float());
                    Value::Float(match op {
                        BinOp::Add => l + r,
                        BinOp::Sub => l - r,
                        BinOp::Mul => l * r,
                        BinOp::Div => {
                            if r == 0.0 {
                                msgs.report(
                                    sources,
                                    MessageId::ExpDivZero,
                                    span,
                                    "division by zero".to_string(),
                                );
                                return Value::Float(0.0);
                            }
                            l / r
                        }
                    })
                } else {
                    let (l, r) = (lhs.as_fixed(), rhs.as_fixed());
                    Value::Fixed(match op {
                        BinOp::Add => l.wrapping_add(r),
                        BinOp::Sub => l.wrapping_sub(r),
                        BinOp::Mul => l.wrapping_mul(r),
                        BinOp::Div => {
                            if r == 0 {
                                msgs.report(
                                    sources,
                                    MessageId::ExpDivZero,
                                    span,
                                    "division by zero".to_string(),
                                );
                                return Value::Fixed(0);
                            }
                            l.wrapping_div(r)
                        }
                    })
                }
            }
        }
    }
}

/// Current value of a fixed symbol; zero for any other kind.
pub fn fixed_value(syms: &SymTab, id: SymbolId) -> i32 {
    match &syms.get(id).kind {
        SymbolKind::Fixed { value } => *value,
        _ => 0,
    }
}

/// Store into a fixed symbol; ignored for any other kind.
pub fn set_fixed(syms: &mut SymTab, id: SymbolId, v: i32) {
    if let SymbolKind::Fixed { value } = &mut syms.get_mut(id).kind {
        *value = v;
    }
}

/// Everything the parser needs besides the statement buffer.
pub struct ExprEnv<'a> {
    pub syms: &'a SymTab,
    /// Current named group, for identifier resolution.
    pub scope: Option<SymbolId>,
    pub sources: &'a SourceMap,
    pub msgs: &'a mut Messages,
    /// Statement span, attached to every diagnostic.
    pub span: Span,
}

impl<'a> ExprEnv<'a> {
    fn report(&mut self, id: MessageId, text: &str) {
        self.msgs.report(self.sources, id, self.span, text.to_string());
    }
}

// Stack tokens. Precedence: terminators 0, open paren 2, additive 3,
// multiplicative 4, unary minus 9.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpTok {
    EndStmt,
    CloseParen,
    CloseBracket,
    OpenParen,
    Add,
    Sub,
    Mul,
    Div,
    Negate,
}

impl OpTok {
    fn prec(self) -> u8 {
        match self {
            OpTok::EndStmt | OpTok::CloseParen | OpTok::CloseBracket => 0,
            OpTok::OpenParen => 2,
            OpTok::Add | OpTok::Sub => 3,
            OpTok::Mul | OpTok::Div => 4,
            OpTok::Negate => 9,
        }
    }
}

/// How an expression is expected to end. The caller knows the context it
/// is parsing in; a leading `(` in statement context is an ordinary
/// grouping paren, never a clause opener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminator {
    /// `;` or the end of the buffer.
    Statement,
    /// A parenthesized clause value; the opening `(` is consumed here.
    Paren,
    /// A bracketed index or bound; the opening `[` is consumed here.
    Bracket,
}

/// Parse one expression starting at `pos`, ending at `term`.
///
/// On success the returned position is just past the terminator. Errors
/// are reported here; the caller abandons the statement.
pub fn generate(
    env: &mut ExprEnv,
    buf: &[u8],
    pos: usize,
    term: Terminator,
) -> Result<(usize, Expr), ()> {
    let mut pos = skip_blanks(buf, pos);
    let endop = match term {
        Terminator::Statement => OpTok::EndStmt,
        Terminator::Paren => {
            if buf.get(pos) != Some(&b'(') {
                env.report(MessageId::SynGeneric, "'(' expected");
                return Err(());
            }
            pos += 1;
            OpTok::CloseParen
        }
        Terminator::Bracket => {
            if buf.get(pos) != Some(&b'[') {
                env.report(MessageId::SynGeneric, "'[' expected");
                return Err(());
            }
            pos += 1;
            OpTok::CloseBracket
        }
    };

    let mut vstack: Vec<Expr> = Vec::new();
    let mut ostack: Vec<OpTok> = Vec::new();

    'operand: loop {
        // Unary operators.
        pos = skip_blanks(buf, pos);
        match buf.get(pos) {
            Some(b'+') => pos += 1,
            Some(b'-') => {
                if ostack.len() >= MAX_DEPTH {
                    env.report(MessageId::ExpComplex, "expression too complex");
                    return Err(());
                }
                ostack.push(OpTok::Negate);
                pos += 1;
            }
            _ => {}
        }

        // Grouping.
        pos = skip_blanks(buf, pos);
        if buf.get(pos) == Some(&b'(') {
            if ostack.len() >= MAX_DEPTH {
                env.report(MessageId::ExpComplex, "expression too complex");
                return Err(());
            }
            ostack.push(OpTok::OpenParen);
            pos += 1;
            continue 'operand;
        }

        // Operand: numeric literal or symbol reference.
        let c = buf.get(pos).copied().unwrap_or(0);
        let operand = if c == b'.' || c.is_ascii_digit() {
            let (p, e) = constant(env, buf, pos)?;
            pos = p;
            e
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let (p, e) = symbol_get(env, buf, pos)?;
            pos = p;
            e
        } else {
            env.report(MessageId::SynGeneric, "operand expected");
            return Err(());
        };
        if vstack.len() >= MAX_DEPTH {
            env.report(MessageId::ExpComplex, "expression too complex");
            return Err(());
        }
        vstack.push(operand);

        // Operator, possibly several after closing parentheses.
        'operator: loop {
            pos = skip_blanks(buf, pos);
            let op = match buf.get(pos) {
                Some(b'+') => OpTok::Add,
                Some(b'-') => OpTok::Sub,
                Some(b'*') => OpTok::Mul,
                Some(b'/') => OpTok::Div,
                Some(b')') => OpTok::CloseParen,
                Some(b']') => OpTok::CloseBracket,
                Some(b';') | None => OpTok::EndStmt,
                Some(_) => {
                    env.report(MessageId::SynGeneric, "operator expected");
                    return Err(());
                }
            };

            // Drain: reduce every stacked operator the incoming one does
            // not outrank. Equal precedence reduces, keeping binary
            // chains left-associative.
            while let Some(&top) = ostack.last() {
                if op.prec() > top.prec() {
                    break;
                }
                ostack.pop();
                match top {
                    OpTok::Add | OpTok::Sub | OpTok::Mul | OpTok::Div => {
                        if vstack.len() < 2 {
                            env.report(MessageId::BugOperandStack, "operand stack underflow");
                            return Err(());
                        }
                        let rhs = vstack.pop().ok_or(())?;
                        let lhs = vstack.pop().ok_or(())?;
                        vstack.push(binary(bin_of(top), lhs, rhs));
                    }
                    OpTok::Negate => {
                        let e = match vstack.pop() {
                            Some(e) => e,
                            None => {
                                env.report(
                                    MessageId::BugOperandStack,
                                    "operand stack underflow",
                                );
                                return Err(());
                            }
                        };
                        vstack.push(Expr::Negate(Box::new(e)));
                    }
                    OpTok::OpenParen => {
                        if op != OpTok::CloseParen {
                            env.report(MessageId::SynGeneric, "unmatched '('");
                            return Err(());
                        }
                        pos += 1;
                        continue 'operator;
                    }
                    _ => {}
                }
            }

            if op == endop && ostack.is_empty() {
                if pos < buf.len() {
                    pos += 1;
                }
                let result = match vstack.pop() {
                    Some(e) if vstack.is_empty() => e,
                    _ => {
                        env.report(MessageId::BugOperandStack, "operand stack imbalance");
                        return Err(());
                    }
                };
                return Ok((pos, result));
            }
            if op == OpTok::EndStmt || op == OpTok::CloseParen || op == OpTok::CloseBracket {
                env.report(MessageId::SynGeneric, "unexpected end of expression");
                return Err(());
            }
            if ostack.len() >= MAX_DEPTH {
                env.report(MessageId::ExpComplex, "expression too complex");
                return Err(());
            }
            ostack.push(op);
            pos += 1;
            continue 'operand;
        }
    }
}

fn bin_of(t: OpTok) -> BinOp {
    match t {
        OpTok::Add => BinOp::Add,
        OpTok::Sub => BinOp::Sub,
        OpTok::Mul => BinOp::Mul,
        _ => BinOp::Div,
    }
}

/// Build a binary node, promoting the fixed side when types are mixed.
fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let (lhs, rhs) = if lhs.is_float() != rhs.is_float() {
        if lhs.is_float() {
            (lhs, Expr::ToFloat(Box::new(rhs)))
        } else {
            (Expr::ToFloat(Box::new(lhs)), rhs)
        }
    } else {
        (lhs, rhs)
    };
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}

/// Numeric literal. A decimal point selects float mode; a second point is
/// a syntax error.
fn constant(env: &mut ExprEnv, buf: &[u8], mut pos: usize) -> Result<(usize, Expr), ()> {
    let start = pos;
    let mut points = 0;
    while let Some(&c) = buf.get(pos) {
        if c.is_ascii_digit() {
            pos += 1;
        } else if c == b'.' {
            points += 1;
            if points > 1 {
                env.report(MessageId::SynGeneric, "malformed numeric constant");
                return Err(());
            }
            pos += 1;
        } else {
            break;
        }
    }
    let text = String::from_utf8_lossy(&buf[start..pos]);
    if points > 0 {
        match text.parse::<f64>() {
            Ok(v) => Ok((pos, Expr::float(v))),
            Err(_) => {
                env.report(MessageId::SynGeneric, "malformed numeric constant");
                Err(())
            }
        }
    } else {
        match text.parse::<i32>() {
            Ok(v) => Ok((pos, Expr::fixed(v))),
            Err(_) => {
                env.report(MessageId::SynGeneric, "numeric constant out of range");
                Err(())
            }
        }
    }
}

/// Identifier reference, resolved immediately against the internal table.
/// Unknown names are a hard error here; the deferred-resolution path only
/// applies to neuron storage addresses.
fn symbol_get(env: &mut ExprEnv, buf: &[u8], pos: usize) -> Result<(usize, Expr), ()> {
    let (pos, word) = next_word(buf, pos);
    match env.syms.locate_qualified(Table::Internal, env.scope, &word) {
        Some(id) => match env.syms.get(id).kind {
            SymbolKind::Fixed { .. } => Ok((pos, Expr::Get(id))),
            _ => {
                env.report(MessageId::SymBadName, "symbol is not a value");
                Err(())
            }
        },
        None => {
            env.report(MessageId::SymNotFound, "symbol not found");
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Messages;
    use crate::span::SourceMap;

    struct Fix {
        syms: SymTab,
        sources: SourceMap,
        msgs: Messages,
    }

    impl Fix {
        fn new() -> Self {
            Self {
                syms: SymTab::new(),
                sources: SourceMap::new(),
                msgs: Messages::new(false),
            }
        }

        fn parse_as(&mut self, text: &str, term: Terminator) -> Result<Expr, ()> {
            let mut env = ExprEnv {
                syms: &self.syms,
                scope: None,
                sources: &self.sources,
                msgs: &mut self.msgs,
                span: Span::dummy(),
            };
            generate(&mut env, text.as_bytes(), 0, term).map(|(_, e)| e)
        }

        fn parse(&mut self, text: &str) -> Result<Expr, ()> {
            self.parse_as(text, Terminator::Statement)
        }

        fn eval(&mut self, text: &str) -> Value {
            let e = self.parse(text).unwrap();
            e.eval(&mut self.syms, &self.sources, &mut self.msgs, Span::dummy())
        }
    }

    #[test]
    fn test_precedence() {
        let mut f = Fix::new();
        assert_eq!(f.eval("2+3*4;"), Value::Fixed(14));
        assert_eq!(f.eval("(2+3)*4;"), Value::Fixed(20));
        assert_eq!(f.eval("2*3+4;"), Value::Fixed(10));
    }

    #[test]
    fn test_leading_paren_is_grouping() {
        // A statement-context expression may open with a parenthesized
        // subexpression without ending at its closing paren.
        let mut f = Fix::new();
        assert_eq!(f.eval("(1+1)*2;"), Value::Fixed(4));
        assert_eq!(f.eval("((2+3))*4;"), Value::Fixed(20));
        assert_eq!(f.eval("(2*3)+(4*5);"), Value::Fixed(26));
        assert_eq!(f.eval("(7);"), Value::Fixed(7));
    }

    #[test]
    fn test_left_associativity() {
        let mut f = Fix::new();
        assert_eq!(f.eval("8-4-2;"), Value::Fixed(2));
        assert_eq!(f.eval("16/4/2;"), Value::Fixed(2));
    }

    #[test]
    fn test_unary_minus() {
        let mut f = Fix::new();
        assert_eq!(f.eval("-3;"), Value::Fixed(-3));
        assert_eq!(f.eval("-2*3;"), Value::Fixed(-6));
        assert_eq!(f.eval("4--3;"), Value::Fixed(7));
        assert_eq!(f.eval("+5;"), Value::Fixed(5));
    }

    #[test]
    fn test_float_promotion() {
        let mut f = Fix::new();
        let e = f.parse("2+3.5;").unwrap();
        assert!(e.is_float());
        assert_eq!(
            e.eval(&mut f.syms, &f.sources, &mut f.msgs, Span::dummy()),
            Value::Float(5.5)
        );
        assert_eq!(f.eval("1/2;"), Value::Fixed(0));
        assert_eq!(f.eval("1.0/2;"), Value::Float(0.5));
    }

    #[test]
    fn test_bracket_and_paren_terminators() {
        let mut f = Fix::new();
        let e = f.parse_as("[3*4] rest", Terminator::Bracket).unwrap();
        assert_eq!(
            e.eval(&mut f.syms, &f.sources, &mut f.msgs, Span::dummy()),
            Value::Fixed(12)
        );
        let e = f.parse_as("((1+1)*3) rest", Terminator::Paren).unwrap();
        assert_eq!(
            e.eval(&mut f.syms, &f.sources, &mut f.msgs, Span::dummy()),
            Value::Fixed(6)
        );
        // The clause opener must actually be there.
        assert!(f.parse_as("1+1)", Terminator::Paren).is_err());
    }

    #[test]
    fn test_symbol_reference() {
        let mut f = Fix::new();
        let id = f
            .syms
            .insert(
                Table::Internal,
                None,
                "i",
                Span::dummy(),
                SymbolKind::Fixed { value: 7 },
            )
            .unwrap();
        assert_eq!(f.eval("i*2;"), Value::Fixed(14));

        // Set and step nodes mutate the stored value.
        Expr::Set(id, Box::new(Expr::fixed(3))).eval(
            &mut f.syms,
            &f.sources,
            &mut f.msgs,
            Span::dummy(),
        );
        assert_eq!(f.eval("i;"), Value::Fixed(3));
        Expr::Inc(id).eval(&mut f.syms, &f.sources, &mut f.msgs, Span::dummy());
        assert_eq!(f.eval("i;"), Value::Fixed(4));
        Expr::Dec(id).eval(&mut f.syms, &f.sources, &mut f.msgs, Span::dummy());
        assert_eq!(f.eval("i;"), Value::Fixed(3));
    }

    #[test]
    fn test_syntax_errors() {
        let mut f = Fix::new();
        assert!(f.parse("2+;").is_err());
        assert!(f.parse("(2+3;").is_err());
        assert!(f.parse("2..5;").is_err());
        assert!(f.parse("nosuch;").is_err());
        assert!(f.parse("2 @ 3;").is_err());
    }

    #[test]
    fn test_division_by_zero_reports() {
        let mut f = Fix::new();
        assert_eq!(f.eval("1/0;"), Value::Fixed(0));
        assert_eq!(f.msgs.warn_count, 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut f = Fix::new();
        let deep = format!("{}1{};", "(".repeat(MAX_DEPTH + 4), ")".repeat(MAX_DEPTH + 4));
        assert!(f.parse(&deep).is_err());
    }
}
