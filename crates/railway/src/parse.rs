//! The surface syntax tree and recursive-descent parser.
//!
//! The parser produces an unchecked tree; mono propagation, constant
//! folding and the compile-time legality checks happen in the lowering
//! pass. Operator precedence, loosest to tightest: `|`, `&`, `^`,
//! comparisons, `+ -`, `* / // %`, `**`, with all binary operators
//! left-associative.

use std::fmt;

use crate::{
    expressions::{BinaryOp, UnaryOp},
    lex::{Token, TokenKind},
    statements::ModOp,
    value::Number,
};

#[derive(Debug, Clone)]
pub(crate) struct AstLookup {
    pub name: String,
    pub index: Vec<AstExpr>,
}

#[derive(Debug, Clone)]
pub(crate) enum AstExpr {
    Number(Number),
    Lookup(AstLookup),
    Length(AstLookup),
    Binop {
        lhs: Box<AstExpr>,
        op: BinaryOp,
        rhs: Box<AstExpr>,
    },
    Uniop {
        op: UnaryOp,
        expr: Box<AstExpr>,
    },
    ArrayLiteral(Vec<AstExpr>),
    ArrayRange {
        start: Box<AstExpr>,
        stop: Box<AstExpr>,
        step: Option<Box<AstExpr>>,
    },
    ArrayTensor {
        fill: Box<AstExpr>,
        dims: Box<AstExpr>,
    },
    ThreadId,
    NumThreads,
}

#[derive(Debug, Clone)]
pub(crate) enum AstPrintItem {
    Text(String),
    Value(AstExpr),
}

#[derive(Debug, Clone)]
pub(crate) struct AstCallBlock {
    pub uncall: bool,
    pub name: String,
    pub num_threads: Option<AstExpr>,
    pub borrowed: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct AstStatement {
    pub line: u32,
    pub kind: AstStatementKind,
}

#[derive(Debug, Clone)]
pub(crate) enum AstStatementKind {
    Let {
        name: String,
        rhs: Option<AstExpr>,
    },
    Unlet {
        name: String,
        rhs: Option<AstExpr>,
    },
    Promote {
        src: String,
        dst: String,
    },
    Swap {
        lhs: AstLookup,
        rhs: AstLookup,
    },
    Push {
        src: AstLookup,
        dst: AstLookup,
    },
    Pop {
        src: AstLookup,
        dst: AstLookup,
    },
    Modop {
        lookup: AstLookup,
        op: ModOp,
        expr: AstExpr,
    },
    If {
        enter: AstExpr,
        lines: Vec<AstStatement>,
        else_lines: Vec<AstStatement>,
        exit: Option<AstExpr>,
    },
    Loop {
        forward: AstExpr,
        lines: Vec<AstStatement>,
        backward: Option<AstExpr>,
    },
    For {
        name: String,
        iterator: AstExpr,
        lines: Vec<AstStatement>,
    },
    Try {
        name: String,
        iterator: AstExpr,
        lines: Vec<AstStatement>,
    },
    Catch(AstExpr),
    DoUndo {
        do_lines: Vec<AstStatement>,
        yield_lines: Vec<AstStatement>,
    },
    Print {
        items: Vec<AstPrintItem>,
        newline: bool,
    },
    Barrier(String),
    Mutex {
        name: String,
        lines: Vec<AstStatement>,
    },
    Call {
        in_params: Vec<String>,
        blocks: Vec<AstCallBlock>,
        out_params: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct AstFunction {
    pub line: u32,
    pub name: String,
    pub borrowed_params: Vec<String>,
    pub in_params: Vec<String>,
    pub lines: Vec<AstStatement>,
    pub out_params: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum AstItem {
    Import {
        line: u32,
        path: String,
        alias: Option<String>,
    },
    Global {
        line: u32,
        name: String,
        rhs: Option<AstExpr>,
    },
    Function(AstFunction),
}

/// A syntax error with the position of the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at line {}, col {}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for ParseError {}

type ParseResult<T> = Result<T, ParseError>;

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn module(mut self) -> ParseResult<Vec<AstItem>> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                TokenKind::End => return Ok(items),
                TokenKind::Import => items.push(self.import_item()?),
                TokenKind::Global => items.push(self.global_item()?),
                TokenKind::Func => items.push(AstItem::Function(self.function()?)),
                _ => return Err(self.unexpected("expected import, global or func")),
            }
        }
    }

    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.peek() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> ParseError {
        let token = self.current();
        let found = match token.kind {
            TokenKind::End => "end of input".to_owned(),
            TokenKind::Newline => "end of line".to_owned(),
            _ => format!("\"{}\"", token.text),
        };
        ParseError {
            line: token.line,
            col: token.col,
            message: format!("{what}, found {found}"),
        }
    }

    /// A plain or mono name: an optional `.` glued onto a NAME.
    fn name(&mut self) -> ParseResult<String> {
        if self.accept(TokenKind::Dot) {
            let token = self.expect(TokenKind::Name, "expected a name after \".\"")?;
            Ok(format!(".{}", token.text))
        } else {
            let token = self.expect(TokenKind::Name, "expected a name")?;
            Ok(token.text)
        }
    }

    fn import_item(&mut self) -> ParseResult<AstItem> {
        let line = self.current().line;
        self.advance();
        let path = self.expect(TokenKind::Str, "expected a quoted path after import")?.text;
        let alias = if self.accept(TokenKind::As) {
            Some(self.name()?)
        } else {
            None
        };
        self.expect(TokenKind::Newline, "expected end of line after import")?;
        Ok(AstItem::Import { line, path, alias })
    }

    fn global_item(&mut self) -> ParseResult<AstItem> {
        let line = self.current().line;
        self.advance();
        let name = self.name()?;
        let rhs = if self.accept(TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Newline, "expected end of line after global")?;
        Ok(AstItem::Global { line, name, rhs })
    }

    fn function(&mut self) -> ParseResult<AstFunction> {
        let line = self.current().line;
        self.advance();
        let name = self.name()?;
        let borrowed_params = self.param_tuple()?;
        let in_params = self.param_tuple()?;
        self.expect(TokenKind::Newline, "expected end of line after func header")?;
        let lines = self.statements(&[TokenKind::Return])?;
        self.expect(TokenKind::Return, "expected return to close the function")?;
        let out_params = self.param_tuple()?;
        self.expect(TokenKind::Newline, "expected end of line after return")?;
        Ok(AstFunction {
            line,
            name,
            borrowed_params,
            in_params,
            lines,
            out_params,
        })
    }

    fn param_tuple(&mut self) -> ParseResult<Vec<String>> {
        self.expect(TokenKind::LParen, "expected \"(\"")?;
        let mut params = Vec::new();
        if self.peek() != TokenKind::RParen {
            loop {
                params.push(self.name()?);
                if !self.accept(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "expected \")\"")?;
        Ok(params)
    }

    /// Statements up to (not including) any of the closing keywords.
    fn statements(&mut self, closers: &[TokenKind]) -> ParseResult<Vec<AstStatement>> {
        let mut lines = Vec::new();
        while !closers.contains(&self.peek()) {
            if self.peek() == TokenKind::End {
                return Err(self.unexpected("unterminated block"));
            }
            let stmt = self.statement()?;
            self.expect(TokenKind::Newline, "expected end of line after statement")?;
            lines.push(stmt);
        }
        Ok(lines)
    }

    fn statement(&mut self) -> ParseResult<AstStatement> {
        let line = self.current().line;
        let kind = match self.peek() {
            TokenKind::Let => {
                self.advance();
                let name = self.name()?;
                let rhs = if self.accept(TokenKind::Assign) {
                    Some(self.expression()?)
                } else {
                    None
                };
                AstStatementKind::Let { name, rhs }
            }
            TokenKind::Unlet => {
                self.advance();
                let name = self.name()?;
                let rhs = if self.accept(TokenKind::Assign) {
                    Some(self.expression()?)
                } else {
                    None
                };
                AstStatementKind::Unlet { name, rhs }
            }
            TokenKind::Promote => {
                self.advance();
                let first = self.name()?;
                if self.accept(TokenKind::RightArrow) {
                    let dst = self.name()?;
                    AstStatementKind::Promote { src: first, dst }
                } else {
                    self.expect(TokenKind::Leq, "expected \"=>\" or \"<=\" in promote")?;
                    let src = self.name()?;
                    AstStatementKind::Promote { src, dst: first }
                }
            }
            TokenKind::Swap => {
                self.advance();
                let lhs = self.lookup()?;
                self.expect(TokenKind::SwapArrow, "expected \"<=>\" in swap")?;
                let rhs = self.lookup()?;
                AstStatementKind::Swap { lhs, rhs }
            }
            TokenKind::Push => {
                self.advance();
                let first = self.lookup()?;
                if self.accept(TokenKind::RightArrow) {
                    let dst = self.lookup()?;
                    AstStatementKind::Push { src: first, dst }
                } else {
                    self.expect(TokenKind::Leq, "expected \"=>\" or \"<=\" in push")?;
                    let src = self.lookup()?;
                    AstStatementKind::Push { src, dst: first }
                }
            }
            TokenKind::Pop => {
                self.advance();
                let first = self.lookup()?;
                if self.accept(TokenKind::RightArrow) {
                    let dst = self.lookup()?;
                    AstStatementKind::Pop { src: first, dst }
                } else {
                    self.expect(TokenKind::Leq, "expected \"=>\" or \"<=\" in pop")?;
                    let src = self.lookup()?;
                    AstStatementKind::Pop { src, dst: first }
                }
            }
            TokenKind::If => {
                self.advance();
                self.expect(TokenKind::LParen, "expected \"(\" after if")?;
                let enter = self.expression()?;
                self.expect(TokenKind::RParen, "expected \")\"")?;
                self.expect(TokenKind::Newline, "expected end of line after if condition")?;
                let lines = self.statements(&[TokenKind::Else, TokenKind::Fi])?;
                let else_lines = if self.accept(TokenKind::Else) {
                    self.expect(TokenKind::Newline, "expected end of line after else")?;
                    self.statements(&[TokenKind::Fi])?
                } else {
                    Vec::new()
                };
                self.expect(TokenKind::Fi, "expected fi to close the if")?;
                self.expect(TokenKind::LParen, "expected \"(\" after fi")?;
                let exit = if self.peek() == TokenKind::RParen {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::RParen, "expected \")\"")?;
                AstStatementKind::If {
                    enter,
                    lines,
                    else_lines,
                    exit,
                }
            }
            TokenKind::Loop => {
                self.advance();
                self.expect(TokenKind::LParen, "expected \"(\" after loop")?;
                let forward = self.expression()?;
                self.expect(TokenKind::RParen, "expected \")\"")?;
                self.expect(TokenKind::Newline, "expected end of line after loop condition")?;
                let lines = self.statements(&[TokenKind::Pool])?;
                self.expect(TokenKind::Pool, "expected pool to close the loop")?;
                self.expect(TokenKind::LParen, "expected \"(\" after pool")?;
                let backward = if self.peek() == TokenKind::RParen {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::RParen, "expected \")\"")?;
                AstStatementKind::Loop {
                    forward,
                    lines,
                    backward,
                }
            }
            TokenKind::For => {
                self.advance();
                self.expect(TokenKind::LParen, "expected \"(\" after for")?;
                let name = self.name()?;
                self.expect(TokenKind::In, "expected in")?;
                let iterator = self.expression()?;
                self.expect(TokenKind::RParen, "expected \")\"")?;
                self.expect(TokenKind::Newline, "expected end of line after for header")?;
                let lines = self.statements(&[TokenKind::Rof])?;
                self.expect(TokenKind::Rof, "expected rof to close the for")?;
                AstStatementKind::For {
                    name,
                    iterator,
                    lines,
                }
            }
            TokenKind::Try => {
                self.advance();
                self.expect(TokenKind::LParen, "expected \"(\" after try")?;
                let name = self.name()?;
                self.expect(TokenKind::In, "expected in")?;
                let iterator = self.expression()?;
                self.expect(TokenKind::RParen, "expected \")\"")?;
                self.expect(TokenKind::Newline, "expected end of line after try header")?;
                let lines = self.statements(&[TokenKind::Yrt])?;
                self.expect(TokenKind::Yrt, "expected yrt to close the try")?;
                AstStatementKind::Try {
                    name,
                    iterator,
                    lines,
                }
            }
            TokenKind::Catch => {
                self.advance();
                self.expect(TokenKind::LParen, "expected \"(\" after catch")?;
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "expected \")\"")?;
                AstStatementKind::Catch(expr)
            }
            TokenKind::Do => {
                self.advance();
                self.expect(TokenKind::Newline, "expected end of line after do")?;
                let do_lines = self.statements(&[TokenKind::Yield, TokenKind::Undo])?;
                let yield_lines = if self.accept(TokenKind::Yield) {
                    self.expect(TokenKind::Newline, "expected end of line after yield")?;
                    self.statements(&[TokenKind::Undo])?
                } else {
                    Vec::new()
                };
                self.expect(TokenKind::Undo, "expected undo to close the do")?;
                AstStatementKind::DoUndo {
                    do_lines,
                    yield_lines,
                }
            }
            TokenKind::Print | TokenKind::Println => {
                let newline = self.peek() == TokenKind::Println;
                self.advance();
                self.expect(TokenKind::LParen, "expected \"(\"")?;
                let mut items = Vec::new();
                if self.peek() != TokenKind::RParen {
                    loop {
                        if self.peek() == TokenKind::Str {
                            items.push(AstPrintItem::Text(self.advance().text));
                        } else {
                            items.push(AstPrintItem::Value(self.expression()?));
                        }
                        if !self.accept(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "expected \")\"")?;
                AstStatementKind::Print { items, newline }
            }
            TokenKind::Barrier => {
                self.advance();
                let name = self.expect(TokenKind::Str, "expected a quoted barrier name")?.text;
                AstStatementKind::Barrier(name)
            }
            TokenKind::Mutex => {
                self.advance();
                let name = self.expect(TokenKind::Str, "expected a quoted mutex name")?.text;
                self.expect(TokenKind::Newline, "expected end of line after mutex name")?;
                let lines = self.statements(&[TokenKind::Xetum])?;
                self.expect(TokenKind::Xetum, "expected xetum to close the mutex")?;
                AstStatementKind::Mutex { name, lines }
            }
            TokenKind::Call | TokenKind::Uncall | TokenKind::LParen => self.call_statement()?,
            TokenKind::Name | TokenKind::Dot => {
                let lookup = self.lookup()?;
                let op = self.modop()?;
                let expr = self.expression()?;
                AstStatementKind::Modop { lookup, op, expr }
            }
            _ => return Err(self.unexpected("expected a statement")),
        };
        Ok(AstStatement { line, kind })
    }

    fn modop(&mut self) -> ParseResult<ModOp> {
        let op = match self.peek() {
            TokenKind::AddEq => ModOp::Add,
            TokenKind::SubEq => ModOp::Sub,
            TokenKind::MulEq => ModOp::Mul,
            TokenKind::DivEq => ModOp::Div,
            TokenKind::IDivEq => ModOp::IDiv,
            TokenKind::PowEq => ModOp::Pow,
            TokenKind::ModEq => ModOp::Mod,
            TokenKind::XorEq => ModOp::Xor,
            TokenKind::OrEq => ModOp::Or,
            TokenKind::AndEq => ModOp::And,
            _ => return Err(self.unexpected("expected a modification operator")),
        };
        self.advance();
        Ok(op)
    }

    /// A call chain, in either arrow direction:
    /// `(in) => call f(b) => uncall g() => (out)` or the mirrored
    /// `(out) <= call f(b) <= (in)`. With `<=` the data flows right to
    /// left, so the blocks run in reverse of their written order.
    fn call_statement(&mut self) -> ParseResult<AstStatementKind> {
        let leading = if self.peek() == TokenKind::LParen {
            Some(self.param_tuple()?)
        } else {
            None
        };
        let arrow = match (leading.is_some(), self.peek()) {
            (true, TokenKind::RightArrow) | (true, TokenKind::Leq) => {
                let forward = self.peek() == TokenKind::RightArrow;
                self.advance();
                Some(forward)
            }
            (true, _) => return Err(self.unexpected("expected \"=>\" or \"<=\" after call tuple")),
            (false, _) => None,
        };

        let mut blocks = vec![self.call_block()?];
        let mut trailing = None;
        let mut forward = arrow;
        loop {
            let next = match (forward, self.peek()) {
                (Some(true) | None, TokenKind::RightArrow) => true,
                (Some(false) | None, TokenKind::Leq) => false,
                _ => break,
            };
            forward = Some(next);
            self.advance();
            if self.peek() == TokenKind::LParen {
                trailing = Some(self.param_tuple()?);
                break;
            }
            blocks.push(self.call_block()?);
        }

        Ok(match forward {
            // Right-to-left spelling: the trailing tuple is the input
            // end and execution order is reversed.
            Some(false) => {
                blocks.reverse();
                AstStatementKind::Call {
                    in_params: trailing.unwrap_or_default(),
                    blocks,
                    out_params: leading.unwrap_or_default(),
                }
            }
            _ => AstStatementKind::Call {
                in_params: leading.unwrap_or_default(),
                blocks,
                out_params: trailing.unwrap_or_default(),
            },
        })
    }

    fn call_block(&mut self) -> ParseResult<AstCallBlock> {
        let uncall = match self.peek() {
            TokenKind::Call => false,
            TokenKind::Uncall => true,
            _ => return Err(self.unexpected("expected call or uncall")),
        };
        self.advance();
        let name = self.name()?;
        let num_threads = if self.accept(TokenKind::LBrace) {
            let expr = self.expression()?;
            self.expect(TokenKind::RBrace, "expected \"}\"")?;
            Some(expr)
        } else {
            None
        };
        let borrowed = self.param_tuple()?;
        Ok(AstCallBlock {
            uncall,
            name,
            num_threads,
            borrowed,
        })
    }

    fn lookup(&mut self) -> ParseResult<AstLookup> {
        let name = self.name()?;
        let mut index = Vec::new();
        while self.accept(TokenKind::LBracket) {
            index.push(self.expression()?);
            self.expect(TokenKind::RBracket, "expected \"]\"")?;
        }
        Ok(AstLookup { name, index })
    }

    pub fn expression(&mut self) -> ParseResult<AstExpr> {
        self.binary_level(0)
    }

    /// Precedence climbing over the binary operator tiers.
    fn binary_level(&mut self, level: usize) -> ParseResult<AstExpr> {
        const TIERS: &[&[(TokenKind, BinaryOp)]] = &[
            &[(TokenKind::Pipe, BinaryOp::Or)],
            &[(TokenKind::Amp, BinaryOp::And)],
            &[(TokenKind::Caret, BinaryOp::Xor)],
            &[
                (TokenKind::Less, BinaryOp::Less),
                (TokenKind::Leq, BinaryOp::Leq),
                (TokenKind::Greater, BinaryOp::Great),
                (TokenKind::Geq, BinaryOp::Geq),
                (TokenKind::EqEq, BinaryOp::Eq),
                (TokenKind::NotEq, BinaryOp::Neq),
            ],
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::IDiv, BinaryOp::IDiv),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            &[(TokenKind::Pow, BinaryOp::Pow)],
        ];
        if level == TIERS.len() {
            return self.atom();
        }
        let mut lhs = self.binary_level(level + 1)?;
        'outer: loop {
            for (kind, op) in TIERS[level] {
                if self.peek() == *kind {
                    self.advance();
                    let rhs = self.binary_level(level + 1)?;
                    lhs = AstExpr::Binop {
                        lhs: Box::new(lhs),
                        op: *op,
                        rhs: Box::new(rhs),
                    };
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn atom(&mut self) -> ParseResult<AstExpr> {
        match self.peek() {
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "expected \")\"")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.array_constructor(),
            TokenKind::Number => {
                let token = self.advance();
                Number::parse(&token.text).map(AstExpr::Number).ok_or(ParseError {
                    line: token.line,
                    col: token.col,
                    message: format!("invalid number literal \"{}\"", token.text),
                })
            }
            TokenKind::ThreadId => {
                self.advance();
                Ok(AstExpr::ThreadId)
            }
            TokenKind::NumThreads => {
                self.advance();
                Ok(AstExpr::NumThreads)
            }
            TokenKind::Minus => {
                self.advance();
                let expr = self.atom()?;
                Ok(AstExpr::Uniop {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                })
            }
            TokenKind::Bang => {
                self.advance();
                let expr = self.atom()?;
                Ok(AstExpr::Uniop {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                })
            }
            TokenKind::Hash => {
                self.advance();
                Ok(AstExpr::Length(self.lookup()?))
            }
            TokenKind::Name | TokenKind::Dot => Ok(AstExpr::Lookup(self.lookup()?)),
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    /// `[a, b, …]`, `[start to stop by step]` or `[fill tensor dims]`.
    fn array_constructor(&mut self) -> ParseResult<AstExpr> {
        self.expect(TokenKind::LBracket, "expected \"[\"")?;
        if self.accept(TokenKind::RBracket) {
            return Ok(AstExpr::ArrayLiteral(Vec::new()));
        }
        let first = self.expression()?;
        match self.peek() {
            TokenKind::To => {
                self.advance();
                let stop = self.expression()?;
                let step = if self.accept(TokenKind::By) {
                    Some(Box::new(self.expression()?))
                } else {
                    None
                };
                self.expect(TokenKind::RBracket, "expected \"]\"")?;
                Ok(AstExpr::ArrayRange {
                    start: Box::new(first),
                    stop: Box::new(stop),
                    step,
                })
            }
            TokenKind::Tensor => {
                self.advance();
                let dims = self.expression()?;
                self.expect(TokenKind::RBracket, "expected \"]\"")?;
                Ok(AstExpr::ArrayTensor {
                    fill: Box::new(first),
                    dims: Box::new(dims),
                })
            }
            _ => {
                let mut items = vec![first];
                while self.accept(TokenKind::Comma) {
                    items.push(self.expression()?);
                }
                self.expect(TokenKind::RBracket, "expected \"]\"")?;
                Ok(AstExpr::ArrayLiteral(items))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenise;

    fn parse_module(source: &str) -> Vec<AstItem> {
        Parser::new(tokenise(source).unwrap()).module().unwrap()
    }

    fn parse_stmt(source: &str) -> AstStatementKind {
        let module = parse_module(&format!("func f()()\n{source}\nreturn ()\n"));
        let AstItem::Function(func) = &module[0] else {
            panic!("expected a function");
        };
        func.lines[0].kind.clone()
    }

    fn parse_expr(source: &str) -> AstExpr {
        let mut parser = Parser::new(tokenise(source).unwrap());
        parser.expression().unwrap()
    }

    #[test]
    fn function_headers_carry_three_param_lists() {
        let module = parse_module("func step(data, .flag)(x)\nx += 1\nreturn (x)\n");
        let AstItem::Function(func) = &module[0] else {
            panic!("expected a function");
        };
        assert_eq!(func.name, "step");
        assert_eq!(func.borrowed_params, vec!["data", ".flag"]);
        assert_eq!(func.in_params, vec!["x"]);
        assert_eq!(func.out_params, vec!["x"]);
    }

    #[test]
    fn precedence_nests_tighter_operators_deeper() {
        let AstExpr::Binop { op, rhs, .. } = parse_expr("1 + 2 * 3") else {
            panic!("expected a binop");
        };
        assert_eq!(op, BinaryOp::Add);
        let AstExpr::Binop { op: inner, .. } = *rhs else {
            panic!("expected a nested binop");
        };
        assert_eq!(inner, BinaryOp::Mul);

        // `|` binds loosest of all.
        let AstExpr::Binop { op, .. } = parse_expr("1 < 2 | 3 < 4") else {
            panic!("expected a binop");
        };
        assert_eq!(op, BinaryOp::Or);
    }

    #[test]
    fn left_associativity() {
        let AstExpr::Binop { lhs, op, .. } = parse_expr("10 - 2 - 3") else {
            panic!("expected a binop");
        };
        assert_eq!(op, BinaryOp::Sub);
        assert!(matches!(*lhs, AstExpr::Binop { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn array_constructors() {
        assert!(matches!(parse_expr("[]"), AstExpr::ArrayLiteral(items) if items.is_empty()));
        assert!(matches!(parse_expr("[1, 2, 3]"), AstExpr::ArrayLiteral(items) if items.len() == 3));
        assert!(matches!(
            parse_expr("[0 to 10 by 2]"),
            AstExpr::ArrayRange { step: Some(_), .. }
        ));
        assert!(matches!(parse_expr("[0 to 10]"), AstExpr::ArrayRange { step: None, .. }));
        assert!(matches!(parse_expr("[0 tensor [2, 3]]"), AstExpr::ArrayTensor { .. }));
    }

    #[test]
    fn mono_names_parse_with_their_dot() {
        let AstStatementKind::Let { name, .. } = parse_stmt("let .scratch = 1") else {
            panic!("expected let");
        };
        assert_eq!(name, ".scratch");
    }

    #[test]
    fn reversed_arrows_mirror_push_and_pop() {
        let AstStatementKind::Push { src, dst } = parse_stmt("push stack <= item") else {
            panic!("expected push");
        };
        assert_eq!(src.name, "item");
        assert_eq!(dst.name, "stack");
        let AstStatementKind::Pop { src, dst } = parse_stmt("pop item <= stack") else {
            panic!("expected pop");
        };
        assert_eq!(src.name, "stack");
        assert_eq!(dst.name, "item");
    }

    #[test]
    fn forward_call_chains() {
        let AstStatementKind::Call {
            in_params,
            blocks,
            out_params,
        } = parse_stmt("(a) => call f(shared) => uncall g() => (b, c)")
        else {
            panic!("expected call");
        };
        assert_eq!(in_params, vec!["a"]);
        assert_eq!(out_params, vec!["b", "c"]);
        assert_eq!(blocks.len(), 2);
        assert!(!blocks[0].uncall);
        assert_eq!(blocks[0].name, "f");
        assert_eq!(blocks[0].borrowed, vec!["shared"]);
        assert!(blocks[1].uncall);
    }

    #[test]
    fn reversed_call_chains_run_right_to_left() {
        let AstStatementKind::Call {
            in_params,
            blocks,
            out_params,
        } = parse_stmt("(b) <= call g() <= call f() <= (a)")
        else {
            panic!("expected call");
        };
        assert_eq!(in_params, vec!["a"]);
        assert_eq!(out_params, vec!["b"]);
        assert_eq!(blocks[0].name, "f");
        assert_eq!(blocks[1].name, "g");
    }

    #[test]
    fn parallel_call_blocks_carry_thread_counts() {
        let AstStatementKind::Call { blocks, .. } = parse_stmt("(xs) => call work{4}(shared) => (ys)")
        else {
            panic!("expected call");
        };
        assert!(blocks[0].num_threads.is_some());
    }

    #[test]
    fn if_with_else_and_empty_exit() {
        let AstStatementKind::If {
            else_lines, exit, ..
        } = parse_stmt("if (x > 0)\nx += 1\nelse\nx -= 1\nfi ()")
        else {
            panic!("expected if");
        };
        assert_eq!(else_lines.len(), 1);
        assert!(exit.is_none());
    }

    #[test]
    fn do_yield_undo() {
        let AstStatementKind::DoUndo {
            do_lines,
            yield_lines,
        } = parse_stmt("do\nlet t = 1\nyield\nx += t\nundo")
        else {
            panic!("expected do/undo");
        };
        assert_eq!(do_lines.len(), 1);
        assert_eq!(yield_lines.len(), 1);
    }

    #[test]
    fn parse_errors_carry_positions() {
        let err = Parser::new(tokenise("func f()(\n").unwrap()).module().unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn mixed_call_arrows_are_rejected() {
        let tokens = tokenise("func f()()\n(a) => call g() <= (b)\nreturn ()\n").unwrap();
        assert!(Parser::new(tokens).module().is_err());
    }
}
