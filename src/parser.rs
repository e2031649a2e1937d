//! Parser for Jack source text.
//!
//! Declarations and statements are parsed by recursive descent; expressions
//! use Pratt (top-down operator precedence) parsing. Expression dispatch is
//! table-driven: a category-keyed table covers integers, strings, and
//! identifiers, and a lexeme-keyed table covers specific symbols and the
//! literal keywords. Lexeme entries take precedence over category entries.
//!
//! Errors are collected rather than thrown: on a syntax error the parser
//! records a diagnostic and drops tokens until a safe harbor (`;`, consumed,
//! or a declaration/statement keyword, left in place), then resumes. A file
//! that produced any diagnostic yields no AST to callers. Lex errors are
//! fatal and stop the parse immediately.

use crate::ast::{
    BinaryOp, Class, ClassVarDec, ClassVarKind, Expr, ExprKind, KeywordLit, Param, Span,
    Statement, SubroutineDec, SubroutineKind, UnaryOp, VarDec,
};
use crate::error::Diagnostic;
use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::types::Type;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Binding strength for Pratt expression parsing, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    /// `=`
    Equals,
    /// `<` `>`
    Compare,
    /// `+` `-` `|`
    Sum,
    /// `*` `/` `&`
    Product,
    /// unary `-` `~`
    Prefix,
    /// `.`
    Call,
    /// `[`
    Index,
}

type NudFn = fn(&mut Parser<'_>) -> Result<Expr, Diagnostic>;
type LedFn = fn(&mut Parser<'_>, Expr) -> Result<Expr, Diagnostic>;

/// One entry of a dispatch table: how a token behaves in prefix position
/// (`nud`), in infix/suffix position (`led`), and how strongly it binds.
#[derive(Clone, Copy)]
struct ParseRule {
    nud: Option<NudFn>,
    led: Option<LedFn>,
    precedence: Precedence,
}

impl ParseRule {
    const fn nud(f: NudFn) -> Self {
        ParseRule {
            nud: Some(f),
            led: None,
            precedence: Precedence::Lowest,
        }
    }

    const fn led(f: LedFn, precedence: Precedence) -> Self {
        ParseRule {
            nud: None,
            led: Some(f),
            precedence,
        }
    }

    const fn both(n: NudFn, l: LedFn, precedence: Precedence) -> Self {
        ParseRule {
            nud: Some(n),
            led: Some(l),
            precedence,
        }
    }
}

/// Generic token categories for the category-keyed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TokenCategory {
    IntConst,
    StringConst,
    Identifier,
}

fn category_of(token: &Token) -> Option<TokenCategory> {
    match token.kind {
        TokenKind::IntConst(_) => Some(TokenCategory::IntConst),
        TokenKind::StringConst(_) => Some(TokenCategory::StringConst),
        TokenKind::Identifier(_) => Some(TokenCategory::Identifier),
        _ => None,
    }
}

fn type_rules() -> &'static HashMap<TokenCategory, ParseRule> {
    static RULES: OnceLock<HashMap<TokenCategory, ParseRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert(TokenCategory::IntConst, ParseRule::nud(parse_int_nud));
        m.insert(TokenCategory::StringConst, ParseRule::nud(parse_string_nud));
        m.insert(
            TokenCategory::Identifier,
            ParseRule::nud(parse_identifier_nud),
        );
        m
    })
}

fn text_rules() -> &'static HashMap<&'static str, ParseRule> {
    static RULES: OnceLock<HashMap<&'static str, ParseRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("(", ParseRule::nud(parse_group_nud));
        m.insert(
            "-",
            ParseRule::both(parse_unary_nud, parse_binary_led, Precedence::Sum),
        );
        m.insert("~", ParseRule::nud(parse_unary_nud));
        m.insert("+", ParseRule::led(parse_binary_led, Precedence::Sum));
        m.insert("|", ParseRule::led(parse_binary_led, Precedence::Sum));
        m.insert("*", ParseRule::led(parse_binary_led, Precedence::Product));
        m.insert("/", ParseRule::led(parse_binary_led, Precedence::Product));
        m.insert("&", ParseRule::led(parse_binary_led, Precedence::Product));
        m.insert("<", ParseRule::led(parse_binary_led, Precedence::Compare));
        m.insert(">", ParseRule::led(parse_binary_led, Precedence::Compare));
        m.insert("=", ParseRule::led(parse_binary_led, Precedence::Equals));
        m.insert(".", ParseRule::led(parse_call_led, Precedence::Call));
        m.insert("[", ParseRule::led(parse_index_led, Precedence::Index));
        m.insert("true", ParseRule::nud(parse_keyword_lit_nud));
        m.insert("false", ParseRule::nud(parse_keyword_lit_nud));
        m.insert("null", ParseRule::nud(parse_keyword_lit_nud));
        m.insert("this", ParseRule::nud(parse_keyword_lit_nud));
        m
    })
}

/// Rule lookup for a token: specific lexemes override categories.
fn rule_for(token: &Token) -> Option<ParseRule> {
    if let Some(key) = token.lexeme_key()
        && let Some(rule) = text_rules().get(key)
    {
        return Some(*rule);
    }
    category_of(token).and_then(|cat| type_rules().get(&cat).copied())
}

/// Keywords that end panic-mode recovery without being consumed.
const SYNC_KEYWORDS: [Keyword; 10] = [
    Keyword::Class,
    Keyword::Constructor,
    Keyword::Function,
    Keyword::Method,
    Keyword::Var,
    Keyword::Let,
    Keyword::Do,
    Keyword::If,
    Keyword::While,
    Keyword::Return,
];

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    errors: Vec<Diagnostic>,
    /// Set when the lexer reported an error; parsing cannot continue past it
    fatal: bool,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, Diagnostic> {
        Ok(Parser {
            lexer: Lexer::new(source)?,
            errors: Vec::new(),
            fatal: false,
        })
    }

    /// Parse every class in the unit.
    ///
    /// Returns the ASTs only if no diagnostic was produced; callers treat any
    /// error list as compilation failure.
    pub fn parse(&mut self) -> Result<Vec<Class>, Vec<Diagnostic>> {
        let mut classes = Vec::new();
        while self.lexer.has_more() && !self.fatal {
            match self.parse_class() {
                Ok(class) => classes.push(class),
                Err(d) => {
                    self.errors.push(d);
                    if self.fatal {
                        break;
                    }
                    self.synchronize();
                }
            }
        }
        debug_assert!(!self.fatal || !self.errors.is_empty());
        if self.errors.is_empty() {
            Ok(classes)
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    // =========================================================================
    // Token plumbing
    // =========================================================================

    fn current(&self) -> &Token {
        self.lexer.current()
    }

    fn span(&self) -> Span {
        let tok = self.lexer.current();
        Span::new(tok.line, tok.column)
    }

    fn advance(&mut self) -> Result<(), Diagnostic> {
        self.lexer.advance().inspect_err(|_| {
            self.fatal = true;
        })
    }

    fn error_here(&self, message: impl Into<String>) -> Diagnostic {
        let tok = self.current();
        Diagnostic::new(tok.line, tok.column, message)
    }

    fn expect_symbol(&mut self, symbol: char, context: &str) -> Result<Span, Diagnostic> {
        if self.current().is_symbol(symbol) {
            let span = self.span();
            self.advance()?;
            Ok(span)
        } else {
            Err(self.error_here(format!(
                "expected '{}' {}, got {}",
                symbol,
                context,
                self.current()
            )))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, context: &str) -> Result<Span, Diagnostic> {
        if self.current().is_keyword(keyword) {
            let span = self.span();
            self.advance()?;
            Ok(span)
        } else {
            Err(self.error_here(format!(
                "expected '{}' {}, got {}",
                keyword.as_str(),
                context,
                self.current()
            )))
        }
    }

    fn expect_identifier(&mut self, context: &str) -> Result<(String, Span), Diagnostic> {
        let Some(name) = self.current().identifier().map(str::to_string) else {
            return Err(self.error_here(format!(
                "expected identifier {}, got {}",
                context,
                self.current()
            )));
        };
        let span = self.span();
        self.advance()?;
        Ok((name, span))
    }

    /// Panic-mode recovery: advance one token, then drop tokens until a `;`
    /// (consumed) or a declaration/statement keyword (left on the stream).
    fn synchronize(&mut self) {
        if self.advance().is_err() {
            return;
        }
        while self.lexer.has_more() {
            let tok = self.current();
            if tok.is_symbol(';') {
                let _ = self.advance();
                return;
            }
            if let TokenKind::Keyword(kw) = tok.kind
                && SYNC_KEYWORDS.contains(&kw)
            {
                return;
            }
            if self.advance().is_err() {
                return;
            }
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// `class := 'class' ident '{' classVarDec* subroutineDec* '}'`
    ///
    /// Class-level variable declarations must precede subroutines, and every
    /// class other than `Main` must declare at least one constructor.
    fn parse_class(&mut self) -> Result<Class, Diagnostic> {
        let class_span = self.span();
        self.expect_keyword(Keyword::Class, "to start a class declaration")?;
        let (name, _) = self.expect_identifier("after 'class'")?;
        self.expect_symbol('{', "after the class name")?;

        let mut vars: Vec<ClassVarDec> = Vec::new();
        let mut subs: Vec<SubroutineDec> = Vec::new();

        while self.lexer.has_more() && !self.current().is_symbol('}') {
            let result = match self.current().keyword() {
                Some(Keyword::Static) | Some(Keyword::Field) => {
                    if subs.is_empty() {
                        self.parse_class_var_dec().map(|dec| vars.push(dec))
                    } else {
                        Err(self.error_here(
                            "class variable declarations must precede subroutine declarations",
                        ))
                    }
                }
                Some(Keyword::Constructor) | Some(Keyword::Function) | Some(Keyword::Method) => {
                    self.parse_subroutine().map(|sub| subs.push(sub))
                }
                _ => Err(self.error_here(format!(
                    "expected a class member declaration, got {}",
                    self.current()
                ))),
            };
            if let Err(d) = result {
                if self.fatal {
                    return Err(d);
                }
                self.errors.push(d);
                self.synchronize();
                // Recovery may have landed on the next class
                if self.current().is_keyword(Keyword::Class) {
                    break;
                }
            }
        }
        if self.current().is_symbol('}') {
            self.advance()?;
        } else if !self.fatal && !self.current().is_keyword(Keyword::Class) {
            self.errors
                .push(self.error_here(format!("expected '}}' to close class '{}'", name)));
        }

        if name != "Main"
            && !subs
                .iter()
                .any(|s| s.kind == SubroutineKind::Constructor)
        {
            self.errors.push(Diagnostic::new(
                class_span.line,
                class_span.column,
                format!("class '{}' must declare at least one constructor", name),
            ));
        }

        Ok(Class {
            name,
            span: class_span,
            vars,
            subs,
        })
    }

    /// `classVarDec := ('static'|'field') type ident (',' ident)* ';'`
    fn parse_class_var_dec(&mut self) -> Result<ClassVarDec, Diagnostic> {
        let span = self.span();
        let kind = if self.current().is_keyword(Keyword::Static) {
            ClassVarKind::Static
        } else {
            ClassVarKind::Field
        };
        self.advance()?;
        let ty = self.parse_type()?;
        let names = self.parse_name_list()?;
        self.expect_symbol(';', "after the variable declaration")?;
        Ok(ClassVarDec {
            kind,
            ty,
            names,
            span,
        })
    }

    /// `ident (',' ident)*`
    fn parse_name_list(&mut self) -> Result<Vec<(String, Span)>, Diagnostic> {
        let mut names = vec![self.expect_identifier("in the declaration")?];
        while self.current().is_symbol(',') {
            self.advance()?;
            names.push(self.expect_identifier("after ','")?);
        }
        Ok(names)
    }

    /// `subDec := ('constructor'|'function'|'method') (type|'void') ident
    ///            '(' paramList? ')' '{' varDec* statement* '}'`
    fn parse_subroutine(&mut self) -> Result<SubroutineDec, Diagnostic> {
        let span = self.span();
        let kind = match self.current().keyword() {
            Some(Keyword::Constructor) => SubroutineKind::Constructor,
            Some(Keyword::Function) => SubroutineKind::Function,
            _ => SubroutineKind::Method,
        };
        self.advance()?;
        let return_type = self.parse_return_type()?;
        let (name, _) = self.expect_identifier("as the subroutine name")?;
        self.expect_symbol('(', "after the subroutine name")?;
        let params = self.parse_param_list()?;
        self.expect_symbol(')', "after the parameter list")?;
        self.expect_symbol('{', "to open the subroutine body")?;

        let mut locals = Vec::new();
        while self.current().is_keyword(Keyword::Var) {
            match self.parse_var_dec() {
                Ok(dec) => locals.push(dec),
                Err(d) => {
                    if self.fatal {
                        return Err(d);
                    }
                    self.errors.push(d);
                    self.synchronize();
                }
            }
        }

        let body = self.parse_statement_block()?;
        self.expect_symbol('}', "to close the subroutine body")?;

        Ok(SubroutineDec {
            kind,
            return_type,
            name,
            params,
            locals,
            body,
            span,
        })
    }

    /// `paramList := type ident (',' type ident)*` (possibly empty)
    fn parse_param_list(&mut self) -> Result<Vec<Param>, Diagnostic> {
        let mut params = Vec::new();
        if self.current().is_symbol(')') {
            return Ok(params);
        }
        loop {
            let span = self.span();
            let ty = self.parse_type()?;
            let (name, _) = self.expect_identifier("as the parameter name")?;
            params.push(Param { ty, name, span });
            if !self.current().is_symbol(',') {
                break;
            }
            self.advance()?;
        }
        Ok(params)
    }

    /// `varDec := 'var' type ident (',' ident)* ';'`
    fn parse_var_dec(&mut self) -> Result<VarDec, Diagnostic> {
        let span = self.span();
        self.expect_keyword(Keyword::Var, "to start a variable declaration")?;
        let ty = self.parse_type()?;
        let names = self.parse_name_list()?;
        self.expect_symbol(';', "after the variable declaration")?;
        Ok(VarDec { ty, names, span })
    }

    /// `type := 'int' | 'char' | 'boolean' | ident ('<' type (',' type)* '>')?`
    fn parse_type(&mut self) -> Result<Type, Diagnostic> {
        if let Some(kw) = self.current().keyword() {
            let base = match kw {
                Keyword::Int => "int",
                Keyword::Char => "char",
                Keyword::Boolean => "boolean",
                _ => {
                    return Err(
                        self.error_here(format!("expected a type, got {}", self.current()))
                    );
                }
            };
            self.advance()?;
            return Ok(Type::new(base));
        }
        if let Some(base) = self.current().identifier().map(str::to_string) {
            self.advance()?;
            let generics = if self.current().is_symbol('<') {
                self.parse_generic_args()?
            } else {
                Vec::new()
            };
            return Ok(Type::with_generics(base, generics));
        }
        Err(self.error_here(format!("expected a type, got {}", self.current())))
    }

    fn parse_return_type(&mut self) -> Result<Type, Diagnostic> {
        if self.current().is_keyword(Keyword::Void) {
            self.advance()?;
            Ok(Type::new("void"))
        } else {
            self.parse_type()
        }
    }

    /// `'<' type (',' type)* '>'`
    fn parse_generic_args(&mut self) -> Result<Vec<Type>, Diagnostic> {
        self.expect_symbol('<', "to open the type argument list")?;
        let mut args = vec![self.parse_type()?];
        while self.current().is_symbol(',') {
            self.advance()?;
            args.push(self.parse_type()?);
        }
        self.expect_symbol('>', "to close the type argument list")?;
        Ok(args)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Statements until the closing `}` of the enclosing block, with
    /// per-statement error recovery.
    fn parse_statement_block(&mut self) -> Result<Vec<Statement>, Diagnostic> {
        let mut statements = Vec::new();
        while self.lexer.has_more() && !self.current().is_symbol('}') {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(d) => {
                    if self.fatal {
                        return Err(d);
                    }
                    self.errors.push(d);
                    self.synchronize();
                }
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, Diagnostic> {
        match self.current().keyword() {
            Some(Keyword::Let) => self.parse_let(),
            Some(Keyword::If) => self.parse_if(),
            Some(Keyword::While) => self.parse_while(),
            Some(Keyword::Do) => self.parse_do(),
            Some(Keyword::Return) => self.parse_return(),
            _ => Err(self.error_here(format!(
                "expected a statement, got {}",
                self.current()
            ))),
        }
    }

    /// `letStmt := 'let' ident ('[' expr ']')? '=' expr ';'`
    fn parse_let(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.span();
        self.advance()?;
        let (name, name_span) = self.expect_identifier("after 'let'")?;
        let index = if self.current().is_symbol('[') {
            self.advance()?;
            let index = self.parse_expression(Precedence::Lowest)?;
            self.expect_symbol(']', "after the index expression")?;
            Some(index)
        } else {
            None
        };
        self.expect_symbol('=', "in the let statement")?;
        let value = self.parse_expression(Precedence::Lowest)?;
        self.expect_symbol(';', "after the let statement")?;
        Ok(Statement::Let {
            name,
            name_span,
            index,
            value,
            span,
        })
    }

    /// `ifStmt := 'if' '(' expr ')' '{' statement* '}' ('else' '{' statement* '}')?`
    fn parse_if(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.span();
        self.advance()?;
        self.expect_symbol('(', "after 'if'")?;
        let cond = self.parse_expression(Precedence::Lowest)?;
        self.expect_symbol(')', "after the condition")?;
        self.expect_symbol('{', "to open the then-block")?;
        let then_body = self.parse_statement_block()?;
        self.expect_symbol('}', "to close the then-block")?;
        let else_body = if self.current().is_keyword(Keyword::Else) {
            self.advance()?;
            self.expect_symbol('{', "to open the else-block")?;
            let body = self.parse_statement_block()?;
            self.expect_symbol('}', "to close the else-block")?;
            Some(body)
        } else {
            None
        };
        Ok(Statement::If {
            cond,
            then_body,
            else_body,
            span,
        })
    }

    /// `whileStmt := 'while' '(' expr ')' '{' statement* '}'`
    fn parse_while(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.span();
        self.advance()?;
        self.expect_symbol('(', "after 'while'")?;
        let cond = self.parse_expression(Precedence::Lowest)?;
        self.expect_symbol(')', "after the condition")?;
        self.expect_symbol('{', "to open the loop body")?;
        let body = self.parse_statement_block()?;
        self.expect_symbol('}', "to close the loop body")?;
        Ok(Statement::While { cond, body, span })
    }

    /// `doStmt := 'do' expr ';'` where the expression must be a call
    fn parse_do(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.span();
        self.advance()?;
        let call = self.parse_expression(Precedence::Lowest)?;
        if !call.is_call() {
            return Err(Diagnostic::new(
                call.span.line,
                call.span.column,
                "the 'do' keyword must be followed by a subroutine call",
            ));
        }
        self.expect_symbol(';', "after the do statement")?;
        Ok(Statement::Do { call, span })
    }

    /// `returnStmt := 'return' expr? ';'`
    fn parse_return(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.span();
        self.advance()?;
        let value = if self.current().is_symbol(';') {
            None
        } else {
            Some(self.parse_expression(Precedence::Lowest)?)
        };
        self.expect_symbol(';', "after the return statement")?;
        Ok(Statement::Return { value, span })
    }

    // =========================================================================
    // Expressions (Pratt)
    // =========================================================================

    /// Core Pratt loop: parse a prefix via the current token's `nud`, then
    /// fold infix/suffix tokens whose precedence exceeds `min`.
    fn parse_expression(&mut self, min: Precedence) -> Result<Expr, Diagnostic> {
        let nud = rule_for(self.current())
            .and_then(|r| r.nud)
            .ok_or_else(|| {
                self.error_here(format!(
                    "unexpected token {} starting an expression",
                    self.current()
                ))
            })?;
        let mut left = nud(self)?;

        loop {
            let rule = match rule_for(self.current()) {
                Some(rule) if rule.precedence > min => rule,
                _ => break,
            };
            let led = match rule.led {
                Some(led) => led,
                None => break,
            };
            left = led(self, left)?;
        }
        Ok(left)
    }

    /// `'(' exprList? ')'` for call arguments.
    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        self.expect_symbol('(', "to open the argument list")?;
        let mut args = Vec::new();
        if !self.current().is_symbol(')') {
            args.push(self.parse_expression(Precedence::Lowest)?);
            while self.current().is_symbol(',') {
                self.advance()?;
                args.push(self.parse_expression(Precedence::Lowest)?);
            }
        }
        self.expect_symbol(')', "to close the argument list")?;
        Ok(args)
    }
}

// =============================================================================
// Pratt handlers
//
// Free functions so the dispatch tables can hold plain function pointers.
// =============================================================================

fn parse_int_nud(p: &mut Parser<'_>) -> Result<Expr, Diagnostic> {
    let span = p.span();
    let value = match p.current().kind {
        TokenKind::IntConst(n) => n,
        _ => unreachable!("int nud dispatched on a non-integer token"),
    };
    p.advance()?;
    Ok(Expr::new(ExprKind::Int(value), span))
}

fn parse_string_nud(p: &mut Parser<'_>) -> Result<Expr, Diagnostic> {
    let span = p.span();
    let text = match &p.current().kind {
        TokenKind::StringConst(s) => s.clone(),
        _ => unreachable!("string nud dispatched on a non-string token"),
    };
    p.advance()?;
    Ok(Expr::new(ExprKind::Str(text), span))
}

fn parse_keyword_lit_nud(p: &mut Parser<'_>) -> Result<Expr, Diagnostic> {
    let span = p.span();
    let lit = match p.current().kind {
        TokenKind::Keyword(Keyword::True) => KeywordLit::True,
        TokenKind::Keyword(Keyword::False) => KeywordLit::False,
        TokenKind::Keyword(Keyword::Null) => KeywordLit::Null,
        TokenKind::Keyword(Keyword::This) => KeywordLit::This,
        _ => unreachable!("keyword-literal nud dispatched on a non-literal token"),
    };
    p.advance()?;
    Ok(Expr::new(ExprKind::Keyword(lit), span))
}

/// Identifier in prefix position: a bare call if `(` follows, otherwise a
/// variable/class reference. `Array` may absorb display-only type arguments.
fn parse_identifier_nud(p: &mut Parser<'_>) -> Result<Expr, Diagnostic> {
    let (name, span) = p.expect_identifier("in the expression")?;
    if p.current().is_symbol('(') {
        let args = p.parse_arg_list()?;
        return Ok(Expr::new(
            ExprKind::Call {
                receiver: None,
                name,
                args,
            },
            span,
        ));
    }
    let generics = if name == "Array" && p.current().is_symbol('<') {
        p.parse_generic_args()?
    } else {
        Vec::new()
    };
    Ok(Expr::new(ExprKind::Var { name, generics }, span))
}

/// `'(' expr ')'` returns the inner expression unchanged.
fn parse_group_nud(p: &mut Parser<'_>) -> Result<Expr, Diagnostic> {
    p.expect_symbol('(', "to open the group")?;
    let inner = p.parse_expression(Precedence::Lowest)?;
    p.expect_symbol(')', "to close the group")?;
    Ok(inner)
}

fn parse_unary_nud(p: &mut Parser<'_>) -> Result<Expr, Diagnostic> {
    let span = p.span();
    let op = if p.current().is_symbol('-') {
        UnaryOp::Neg
    } else {
        UnaryOp::Not
    };
    p.advance()?;
    let operand = p.parse_expression(Precedence::Prefix)?;
    Ok(Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        span,
    ))
}

fn parse_binary_led(p: &mut Parser<'_>, left: Expr) -> Result<Expr, Diagnostic> {
    let span = p.span();
    let op = match p.current().kind {
        TokenKind::Symbol(c) => match BinaryOp::from_symbol(c) {
            Some(op) => op,
            None => unreachable!("binary led dispatched on a non-operator token"),
        },
        _ => unreachable!("binary led dispatched on a non-symbol token"),
    };
    p.advance()?;
    // Recursing at the operator's own precedence yields left association;
    // `=` recurses at Lowest so it groups to the right.
    let min = match op {
        BinaryOp::Eq => Precedence::Lowest,
        BinaryOp::Lt | BinaryOp::Gt => Precedence::Compare,
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or => Precedence::Sum,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::And => Precedence::Product,
    };
    let right = p.parse_expression(min)?;
    Ok(Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(left),
            rhs: Box::new(right),
        },
        span,
    ))
}

/// `'.' ident '(' exprList? ')'` attaches a receiver to a call.
fn parse_call_led(p: &mut Parser<'_>, left: Expr) -> Result<Expr, Diagnostic> {
    p.expect_symbol('.', "before the subroutine name")?;
    let (name, span) = p.expect_identifier("as the subroutine name")?;
    let args = p.parse_arg_list()?;
    Ok(Expr::new(
        ExprKind::Call {
            receiver: Some(Box::new(left)),
            name,
            args,
        },
        span,
    ))
}

/// `'[' expr ']'` subscripts the left expression.
fn parse_index_led(p: &mut Parser<'_>, left: Expr) -> Result<Expr, Diagnostic> {
    let span = p.expect_symbol('[', "to open the index")?;
    let index = p.parse_expression(Precedence::Lowest)?;
    p.expect_symbol(']', "after the index expression")?;
    Ok(Expr::new(
        ExprKind::Index {
            base: Box::new(left),
            index: Box::new(index),
        },
        span,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Vec<Class> {
        let mut parser = Parser::new(source).unwrap();
        parser.parse().unwrap_or_else(|errs| {
            panic!("unexpected parse errors: {:#?}", errs);
        })
    }

    fn parse_errors(source: &str) -> Vec<Diagnostic> {
        let mut parser = Parser::new(source).unwrap();
        parser.parse().expect_err("expected parse errors")
    }

    fn parse_expr(source: &str) -> Expr {
        let mut parser = Parser::new(source).unwrap();
        parser.parse_expression(Precedence::Lowest).unwrap()
    }

    #[test]
    fn test_parse_minimal_class() {
        let classes = parse_ok("class Point { constructor Point new() { return this; } }");
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "Point");
        assert_eq!(classes[0].subs.len(), 1);
        assert_eq!(classes[0].subs[0].kind, SubroutineKind::Constructor);
    }

    #[test]
    fn test_parse_class_vars_and_subroutines() {
        let classes = parse_ok(
            "class Point {\n\
             field int x, y;\n\
             static int count;\n\
             constructor Point new(int ax, int ay) {\n\
               let x = ax;\n\
               let y = ay;\n\
               return this;\n\
             }\n\
             method int getX() { return x; }\n\
             }",
        );
        let class = &classes[0];
        assert_eq!(class.vars.len(), 2);
        assert_eq!(class.vars[0].kind, ClassVarKind::Field);
        assert_eq!(class.vars[0].names.len(), 2);
        assert_eq!(class.vars[1].kind, ClassVarKind::Static);
        assert_eq!(class.subs.len(), 2);
        assert_eq!(class.subs[0].params.len(), 2);
        assert_eq!(class.subs[1].kind, SubroutineKind::Method);
        assert_eq!(class.subs[1].return_type, Type::new("int"));
    }

    #[test]
    fn test_main_needs_no_constructor() {
        let classes = parse_ok("class Main { function void main() { return; } }");
        assert_eq!(classes[0].subs.len(), 1);
    }

    #[test]
    fn test_missing_constructor_reported_at_class() {
        let errs = parse_errors("class Point { method int getX() { return 0; } }");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("at least one constructor"));
        assert_eq!((errs[0].line, errs[0].column), (1, 1));
    }

    #[test]
    fn test_var_after_subroutine_rejected() {
        let errs = parse_errors(
            "class A {\n\
             constructor A new() { return this; }\n\
             field int late;\n\
             }",
        );
        assert!(
            errs.iter().any(|d| d
                .message
                .contains("class variable declarations must precede subroutine declarations")),
            "got: {:?}",
            errs
        );
    }

    #[test]
    fn test_precedence_product_over_sum() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_expr("1 + 2 * 3");
        match expr.kind {
            ExprKind::Binary { op, rhs, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(
                    rhs.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("expected Add at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_left_associativity() {
        // 10 - 4 - 3 parses as (10 - 4) - 3
        let expr = parse_expr("10 - 4 - 3");
        match expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                assert_eq!(op, BinaryOp::Sub);
                assert!(matches!(
                    lhs.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Sub,
                        ..
                    }
                ));
                assert!(matches!(rhs.kind, ExprKind::Int(3)));
            }
            other => panic!("expected Sub at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_grouping_overrides_precedence() {
        let expr = parse_expr("(1 + 2) * 3");
        match expr.kind {
            ExprKind::Binary { op, lhs, .. } => {
                assert_eq!(op, BinaryOp::Mul);
                assert!(matches!(
                    lhs.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected Mul at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_binds_tighter_than_product() {
        // -a * b parses as (-a) * b
        let expr = parse_expr("-a * b");
        match expr.kind {
            ExprKind::Binary { op, lhs, .. } => {
                assert_eq!(op, BinaryOp::Mul);
                assert!(matches!(
                    lhs.kind,
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        ..
                    }
                ));
            }
            other => panic!("expected Mul at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_below_sum() {
        // a + 1 < b parses as (a + 1) < b
        let expr = parse_expr("a + 1 < b");
        match expr.kind {
            ExprKind::Binary { op, lhs, .. } => {
                assert_eq!(op, BinaryOp::Lt);
                assert!(matches!(
                    lhs.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected Lt at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_call() {
        let expr = parse_expr("draw(x, 2)");
        match expr.kind {
            ExprKind::Call {
                receiver,
                name,
                args,
            } => {
                assert!(receiver.is_none());
                assert_eq!(name, "draw");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn test_receiver_call() {
        let expr = parse_expr("Memory.alloc(1)");
        match expr.kind {
            ExprKind::Call {
                receiver,
                name,
                args,
            } => {
                let receiver = receiver.expect("expected a receiver");
                assert!(
                    matches!(&receiver.kind, ExprKind::Var { name, .. } if name == "Memory")
                );
                assert_eq!(name, "alloc");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_calls_and_index() {
        let expr = parse_expr("game.board().cell(i)");
        match expr.kind {
            ExprKind::Call { receiver, name, .. } => {
                assert_eq!(name, "cell");
                assert!(receiver.unwrap().is_call());
            }
            other => panic!("expected outer Call, got {:?}", other),
        }

        let expr = parse_expr("a[i + 1]");
        match expr.kind {
            ExprKind::Index { base, index } => {
                assert!(matches!(&base.kind, ExprKind::Var { name, .. } if name == "a"));
                assert!(matches!(
                    index.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected Index, got {:?}", other),
        }
    }

    #[test]
    fn test_array_generics_in_expression() {
        let expr = parse_expr("Array<int>");
        match expr.kind {
            ExprKind::Var { name, generics } => {
                assert_eq!(name, "Array");
                assert_eq!(generics, vec![Type::new("int")]);
            }
            other => panic!("expected Var with generics, got {:?}", other),
        }

        // A non-Array identifier followed by '<' is a comparison
        let expr = parse_expr("a < b");
        assert!(matches!(
            expr.kind,
            ExprKind::Binary {
                op: BinaryOp::Lt,
                ..
            }
        ));
    }

    #[test]
    fn test_generic_type_in_declaration() {
        let classes = parse_ok(
            "class A { constructor A new() { var Array<int> xs; let xs = xs; return this; } }",
        );
        let sub = &classes[0].subs[0];
        assert_eq!(
            sub.locals[0].ty,
            Type::with_generics("Array", vec![Type::new("int")])
        );
    }

    #[test]
    fn test_keyword_literals() {
        assert!(matches!(
            parse_expr("true").kind,
            ExprKind::Keyword(KeywordLit::True)
        ));
        assert!(matches!(
            parse_expr("null").kind,
            ExprKind::Keyword(KeywordLit::Null)
        ));
        assert!(matches!(
            parse_expr("~false").kind,
            ExprKind::Unary {
                op: UnaryOp::Not,
                ..
            }
        ));
    }

    #[test]
    fn test_do_requires_call() {
        let errs = parse_errors(
            "class Main { function void main() { do 1 + 2; return; } }",
        );
        assert!(
            errs.iter()
                .any(|d| d.message.contains("must be followed by a subroutine call")),
            "got: {:?}",
            errs
        );
    }

    #[test]
    fn test_let_with_index() {
        let classes = parse_ok(
            "class Main { function void main() { var Array a; let a[3] = 7; return; } }",
        );
        match &classes[0].subs[0].body[0] {
            Statement::Let { name, index, .. } => {
                assert_eq!(name, "a");
                assert!(index.is_some());
            }
            other => panic!("expected Let, got {:?}", other),
        }
    }

    #[test]
    fn test_if_else_and_while() {
        let classes = parse_ok(
            "class Main { function void main() {\n\
               var int i;\n\
               let i = 0;\n\
               while (i < 10) { let i = i + 1; }\n\
               if (i = 10) { return; } else { return; }\n\
             } }",
        );
        let body = &classes[0].subs[0].body;
        assert!(matches!(body[1], Statement::While { .. }));
        match &body[2] {
            Statement::If { else_body, .. } => assert!(else_body.is_some()),
            other => panic!("expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_expression_start() {
        let errs = parse_errors(
            "class Main { function void main() { let x = ; return; } }",
        );
        assert!(
            errs.iter()
                .any(|d| d.message.contains("starting an expression")),
            "got: {:?}",
            errs
        );
    }

    #[test]
    fn test_recovery_collects_multiple_errors() {
        let errs = parse_errors(
            "class Main { function void main() {\n\
               let = 1;\n\
               let y 2;\n\
               return;\n\
             } }",
        );
        assert!(errs.len() >= 2, "expected several diagnostics: {:?}", errs);
    }

    #[test]
    fn test_parser_determinism() {
        let source = "class Main { function void main() {\n\
                      var int a;\n\
                      let a = (1 + 2) * 3 - ~a;\n\
                      if (a > 0) { do Output.printInt(a); }\n\
                      return;\n\
                      } }";
        let first = parse_ok(source);
        let second = parse_ok(source);
        assert_eq!(first, second);
    }

    #[test]
    fn test_lex_error_is_fatal() {
        let mut parser =
            Parser::new("class Main { function void main() { let x = 99999; } }").unwrap();
        let errs = parser.parse().expect_err("expected failure");
        assert!(
            errs.iter()
                .any(|d| d.message.contains("integer literal out of range")),
            "got: {:?}",
            errs
        );
    }

    #[test]
    fn test_two_classes_in_one_unit() {
        let classes = parse_ok(
            "class A { constructor A new() { return this; } }\n\
             class Main { function void main() { return; } }",
        );
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[1].name, "Main");
    }
}
