//! Recursive-descent parser for the component markup language.
//!
//! The parser works directly on the source text instead of a token stream:
//! JSX children are raw text while attribute values and `{…}` containers
//! are expressions, so lexing is context-dependent.
//!
//! TypeScript annotations are recognised only to be skipped; they never reach
//! the AST.

use super::ast::{
    BinaryOp, Export, Expr, ExprKind, FnBody, FunctionDecl, ImportDecl, Item, JsxAttr, JsxChild,
    JsxElement, JsxName, LogicalOp, Name, ObjectProp, Pattern, Program, Spreadable, Stmt,
    TemplatePart, UnaryOp,
};
use super::value::format_number;
use std::sync::Arc;
use thiserror::Error;

/// A parse failure with its source location (1-indexed).
#[derive(Debug, Clone, Error)]
#[error("{line}:{column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

type PResult<T> = Result<T, SyntaxError>;

/// Deepest nesting of expressions, blocks, patterns and elements accepted.
pub const MAX_NESTING: usize = 256;

/// Words that cannot be used as binding or variable names.
const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "default", "delete", "do", "else",
    "export", "for", "function", "if", "import", "in", "instanceof", "let", "new", "return",
    "switch", "throw", "try", "var", "void", "while", "yield",
];

/// Reserved words that may begin a top-level expression statement.
const EXPRESSION_KEYWORDS: &[&str] = &["new"];

/// Binary operators, longest spelling first.
const OPERATORS: &[(&str, BinOp, u8)] = &[
    ("===", BinOp::Arith(BinaryOp::StrictEq), 4),
    ("!==", BinOp::Arith(BinaryOp::StrictNotEq), 4),
    ("==", BinOp::Arith(BinaryOp::Eq), 4),
    ("!=", BinOp::Arith(BinaryOp::NotEq), 4),
    ("<=", BinOp::Arith(BinaryOp::Le), 5),
    (">=", BinOp::Arith(BinaryOp::Ge), 5),
    ("&&", BinOp::Logic(LogicalOp::And), 3),
    ("||", BinOp::Logic(LogicalOp::Or), 2),
    ("??", BinOp::Logic(LogicalOp::Nullish), 1),
    ("<", BinOp::Arith(BinaryOp::Lt), 5),
    (">", BinOp::Arith(BinaryOp::Gt), 5),
    ("+", BinOp::Arith(BinaryOp::Add), 6),
    ("-", BinOp::Arith(BinaryOp::Sub), 6),
    ("*", BinOp::Arith(BinaryOp::Mul), 7),
    ("/", BinOp::Arith(BinaryOp::Div), 7),
    ("%", BinOp::Arith(BinaryOp::Rem), 7),
];

#[derive(Clone, Copy)]
enum BinOp {
    Arith(BinaryOp),
    Logic(LogicalOp),
}

/// Where a skipped type annotation ends.
#[derive(Clone, Copy, PartialEq, Eq)]
enum TypeEnd {
    /// Parameter annotation: `,` `)` or `=`.
    Param,
    /// Binding annotation: `=` `,` or `;`.
    Binding,
    /// Function return type: the body's `{`.
    ReturnType,
    /// Arrow return type: `=>`.
    ArrowReturn,
    /// `as` casts and type aliases: a closer or the end of the line.
    Line,
}

/// Parse a whole module.
pub fn parse_module(src: &str) -> Result<Program, SyntaxError> {
    Parser::new(src).parse_program()
}

/// Converts the raw text between tags into markup.
pub type TextRenderer<'a> = &'a dyn Fn(&str) -> String;

/// Parse one JSX element starting at `offset`, returning it and the offset
/// just past its end. Text children are handed to `markdown` untouched
/// instead of following the JSX whitespace rules.
pub fn parse_jsx_at<'a>(
    src: &'a str,
    offset: usize,
    markdown: TextRenderer<'a>,
) -> Result<(JsxElement, usize), SyntaxError> {
    let mut parser = Parser {
        src,
        pos: offset,
        depth: 0,
        markdown: Some(markdown),
    };
    let element = parser.parse_jsx_element()?;
    Ok((element, parser.pos))
}

/// Convert a byte offset into a 1-indexed `(line, column)` pair.
pub fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let before = src.get(..offset.min(src.len())).unwrap_or(src);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(before, |i| &before[i + 1..]);
    (line, line_start.chars().count() + 1)
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

fn is_jsx_name_char(c: char) -> bool {
    is_ident_char(c) || matches!(c, '-' | ':' | '.')
}

fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

#[derive(Clone, Copy)]
struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    markdown: Option<TextRenderer<'a>>,
}

impl<'a> Parser<'a> {
    const fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            depth: 0,
            markdown: None,
        }
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ------------------------------------------------------------------------
    // Cursor primitives
    // ------------------------------------------------------------------------

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> SyntaxError {
        let (line, column) = line_col(self.src, pos);
        SyntaxError {
            message: message.into(),
            line,
            column,
        }
    }

    /// Skip whitespace and comments. Returns true if a line break was crossed.
    fn skip_trivia(&mut self) -> bool {
        let mut newline = false;
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                match rest.find('\n') {
                    Some(i) => self.pos += i,
                    None => {
                        self.pos = self.src.len();
                        return newline;
                    }
                }
                continue;
            }
            if rest.starts_with("/*") {
                match rest[2..].find("*/") {
                    Some(i) => {
                        newline |= rest[..i + 2].contains('\n');
                        self.pos += i + 4;
                    }
                    None => {
                        self.pos = self.src.len();
                        return newline;
                    }
                }
                continue;
            }
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    newline |= c == '\n';
                    self.bump();
                }
                _ => return newline,
            }
        }
    }

    fn eat(&mut self, s: &str) -> bool {
        self.skip_trivia();
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) -> PResult<()> {
        if self.eat(s) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{s}`")))
        }
    }

    /// Consume a lone `=` (not `==` or `=>`).
    fn eat_assign(&mut self) -> bool {
        self.skip_trivia();
        if self.starts_with("=") && !self.starts_with("==") && !self.starts_with("=>") {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek_word(&mut self) -> Option<&'a str> {
        self.skip_trivia();
        let rest = self.rest();
        let first = rest.chars().next()?;
        if !is_ident_start(first) {
            return None;
        }
        let end = rest
            .char_indices()
            .find(|&(_, c)| !is_ident_char(c))
            .map_or(rest.len(), |(i, _)| i);
        Some(&rest[..end])
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_word() == Some(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{keyword}`")))
        }
    }

    /// Any identifier-like word, keywords included (property names).
    fn ident(&mut self) -> PResult<Name> {
        match self.peek_word() {
            Some(word) => {
                self.pos += word.len();
                Ok(Name::from(word))
            }
            None => Err(self.error("expected identifier")),
        }
    }

    fn binding_ident(&mut self) -> PResult<Name> {
        let pos = self.pos;
        let name = self.ident()?;
        if is_reserved(&name) {
            return Err(self.error_at(pos, format!("`{name}` cannot be used as a name")));
        }
        Ok(name)
    }

    /// Is the next word `first` followed by the word `second`?
    fn peek_words(&mut self, first: &str, second: &str) -> bool {
        let mut ahead = *self;
        ahead.eat_keyword(first) && ahead.peek_word() == Some(second)
    }

    // ------------------------------------------------------------------------
    // Module items
    // ------------------------------------------------------------------------

    fn parse_program(mut self) -> PResult<Program> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.at_eof() {
                break;
            }
            if self.eat(";") {
                continue;
            }
            self.parse_item(&mut items)?;
        }
        Ok(Program { items })
    }

    fn parse_item(&mut self, items: &mut Vec<Item>) -> PResult<()> {
        self.skip_trivia();
        let start = self.pos;
        match self.peek_word() {
            Some("import") => {
                if let Some(import) = self.parse_import()? {
                    items.push(Item::Import(import));
                }
            }
            Some("export") => {
                self.pos += "export".len();
                self.parse_export(items)?;
            }
            Some("function") => items.push(Item::Function {
                decl: self.parse_function(true)?,
                export: Export::None,
            }),
            Some("async") if self.peek_words("async", "function") => items.push(Item::Function {
                decl: self.parse_function(true)?,
                export: Export::None,
            }),
            Some("const" | "let" | "var") => {
                for (pattern, init) in self.parse_declarators()? {
                    items.push(Item::Binding {
                        pattern,
                        init,
                        exported: false,
                    });
                }
            }
            Some("interface") => self.skip_interface()?,
            Some("type") if self.is_type_alias() => self.skip_type_alias()?,
            Some(word) if is_reserved(word) && !EXPRESSION_KEYWORDS.contains(&word) => {
                return Err(self.error_at(
                    start,
                    format!("`{word}` is not supported at module level"),
                ));
            }
            _ => items.push(Item::Expr(self.parse_expr()?)),
        }
        self.eat(";");
        Ok(())
    }

    fn parse_export(&mut self, items: &mut Vec<Item>) -> PResult<()> {
        if self.eat_keyword("default") {
            let is_function = self.peek_word() == Some("function")
                || self.peek_words("async", "function");
            if is_function {
                items.push(Item::Function {
                    decl: self.parse_function(false)?,
                    export: Export::Default,
                });
            } else {
                items.push(Item::ExportDefault(self.parse_expr()?));
            }
            return Ok(());
        }

        match self.peek_word() {
            Some("function" | "async") => items.push(Item::Function {
                decl: self.parse_function(true)?,
                export: Export::Named,
            }),
            Some("const" | "let" | "var") => {
                for (pattern, init) in self.parse_declarators()? {
                    items.push(Item::Binding {
                        pattern,
                        init,
                        exported: true,
                    });
                }
            }
            Some("interface") => self.skip_interface()?,
            Some("type") if self.is_type_alias() => self.skip_type_alias()?,
            _ => return Err(self.error("unsupported export form")),
        }
        Ok(())
    }

    fn parse_import(&mut self) -> PResult<Option<ImportDecl>> {
        self.skip_trivia();
        let pos = self.pos;
        self.expect_keyword("import")?;
        self.skip_trivia();

        let mut decl = ImportDecl {
            source: String::new(),
            default: None,
            named: Vec::new(),
            namespace: None,
            pos,
        };

        // Side-effect import: `import './style.css'`
        if matches!(self.peek(), Some('"' | '\'')) {
            decl.source = self.string_literal()?;
            return Ok(Some(decl));
        }

        // Type-only import: nothing to bind at runtime.
        let type_only = self.peek_word() == Some("type") && !self.peek_words("type", "from");
        if type_only {
            self.skip_import_clause()?;
            return Ok(None);
        }

        if self.peek_word().is_some() {
            decl.default = Some(self.binding_ident()?);
            if !self.eat(",") {
                self.expect_keyword("from")?;
                decl.source = self.string_literal()?;
                return Ok(Some(decl));
            }
        }

        if self.eat("*") {
            self.expect_keyword("as")?;
            decl.namespace = Some(self.binding_ident()?);
        } else if self.eat("{") {
            loop {
                if self.eat("}") {
                    break;
                }
                let is_type = self.peek_word() == Some("type") && {
                    let mut ahead = *self;
                    ahead.eat_keyword("type");
                    ahead.peek_word().is_some_and(|w| w != "as")
                };
                if is_type {
                    self.eat_keyword("type");
                }
                let imported = self.ident()?;
                let local = if self.eat_keyword("as") {
                    self.binding_ident()?
                } else {
                    imported.clone()
                };
                if !is_type {
                    decl.named.push((imported, local));
                }
                if !self.eat(",") {
                    self.expect("}")?;
                    break;
                }
            }
        }

        self.expect_keyword("from")?;
        decl.source = self.string_literal()?;
        Ok(Some(decl))
    }

    fn skip_import_clause(&mut self) -> PResult<()> {
        loop {
            if self.eat_keyword("from") {
                self.string_literal()?;
                return Ok(());
            }
            self.skip_trivia();
            match self.peek() {
                Some('{') => self.skip_balanced()?,
                Some(_) => {
                    self.bump();
                }
                None => return Err(self.error("unterminated import")),
            }
        }
    }

    fn parse_function(&mut self, require_name: bool) -> PResult<Arc<FunctionDecl>> {
        self.eat_keyword("async");
        self.expect_keyword("function")?;
        let name = match self.peek_word() {
            Some(word) if !is_reserved(word) => {
                self.pos += word.len();
                Some(Name::from(word))
            }
            _ if require_name => return Err(self.error("expected function name")),
            _ => None,
        };
        self.skip_generics()?;
        let params = self.parse_params()?;
        if self.eat(":") {
            self.skip_type(TypeEnd::ReturnType)?;
        }
        let body = FnBody::Block(self.parse_block()?);
        Ok(Arc::new(FunctionDecl { name, params, body }))
    }

    fn parse_params(&mut self) -> PResult<Vec<Pattern>> {
        self.expect("(")?;
        let mut params = Vec::new();
        loop {
            if self.eat(")") {
                break;
            }
            if self.eat("...") {
                return Err(self.error("rest parameters are not supported"));
            }
            let pattern = self.parse_pattern()?;
            self.eat("?");
            if self.eat(":") {
                self.skip_type(TypeEnd::Param)?;
            }
            params.push(self.with_default(pattern)?);
            if !self.eat(",") {
                self.expect(")")?;
                break;
            }
        }
        Ok(params)
    }

    fn parse_declarators(&mut self) -> PResult<Vec<(Pattern, Expr)>> {
        // const / let / var
        self.ident()?;
        let mut decls = Vec::new();
        loop {
            let pattern = self.parse_pattern()?;
            if self.eat(":") {
                self.skip_type(TypeEnd::Binding)?;
            }
            if !self.eat_assign() {
                return Err(self.error("expected `=` followed by an initializer"));
            }
            let init = self.parse_expr()?;
            decls.push((pattern, init));
            if !self.eat(",") {
                break;
            }
        }
        Ok(decls)
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.nested(|p| {
            p.expect("{")?;
            let mut stmts = Vec::new();
            loop {
                if p.eat("}") {
                    break;
                }
                if p.eat(";") {
                    continue;
                }
                if p.at_eof() {
                    return Err(p.error("expected `}`"));
                }
                p.parse_stmt(&mut stmts)?;
            }
            Ok(stmts)
        })
    }

    fn parse_stmt(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        self.skip_trivia();
        let start = self.pos;
        match self.peek_word() {
            Some("const" | "let" | "var") => {
                for (pattern, init) in self.parse_declarators()? {
                    out.push(Stmt::Binding(pattern, init));
                }
            }
            Some("return") => {
                self.pos += "return".len();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                out.push(Stmt::Return(value));
            }
            Some("if") => {
                self.pos += "if".len();
                self.expect("(")?;
                let test = self.parse_expr()?;
                self.expect(")")?;
                let consequent = self.parse_branch()?;
                let alternate = if self.eat_keyword("else") {
                    Some(self.parse_branch()?)
                } else {
                    None
                };
                out.push(Stmt::If(test, consequent, alternate));
                return Ok(());
            }
            Some("function") => out.push(Stmt::Function(self.parse_function(true)?)),
            Some("async") if self.peek_words("async", "function") => {
                out.push(Stmt::Function(self.parse_function(true)?));
            }
            Some("interface") => self.skip_interface()?,
            Some("type") if self.is_type_alias() => self.skip_type_alias()?,
            Some(kw @ ("for" | "while" | "do" | "switch" | "try" | "throw" | "class")) => {
                return Err(self.error_at(
                    start,
                    format!("`{kw}` statements are not supported in templates"),
                ));
            }
            _ => out.push(Stmt::Expr(self.parse_expr()?)),
        }
        self.eat(";");
        Ok(())
    }

    fn parse_branch(&mut self) -> PResult<Vec<Stmt>> {
        self.skip_trivia();
        if self.starts_with("{") {
            self.parse_block()
        } else {
            let mut stmts = Vec::new();
            self.nested(|p| p.parse_stmt(&mut stmts))?;
            Ok(stmts)
        }
    }

    /// A `return` followed by a line break returns `undefined`.
    fn at_statement_end(&mut self) -> bool {
        let newline = self.skip_trivia();
        newline || self.at_eof() || matches!(self.peek(), Some(';' | '}'))
    }

    // ------------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------------

    fn parse_pattern(&mut self) -> PResult<Pattern> {
        self.skip_trivia();
        match self.peek() {
            Some('{') => self.nested(Self::parse_object_pattern),
            Some('[') => self.nested(Self::parse_array_pattern),
            _ => Ok(Pattern::Ident(self.binding_ident()?)),
        }
    }

    fn with_default(&mut self, pattern: Pattern) -> PResult<Pattern> {
        if self.eat_assign() {
            let default = self.parse_expr()?;
            Ok(Pattern::Default(Box::new(pattern), Box::new(default)))
        } else {
            Ok(pattern)
        }
    }

    fn parse_object_pattern(&mut self) -> PResult<Pattern> {
        self.expect("{")?;
        let mut props = Vec::new();
        let mut rest = None;
        loop {
            if self.eat("}") {
                break;
            }
            if self.eat("...") {
                rest = Some(self.binding_ident()?);
                self.eat(",");
                self.expect("}")?;
                break;
            }
            let key = self.property_key()?;
            let target = if self.eat(":") {
                self.parse_pattern()?
            } else {
                Pattern::Ident(key.clone())
            };
            props.push((key, self.with_default(target)?));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Pattern::Object { props, rest })
    }

    fn parse_array_pattern(&mut self) -> PResult<Pattern> {
        self.expect("[")?;
        let mut elems = Vec::new();
        let mut rest = None;
        loop {
            if self.eat("]") {
                break;
            }
            if self.eat(",") {
                elems.push(None);
                continue;
            }
            if self.eat("...") {
                rest = Some(self.binding_ident()?);
                self.eat(",");
                self.expect("]")?;
                break;
            }
            let pattern = self.parse_pattern()?;
            elems.push(Some(self.with_default(pattern)?));
            if !self.eat(",") {
                self.expect("]")?;
                break;
            }
        }
        Ok(Pattern::Array { elems, rest })
    }

    fn property_key(&mut self) -> PResult<Name> {
        self.skip_trivia();
        match self.peek() {
            Some('"' | '\'') => Ok(Name::from(self.string_literal()?)),
            Some(c) if c.is_ascii_digit() => Ok(Name::from(format_number(self.number()?))),
            _ => self.ident(),
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.nested(|p| {
            if let Some(arrow) = p.try_arrow()? {
                return Ok(arrow);
            }
            p.parse_conditional()
        })
    }

    /// Try to parse an arrow function; restores the cursor when the input is
    /// not one.
    fn try_arrow(&mut self) -> PResult<Option<Expr>> {
        self.skip_trivia();
        let saved = *self;
        let start = self.pos;

        if self.peek_word() == Some("async") {
            let mut ahead = *self;
            ahead.pos += "async".len();
            ahead.skip_trivia();
            if matches!(ahead.peek(), Some('(')) || ahead.peek_word().is_some() {
                *self = ahead;
            }
        }

        self.skip_trivia();
        let params = match self.peek() {
            Some('(') => {
                let Ok(params) = self.parse_params() else {
                    *self = saved;
                    return Ok(None);
                };
                if self.eat(":") && self.skip_type(TypeEnd::ArrowReturn).is_err() {
                    *self = saved;
                    return Ok(None);
                }
                params
            }
            Some(c) if is_ident_start(c) => match self.binding_ident() {
                Ok(name) => vec![Pattern::Ident(name)],
                Err(_) => {
                    *self = saved;
                    return Ok(None);
                }
            },
            _ => return Ok(None),
        };

        if !self.eat("=>") {
            *self = saved;
            return Ok(None);
        }

        self.skip_trivia();
        let body = if self.starts_with("{") {
            FnBody::Block(self.parse_block()?)
        } else {
            FnBody::Expr(self.parse_expr()?)
        };
        let decl = FunctionDecl {
            name: None,
            params,
            body,
        };
        Ok(Some(Expr::new(ExprKind::Function(Arc::new(decl)), start)))
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let test = self.parse_binary(1)?;
        self.skip_trivia();
        if self.starts_with("?") && !self.starts_with("??") && !self.starts_with("?.") {
            let pos = self.pos;
            self.pos += 1;
            let consequent = self.parse_expr()?;
            self.expect(":")?;
            let alternate = self.parse_expr()?;
            return Ok(Expr::new(
                ExprKind::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate)),
                pos,
            ));
        }
        Ok(test)
    }

    fn peek_binary_op(&mut self) -> Option<(BinOp, u8, usize)> {
        self.skip_trivia();
        let rest = self.rest();
        let &(spelling, op, prec) = OPERATORS.iter().find(|(s, _, _)| rest.starts_with(s))?;
        // Compound assignment, increment and shift operators are not supported.
        let next = rest[spelling.len()..].chars().next();
        let compound = match spelling {
            "+" => matches!(next, Some('+' | '=')),
            "-" => matches!(next, Some('-' | '=')),
            "*" => matches!(next, Some('*' | '=')),
            "/" | "%" => next == Some('='),
            "<" => next == Some('<'),
            ">" => next == Some('>'),
            _ => false,
        };
        if compound {
            return None;
        }
        Some((op, prec, spelling.len()))
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((op, prec, len)) = self.peek_binary_op() {
            if prec < min_prec {
                break;
            }
            let pos = self.pos;
            self.pos += len;
            let right = self.parse_binary(prec + 1)?;
            let kind = match op {
                BinOp::Arith(op) => ExprKind::Binary(op, Box::new(left), Box::new(right)),
                BinOp::Logic(op) => ExprKind::Logical(op, Box::new(left), Box::new(right)),
            };
            left = Expr::new(kind, pos);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        self.skip_trivia();
        let pos = self.pos;
        let op = if self.starts_with("!") {
            Some((UnaryOp::Not, 1))
        } else if self.starts_with("-") && !self.starts_with("--") {
            Some((UnaryOp::Neg, 1))
        } else if self.starts_with("+") && !self.starts_with("++") {
            Some((UnaryOp::Plus, 1))
        } else if self.peek_word() == Some("typeof") {
            Some((UnaryOp::TypeOf, "typeof".len()))
        } else {
            None
        };

        if let Some((op, len)) = op {
            self.pos += len;
            let argument = self.nested(Self::parse_unary)?;
            return Ok(Expr::new(ExprKind::Unary(op, Box::new(argument)), pos));
        }

        // Rendering is synchronous; `await` is accepted and ignored.
        if self.eat_keyword("await") {
            return self.nested(Self::parse_unary);
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_trivia();
            let pos = self.pos;
            if self.starts_with("?.") {
                self.pos += 2;
                self.skip_trivia();
                let kind = if self.starts_with("(") {
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args: self.parse_args()?,
                        optional: true,
                    }
                } else if self.eat("[") {
                    let index = self.parse_expr()?;
                    self.expect("]")?;
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                    }
                } else {
                    ExprKind::Member {
                        object: Box::new(expr),
                        property: self.ident()?,
                        optional: true,
                    }
                };
                expr = Expr::new(kind, pos);
            } else if self.starts_with(".") && !self.starts_with("...") {
                self.pos += 1;
                let property = self.ident()?;
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        property,
                        optional: false,
                    },
                    pos,
                );
            } else if self.starts_with("[") {
                self.pos += 1;
                let index = self.parse_expr()?;
                self.expect("]")?;
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    },
                    pos,
                );
            } else if self.starts_with("(") {
                let args = self.parse_args()?;
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                    },
                    pos,
                );
            } else if self.starts_with("!") && !self.starts_with("!=") {
                // non-null assertion
                self.pos += 1;
            } else if self.peek_word() == Some("as") {
                self.pos += "as".len();
                self.skip_type(TypeEnd::Line)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> PResult<Vec<Spreadable>> {
        self.expect("(")?;
        let mut args = Vec::new();
        loop {
            if self.eat(")") {
                break;
            }
            let arg = if self.eat("...") {
                Spreadable::Spread(self.parse_expr()?)
            } else {
                Spreadable::Item(self.parse_expr()?)
            };
            args.push(arg);
            if !self.eat(",") {
                self.expect(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        self.skip_trivia();
        let pos = self.pos;
        let Some(c) = self.peek() else {
            return Err(self.error("unexpected end of input"));
        };

        let kind = match c {
            '0'..='9' => ExprKind::Number(self.number()?),
            '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                ExprKind::Number(self.number()?)
            }
            '"' | '\'' => ExprKind::Str(self.string_literal()?),
            '`' => ExprKind::Template(self.template_literal()?),
            '(' => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(")")?;
                return Ok(inner);
            }
            '[' => ExprKind::Array(self.array_literal()?),
            '{' => ExprKind::Object(self.object_literal()?),
            '<' => ExprKind::Jsx(Box::new(self.parse_jsx_element()?)),
            c if is_ident_start(c) => {
                let word = self.ident()?;
                match word.as_str() {
                    "true" => ExprKind::Bool(true),
                    "false" => ExprKind::Bool(false),
                    "null" => ExprKind::Null,
                    "undefined" => ExprKind::Undefined,
                    "function" => {
                        self.pos = pos;
                        ExprKind::Function(self.parse_function(false)?)
                    }
                    "new" => {
                        let callee = self.parse_new_callee()?;
                        self.skip_trivia();
                        let args = if self.starts_with("(") {
                            self.parse_args()?
                        } else {
                            Vec::new()
                        };
                        ExprKind::New {
                            callee: Box::new(callee),
                            args,
                        }
                    }
                    w if is_reserved(w) => {
                        return Err(self.error_at(pos, format!("unexpected keyword `{w}`")));
                    }
                    _ => ExprKind::Ident(word),
                }
            }
            _ => return Err(self.error(format!("unexpected character `{c}`"))),
        };
        Ok(Expr::new(kind, pos))
    }

    fn parse_new_callee(&mut self) -> PResult<Expr> {
        self.skip_trivia();
        let pos = self.pos;
        let mut expr = Expr::new(ExprKind::Ident(self.binding_ident()?), pos);
        loop {
            self.skip_trivia();
            if !(self.starts_with(".") && !self.starts_with("...")) {
                return Ok(expr);
            }
            self.pos += 1;
            let property = self.ident()?;
            expr = Expr::new(
                ExprKind::Member {
                    object: Box::new(expr),
                    property,
                    optional: false,
                },
                pos,
            );
        }
    }

    fn array_literal(&mut self) -> PResult<Vec<Spreadable>> {
        self.expect("[")?;
        let mut items = Vec::new();
        loop {
            if self.eat("]") {
                break;
            }
            if self.eat(",") {
                items.push(Spreadable::Item(Expr::new(ExprKind::Undefined, self.pos)));
                continue;
            }
            let item = if self.eat("...") {
                Spreadable::Spread(self.parse_expr()?)
            } else {
                Spreadable::Item(self.parse_expr()?)
            };
            items.push(item);
            if !self.eat(",") {
                self.expect("]")?;
                break;
            }
        }
        Ok(items)
    }

    fn object_literal(&mut self) -> PResult<Vec<ObjectProp>> {
        self.expect("{")?;
        let mut props = Vec::new();
        loop {
            if self.eat("}") {
                break;
            }
            if self.eat("...") {
                props.push(ObjectProp::Spread(self.parse_expr()?));
            } else if self.eat("[") {
                let key = self.parse_expr()?;
                self.expect("]")?;
                self.expect(":")?;
                props.push(ObjectProp::Computed(key, self.parse_expr()?));
            } else {
                self.skip_trivia();
                let pos = self.pos;
                let key = self.property_key()?;
                if self.eat(":") {
                    props.push(ObjectProp::KeyValue(key, self.parse_expr()?));
                } else if {
                    self.skip_trivia();
                    self.starts_with("(")
                } {
                    // method shorthand: `name(args) { ... }`
                    let params = self.parse_params()?;
                    if self.eat(":") {
                        self.skip_type(TypeEnd::ReturnType)?;
                    }
                    let body = FnBody::Block(self.parse_block()?);
                    let decl = FunctionDecl {
                        name: Some(key.clone()),
                        params,
                        body,
                    };
                    props.push(ObjectProp::KeyValue(
                        key,
                        Expr::new(ExprKind::Function(Arc::new(decl)), pos),
                    ));
                } else {
                    let value = Expr::new(ExprKind::Ident(key.clone()), pos);
                    props.push(ObjectProp::KeyValue(key, value));
                }
            }
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(props)
    }

    // ------------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------------

    fn number(&mut self) -> PResult<f64> {
        let start = self.pos;
        let rest = self.rest().as_bytes();

        if rest.len() > 2 && rest[0] == b'0' && matches!(rest[1], b'x' | b'X') {
            let end = 2 + rest[2..]
                .iter()
                .take_while(|b| b.is_ascii_hexdigit() || **b == b'_')
                .count();
            let digits: String = self.rest()[2..end].chars().filter(|c| *c != '_').collect();
            self.pos += end;
            return u64::from_str_radix(&digits, 16)
                .map(|n| n as f64)
                .map_err(|_| self.error_at(start, "invalid hexadecimal literal"));
        }

        let digits = |from: usize| {
            rest[from..]
                .iter()
                .take_while(|b| b.is_ascii_digit() || **b == b'_')
                .count()
        };
        let mut end = digits(0);
        if rest.get(end) == Some(&b'.') {
            end += 1 + digits(end + 1);
        }
        if matches!(rest.get(end), Some(b'e' | b'E')) {
            let mut exp = end + 1;
            if matches!(rest.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            let exp_digits = digits(exp);
            if exp_digits > 0 {
                end = exp + exp_digits;
            }
        }

        let text: String = self.rest()[..end].chars().filter(|c| *c != '_').collect();
        self.pos += end;
        text.parse::<f64>()
            .map_err(|_| self.error_at(start, "invalid number literal"))
    }

    fn string_literal(&mut self) -> PResult<String> {
        self.skip_trivia();
        let start = self.pos;
        let quote = match self.bump() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error_at(start, "expected string literal")),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error_at(start, "unterminated string literal"));
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn template_literal(&mut self) -> PResult<Vec<TemplatePart>> {
        let start = self.pos;
        self.bump();
        let mut parts = Vec::new();
        let mut buf = String::new();
        loop {
            if self.starts_with("${") {
                self.pos += 2;
                if !buf.is_empty() {
                    parts.push(TemplatePart::Str(std::mem::take(&mut buf)));
                }
                let expr = self.parse_expr()?;
                self.expect("}")?;
                parts.push(TemplatePart::Expr(expr));
                continue;
            }
            match self.bump() {
                None => return Err(self.error_at(start, "unterminated template literal")),
                Some('`') => break,
                Some('\\') => self.escape(&mut buf)?,
                Some(c) => buf.push(c),
            }
        }
        if !buf.is_empty() {
            parts.push(TemplatePart::Str(buf));
        }
        Ok(parts)
    }

    fn escape(&mut self, out: &mut String) -> PResult<()> {
        let pos = self.pos;
        match self.bump() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            // line continuation
            Some('\n') => {}
            Some('\r') => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            Some('x') => out.push(self.take_hex(2)?),
            Some('u') if self.starts_with("{") => {
                let end = self
                    .rest()
                    .find('}')
                    .ok_or_else(|| self.error_at(pos, "invalid unicode escape"))?;
                let digits = &self.rest()[1..end];
                let c = u32::from_str_radix(digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error_at(pos, "invalid unicode escape"))?;
                self.pos += end + 1;
                out.push(c);
            }
            Some('u') => out.push(self.take_hex(4)?),
            Some(c) => out.push(c),
            None => return Err(self.error_at(pos, "unterminated escape sequence")),
        }
        Ok(())
    }

    fn take_hex(&mut self, len: usize) -> PResult<char> {
        let digits = self
            .rest()
            .get(..len)
            .filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid escape sequence"))?;
        let c = u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("invalid escape sequence"))?;
        self.pos += len;
        Ok(c)
    }

    // ------------------------------------------------------------------------
    // JSX
    // ------------------------------------------------------------------------

    fn parse_jsx_element(&mut self) -> PResult<JsxElement> {
        self.nested(Self::jsx_element)
    }

    fn jsx_element(&mut self) -> PResult<JsxElement> {
        self.skip_trivia();
        let pos = self.pos;
        if self.bump() != Some('<') {
            return Err(self.error_at(pos, "expected `<`"));
        }
        self.skip_trivia();

        if self.starts_with(">") {
            self.pos += 1;
            let children = self.parse_jsx_children()?;
            self.expect_jsx_close("")?;
            return Ok(JsxElement {
                name: JsxName::Fragment,
                attrs: Vec::new(),
                children,
                pos,
            });
        }

        let tag = self.jsx_name()?;
        let name = self.jsx_name_kind(tag, pos)?;
        let mut attrs = Vec::new();
        loop {
            self.skip_trivia();
            if self.starts_with("/>") {
                self.pos += 2;
                return Ok(JsxElement {
                    name,
                    attrs,
                    children: Vec::new(),
                    pos,
                });
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.starts_with("{") {
                self.pos += 1;
                self.expect("...")?;
                let spread = self.parse_expr()?;
                self.expect("}")?;
                attrs.push(JsxAttr::Spread(spread));
                continue;
            }

            let attr = Name::from(self.jsx_name()?);
            self.skip_trivia();
            let value = if self.starts_with("=") {
                self.pos += 1;
                self.skip_trivia();
                let value_pos = self.pos;
                match self.peek() {
                    Some('"' | '\'') => {
                        Some(Expr::new(ExprKind::Str(self.jsx_string()?), value_pos))
                    }
                    Some('{') => {
                        self.pos += 1;
                        let expr = self.parse_expr()?;
                        self.expect("}")?;
                        Some(expr)
                    }
                    Some('<') => Some(Expr::new(
                        ExprKind::Jsx(Box::new(self.parse_jsx_element()?)),
                        value_pos,
                    )),
                    _ => return Err(self.error("expected attribute value")),
                }
            } else {
                None
            };
            attrs.push(JsxAttr::Named(attr, value));
        }

        let children = self.parse_jsx_children()?;
        self.expect_jsx_close(tag)?;
        Ok(JsxElement {
            name,
            attrs,
            children,
            pos,
        })
    }

    fn jsx_name(&mut self) -> PResult<&'a str> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, c)| !is_jsx_name_char(c))
            .map_or(rest.len(), |(i, _)| i);
        if end == 0 {
            return Err(self.error("expected a JSX tag or attribute name"));
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    /// Lowercase tags are HTML elements; capitalised tags and member paths
    /// are components looked up in scope.
    fn jsx_name_kind(&self, tag: &str, pos: usize) -> PResult<JsxName> {
        let is_component = tag.contains('.') || tag.starts_with(|c: char| c.is_uppercase());
        if !is_component {
            return Ok(JsxName::Intrinsic(Name::from(tag)));
        }

        let mut segments = tag.split('.');
        let first = segments.next().unwrap_or_default();
        let mut expr = Expr::new(ExprKind::Ident(Name::from(first)), pos);
        for segment in segments {
            if segment.is_empty() {
                return Err(self.error_at(pos, format!("invalid component name `{tag}`")));
            }
            expr = Expr::new(
                ExprKind::Member {
                    object: Box::new(expr),
                    property: Name::from(segment),
                    optional: false,
                },
                pos,
            );
        }
        Ok(JsxName::Component(expr))
    }

    /// Attribute strings keep backslashes; only HTML entities are decoded.
    fn jsx_string(&mut self) -> PResult<String> {
        let start = self.pos;
        let Some(quote) = self.bump() else {
            return Err(self.error("expected string"));
        };
        let body_start = self.pos;
        loop {
            match self.bump() {
                None => return Err(self.error_at(start, "unterminated attribute string")),
                Some(c) if c == quote => {
                    return Ok(decode_entities(&self.src[body_start..self.pos - 1]));
                }
                Some(_) => {}
            }
        }
    }

    fn parse_jsx_children(&mut self) -> PResult<Vec<JsxChild>> {
        let mut children = Vec::new();
        let mut text_start = self.pos;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated JSX element"));
            };
            match c {
                '<' | '{' => {
                    let raw = &self.src[text_start..self.pos];
                    match self.markdown {
                        Some(render) if !raw.trim().is_empty() => {
                            children.push(JsxChild::Html(render(raw)));
                        }
                        Some(_) => {}
                        None => push_jsx_text(&mut children, raw),
                    }
                    if self.starts_with("</") {
                        return Ok(children);
                    }
                    if c == '<' {
                        children.push(JsxChild::Element(self.parse_jsx_element()?));
                    } else {
                        self.pos += 1;
                        self.skip_trivia();
                        // `{}` and `{/* comment */}` render nothing
                        if self.starts_with("}") {
                            self.pos += 1;
                        } else {
                            let expr = self.parse_expr()?;
                            self.expect("}")?;
                            children.push(JsxChild::Expr(expr));
                        }
                    }
                    text_start = self.pos;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn expect_jsx_close(&mut self, tag: &str) -> PResult<()> {
        let pos = self.pos;
        self.pos += "</".len();
        self.skip_trivia();
        let close = if self.starts_with(">") {
            ""
        } else {
            self.jsx_name()?
        };
        if close != tag {
            return Err(self.error_at(
                pos,
                format!("expected closing tag `</{tag}>`, found `</{close}>`"),
            ));
        }
        self.expect(">")
    }

    // ------------------------------------------------------------------------
    // Skipped TypeScript syntax
    // ------------------------------------------------------------------------

    fn is_type_alias(&mut self) -> bool {
        let mut ahead = *self;
        if !ahead.eat_keyword("type") || ahead.binding_ident().is_err() {
            return false;
        }
        ahead.skip_trivia();
        ahead.starts_with("<") || ahead.eat_assign()
    }

    fn skip_type_alias(&mut self) -> PResult<()> {
        self.expect_keyword("type")?;
        self.binding_ident()?;
        self.skip_generics()?;
        if !self.eat_assign() {
            return Err(self.error("expected `=` in type alias"));
        }
        self.skip_type(TypeEnd::Line)
    }

    fn skip_interface(&mut self) -> PResult<()> {
        self.expect_keyword("interface")?;
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('{') => return self.skip_balanced(),
                Some('<') => self.skip_balanced()?,
                Some(_) => {
                    self.bump();
                }
                None => return Err(self.error("unterminated interface")),
            }
        }
    }

    fn skip_generics(&mut self) -> PResult<()> {
        self.skip_trivia();
        if self.starts_with("<") {
            self.skip_balanced()?;
        }
        Ok(())
    }

    /// Skip a bracketed group starting at the current opener.
    fn skip_balanced(&mut self) -> PResult<()> {
        let start = self.pos;
        let mut stack: Vec<char> = Vec::new();
        loop {
            self.skip_trivia();
            let Some(c) = self.peek() else {
                return Err(self.error_at(start, "unbalanced brackets"));
            };
            match c {
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                '<' => stack.push('>'),
                '=' if self.starts_with("=>") => {
                    self.pos += 2;
                    continue;
                }
                ')' | ']' | '}' | '>' => {
                    if stack.pop() != Some(c) {
                        return Err(self.error(format!("unexpected `{c}`")));
                    }
                }
                '"' | '\'' => {
                    self.string_literal()?;
                    continue;
                }
                '`' => {
                    self.template_literal()?;
                    continue;
                }
                _ => {}
            }
            self.bump();
            if stack.is_empty() {
                return Ok(());
            }
        }
    }

    fn skip_type(&mut self, end: TypeEnd) -> PResult<()> {
        let start = self.pos;
        let mut expect_operand = true;
        loop {
            let newline = self.skip_trivia();
            if newline
                && end == TypeEnd::Line
                && !expect_operand
                && !matches!(self.peek(), Some('|' | '&'))
            {
                return Ok(());
            }
            let Some(c) = self.peek() else {
                return if end == TypeEnd::Line {
                    Ok(())
                } else {
                    Err(self.error_at(start, "unterminated type annotation"))
                };
            };
            match c {
                '=' if self.starts_with("=>") => {
                    if end == TypeEnd::ArrowReturn && !expect_operand {
                        return Ok(());
                    }
                    self.pos += 2;
                    expect_operand = true;
                }
                '=' => {
                    if matches!(end, TypeEnd::Param | TypeEnd::Binding) {
                        return Ok(());
                    }
                    return Err(self.error("unexpected `=` in type"));
                }
                '{' if end == TypeEnd::ReturnType && !expect_operand => return Ok(()),
                '(' | '[' | '{' | '<' => {
                    self.skip_balanced()?;
                    expect_operand = false;
                }
                ')' | ']' | '}' | ',' | ';' | '>' => return Ok(()),
                '|' | '&' | '?' | ':' | '.' => {
                    self.pos += 1;
                    expect_operand = true;
                }
                '"' | '\'' => {
                    self.string_literal()?;
                    expect_operand = false;
                }
                c if is_ident_start(c) => {
                    let word = self.ident()?;
                    expect_operand = matches!(
                        word.as_str(),
                        "keyof" | "typeof" | "readonly" | "infer" | "extends" | "unique" | "is"
                    );
                }
                _ => {
                    self.bump();
                    expect_operand = false;
                }
            }
        }
    }
}

fn push_jsx_text(children: &mut Vec<JsxChild>, raw: &str) {
    let text = clean_jsx_text(raw);
    if !text.is_empty() {
        children.push(JsxChild::Text(decode_entities(&text)));
    }
}

/// JSX whitespace rules: lines are trimmed where they touch a line break,
/// whitespace-only lines are dropped and the rest are joined with one space.
fn clean_jsx_text(raw: &str) -> String {
    let lines: Vec<&str> = raw
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    let last_non_empty = lines
        .iter()
        .rposition(|l| l.chars().any(|c| c != ' ' && c != '\t'));

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.replace('\t', " ");
        let mut trimmed = line.as_str();
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ');
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ');
        }
        if !trimmed.is_empty() {
            out.push_str(trimmed);
            if Some(i) != last_non_empty {
                out.push(' ');
            }
        }
    }
    out
}

/// Decode the HTML entities that commonly appear in JSX text.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        let semi = rest
            .char_indices()
            .take(12)
            .find(|&(_, c)| c == ';')
            .map(|(i, _)| i);
        let decoded = semi.and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            return char::from_u32(code);
        }
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        parse_module(src).unwrap()
    }

    fn default_body(program: &Program) -> &FnBody {
        program
            .items
            .iter()
            .find_map(|item| match item {
                Item::Function {
                    decl,
                    export: Export::Default,
                } => Some(&decl.body),
                _ => None,
            })
            .expect("default export")
    }

    #[test]
    fn test_line_col() {
        let src = "ab\ncd\n  ef";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 4), (2, 2));
        assert_eq!(line_col(src, 8), (3, 3));
        assert_eq!(line_col(src, 100), (3, 5));
    }

    #[test]
    fn test_clean_jsx_text() {
        assert_eq!(clean_jsx_text("\n      louka.sh\n    "), "louka.sh");
        assert_eq!(clean_jsx_text("  hi  "), "  hi  ");
        assert_eq!(
            clean_jsx_text("\n  You can contact me at "),
            "You can contact me at "
        );
        assert_eq!(clean_jsx_text("\n  one\n  two\n"), "one two");
        assert_eq!(clean_jsx_text("\n   \n"), "");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("R&D"), "R&D");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_parse_imports() {
        let program = parse(
            "import dayjs from 'dayjs'\n\
             import { Card, Badge as B } from './card'\n\
             import * as ui from './ui'\n\
             import type { Foo } from './types'\n\
             import './index.css'",
        );
        let imports: Vec<_> = program
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Import(decl) => Some(decl),
                _ => None,
            })
            .collect();
        assert_eq!(imports.len(), 4);
        assert_eq!(imports[0].default.as_deref(), Some("dayjs"));
        assert_eq!(imports[0].source, "dayjs");
        assert_eq!(imports[1].named.len(), 2);
        assert_eq!(imports[1].named[1].0, "Badge");
        assert_eq!(imports[1].named[1].1, "B");
        assert_eq!(imports[2].namespace.as_deref(), Some("ui"));
        assert_eq!(imports[3].source, "./index.css");
    }

    #[test]
    fn test_skips_typescript_declarations() {
        let program = parse(
            "interface Frontmatter {\n  title: string\n  date: string\n}\n\
             type Props = { posts: Record<string, Frontmatter> }\n\
             export default function Index(params: { posts: Record<string, Frontmatter> }): JSX.Element {\n\
               return <main />\n\
             }",
        );
        assert_eq!(program.items.len(), 1);
        let FnBody::Block(stmts) = default_body(&program) else {
            panic!("expected block body");
        };
        assert!(matches!(stmts[0], Stmt::Return(Some(_))));
    }

    #[test]
    fn test_parse_arrow_with_destructured_params() {
        let program = parse("const f = ([uri, text]) => ({ uri, text })");
        let Item::Binding { init, .. } = &program.items[0] else {
            panic!("expected binding");
        };
        let ExprKind::Function(decl) = &init.kind else {
            panic!("expected arrow, got {:?}", init.kind);
        };
        assert!(matches!(decl.params[0], Pattern::Array { .. }));
        let FnBody::Expr(body) = &decl.body else {
            panic!("expected expression body");
        };
        assert!(matches!(body.kind, ExprKind::Object(_)));
    }

    #[test]
    fn test_parenthesized_expression_is_not_arrow() {
        let program = parse("const x = (1 + 2) * 3");
        let Item::Binding { init, .. } = &program.items[0] else {
            panic!("expected binding");
        };
        assert!(matches!(init.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn test_conditional_with_identifier_branches() {
        let program = parse("const x = a ? b : c");
        let Item::Binding { init, .. } = &program.items[0] else {
            panic!("expected binding");
        };
        assert!(matches!(init.kind, ExprKind::Conditional(..)));
    }

    #[test]
    fn test_parse_jsx_attributes_and_children() {
        let program = parse(
            "export default () => (\n\
               <a href='/x' className={cls} target='_blank' data-slug={uri} {...rest} hidden>\n\
                 hello {name}{' '}\n\
                 <b>world</b>\n\
               </a>\n\
             )",
        );
        let Item::ExportDefault(expr) = &program.items[0] else {
            panic!("expected default export");
        };
        let ExprKind::Function(decl) = &expr.kind else {
            panic!("expected arrow");
        };
        let FnBody::Expr(body) = &decl.body else {
            panic!("expected expression body");
        };
        let ExprKind::Jsx(el) = &body.kind else {
            panic!("expected jsx");
        };
        assert!(matches!(&el.name, JsxName::Intrinsic(n) if n == "a"));
        assert_eq!(el.attrs.len(), 6);
        assert!(matches!(&el.attrs[3], JsxAttr::Named(n, Some(_)) if n == "data-slug"));
        assert!(matches!(&el.attrs[4], JsxAttr::Spread(_)));
        assert!(matches!(&el.attrs[5], JsxAttr::Named(n, None) if n == "hidden"));
        assert!(matches!(&el.children[0], JsxChild::Text(t) if t == "hello "));
        assert!(matches!(&el.children[1], JsxChild::Expr(_)));
        assert!(matches!(&el.children[2], JsxChild::Expr(_)));
        assert!(matches!(&el.children[3], JsxChild::Element(_)));
    }

    #[test]
    fn test_parse_fragment_and_member_component() {
        let (el, end) = parse_jsx_at("x <>{/* note */}<ui.Card /></> y", 2, &|t: &str| t.to_string()).unwrap();
        assert!(matches!(el.name, JsxName::Fragment));
        assert_eq!(el.children.len(), 1);
        let JsxChild::Element(card) = &el.children[0] else {
            panic!("expected element");
        };
        assert!(matches!(card.name, JsxName::Component(_)));
        assert_eq!(end, 30);
    }

    #[test]
    fn test_template_literal() {
        let program = parse("const href = `/posts/${slug}?a=${1 + 2}`");
        let Item::Binding { init, .. } = &program.items[0] else {
            panic!("expected binding");
        };
        let ExprKind::Template(parts) = &init.kind else {
            panic!("expected template");
        };
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], TemplatePart::Str(s) if s == "/posts/"));
    }

    #[test]
    fn test_return_followed_by_newline_returns_undefined() {
        let program = parse("function f() {\n  return\n  1\n}");
        let Item::Function { decl, .. } = &program.items[0] else {
            panic!("expected function");
        };
        let FnBody::Block(stmts) = &decl.body else {
            panic!("expected block");
        };
        assert!(matches!(stmts[0], Stmt::Return(None)));
    }

    #[test]
    fn test_mismatched_closing_tag_reports_location() {
        let err = parse_module("export default () => <div>\n  <span></div>\n</div>").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("</span>"), "{}", err.message);
    }

    #[test]
    fn test_unsupported_statement() {
        let err = parse_module("function f() { for (const x of xs) {} }").unwrap_err();
        assert!(err.message.contains("`for`"));
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse_module("const x = 'abc\n").unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert_eq!((err.line, err.column), (1, 11));
    }

    /// Parse on a thread with room for [`MAX_NESTING`] levels in debug builds.
    fn parse_deep(src: String) -> Result<Program, SyntaxError> {
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(move || parse_module(&src))
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let arrays = format!("const x = {}", "[".repeat(20_000));
        let err = parse_deep(arrays).unwrap_err();
        assert!(err.message.contains("nesting deeper than"), "{}", err.message);
        assert_eq!(err.line, 1);

        let nots = format!("const x = {}a", "!".repeat(20_000));
        assert!(parse_deep(nots).unwrap_err().message.contains("nesting"));

        let elements = format!("export default () => {}", "<b>".repeat(20_000));
        assert!(parse_deep(elements).unwrap_err().message.contains("nesting"));

        let ifs = format!("function f() {{ {} return 1 }}", "if (a) ".repeat(20_000));
        assert!(parse_deep(ifs).unwrap_err().message.contains("nesting"));

        let patterns = format!("const {}a{} = x", "[".repeat(20_000), "]".repeat(20_000));
        assert!(parse_deep(patterns).unwrap_err().message.contains("nesting"));
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let depth = 40;
        let src = format!("const x = {}1{}", "[".repeat(depth), "]".repeat(depth));
        assert!(parse_deep(src).is_ok());
        let src = format!(
            "export default () => {}hi{}",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        assert!(parse_deep(src).is_ok());
    }
}
