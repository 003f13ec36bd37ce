//! Syntax tree for the component markup language.
//!
//! Positions are byte offsets into the module source; they are turned into
//! `line:column` only when a diagnostic is reported.

use compact_str::CompactString;
use std::sync::Arc;

pub type Name = CompactString;

/// A parsed module: top-level items in source order.
#[derive(Debug, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub enum Item {
    Import(ImportDecl),
    Function {
        decl: Arc<FunctionDecl>,
        export: Export,
    },
    Binding {
        pattern: Pattern,
        init: Expr,
        exported: bool,
    },
    ExportDefault(Expr),
    /// Top-level expression statement (`dayjs.extend(utc)`).
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Export {
    None,
    Named,
    Default,
}

#[derive(Debug)]
pub struct ImportDecl {
    pub source: String,
    pub default: Option<Name>,
    /// `(imported, local)` pairs.
    pub named: Vec<(Name, Name)>,
    pub namespace: Option<Name>,
    pub pos: usize,
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Option<Name>,
    pub params: Vec<Pattern>,
    pub body: FnBody,
}

#[derive(Debug)]
pub enum FnBody {
    Block(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Debug)]
pub enum Stmt {
    Binding(Pattern, Expr),
    Return(Option<Expr>),
    If(Expr, Vec<Stmt>, Option<Vec<Stmt>>),
    Function(Arc<FunctionDecl>),
    Expr(Expr),
}

/// Binding target of `const`, parameters and destructuring.
#[derive(Debug)]
pub enum Pattern {
    Ident(Name),
    Object {
        props: Vec<(Name, Pattern)>,
        rest: Option<Name>,
    },
    Array {
        elems: Vec<Option<Pattern>>,
        rest: Option<Name>,
    },
    /// Pattern with a default used when the value is `undefined`.
    Default(Box<Pattern>, Box<Expr>),
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: usize,
}

#[derive(Debug)]
pub enum ExprKind {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Template(Vec<TemplatePart>),
    Ident(Name),
    Array(Vec<Spreadable>),
    Object(Vec<ObjectProp>),
    Member {
        object: Box<Expr>,
        property: Name,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Spreadable>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Spreadable>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Function(Arc<FunctionDecl>),
    Jsx(Box<JsxElement>),
}

#[derive(Debug)]
pub enum TemplatePart {
    Str(String),
    Expr(Expr),
}

#[derive(Debug)]
pub enum Spreadable {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug)]
pub enum ObjectProp {
    KeyValue(Name, Expr),
    Computed(Expr, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug)]
pub struct JsxElement {
    pub name: JsxName,
    pub attrs: Vec<JsxAttr>,
    pub children: Vec<JsxChild>,
    pub pos: usize,
}

#[derive(Debug)]
pub enum JsxName {
    Fragment,
    /// Lowercase tag, rendered as an HTML element.
    Intrinsic(Name),
    /// Capitalised tag or member path, resolved in scope.
    Component(Expr),
}

#[derive(Debug)]
pub enum JsxAttr {
    /// `name`, `name="text"` or `name={expr}`; `None` means a bare flag.
    Named(Name, Option<Expr>),
    Spread(Expr),
}

#[derive(Debug)]
pub enum JsxChild {
    Text(String),
    /// Markup written verbatim, from Markdown text inside a post.
    Html(String),
    Expr(Expr),
    Element(JsxElement),
}

impl Expr {
    pub const fn new(kind: ExprKind, pos: usize) -> Self {
        Self { kind, pos }
    }
}

impl Pattern {
    /// Names introduced by this pattern, in source order.
    pub fn bound_names(&self, out: &mut Vec<Name>) {
        match self {
            Self::Ident(name) => out.push(name.clone()),
            Self::Object { props, rest } => {
                props.iter().for_each(|(_, p)| p.bound_names(out));
                out.extend(rest.iter().cloned());
            }
            Self::Array { elems, rest } => {
                elems.iter().flatten().for_each(|p| p.bound_names(out));
                out.extend(rest.iter().cloned());
            }
            Self::Default(inner, _) => inner.bound_names(out),
        }
    }
}
