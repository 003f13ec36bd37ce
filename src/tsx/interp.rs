//! Tree-walking evaluator for parsed templates.
//!
//! An [`Interp`] is cheap to create and holds only per-render state (the call
//! depth counter). Everything shared between renders lives in [`Module`]s,
//! which are immutable after instantiation and can be rendered from several
//! threads at once.

use super::ast::{
    BinaryOp, Expr, ExprKind, FnBody, FunctionDecl, JsxAttr, JsxChild, JsxElement, JsxName, LogicalOp,
    ObjectProp, Pattern, Spreadable, Stmt, TemplatePart, UnaryOp,
};
use super::builtins;
use super::module::Module;
use super::parser::line_col;
use super::value::{Function, Object, Scope, Value, format_number};
use crate::vdom::{AttrValue, Element, Node};
use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Default bound on nested function calls.
pub const MAX_CALL_DEPTH: usize = 256;

/// Longest string (in bytes) or array a template may build.
pub const MAX_LENGTH: usize = 1 << 29;

/// Reject a string or array that would grow past [`MAX_LENGTH`].
pub fn check_length(len: usize, what: &str) -> EvalResult<()> {
    if len > MAX_LENGTH {
        return Err(EvalError::new(format!(
            "invalid {what} length {len}, the limit is {MAX_LENGTH}"
        )));
    }
    Ok(())
}

/// Convert a requested length, rejecting anything past [`MAX_LENGTH`].
pub fn length_from(n: f64, what: &str) -> EvalResult<usize> {
    if n.is_nan() || n <= 0.0 {
        return Ok(0);
    }
    if n > MAX_LENGTH as f64 {
        return Err(EvalError::new(format!(
            "invalid {what} length {}, the limit is {MAX_LENGTH}",
            format_number(n)
        )));
    }
    Ok(n as usize)
}

/// A runtime failure, located at the innermost expression that raised it.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    /// `unit:line:column`
    pub location: Option<String>,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for EvalError {}

pub type EvalResult<T> = Result<T, EvalError>;

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Attach a location unless a more precise one is already set.
    pub fn locate(mut self, module: &Module, pos: usize) -> Self {
        if self.location.is_none() {
            let (line, column) = line_col(module.source(), pos);
            self.location = Some(format!("{}:{line}:{column}", module.name()));
        }
        self
    }
}

pub struct Interp {
    depth: Cell<usize>,
    max_depth: usize,
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    pub const fn new() -> Self {
        Self::with_max_depth(MAX_CALL_DEPTH)
    }

    pub const fn with_max_depth(max_depth: usize) -> Self {
        Self {
            depth: Cell::new(0),
            max_depth,
        }
    }

    fn enter(&self) -> EvalResult<DepthGuard<'_>> {
        let depth = self.depth.get() + 1;
        if depth > self.max_depth {
            return Err(EvalError::new(format!(
                "maximum call depth of {} exceeded",
                self.max_depth
            )));
        }
        self.depth.set(depth);
        Ok(DepthGuard(&self.depth))
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    pub fn call(&self, callee: &Value, args: Vec<Value>) -> EvalResult<Value> {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            other => Err(EvalError::new(format!(
                "{} is not a function",
                other.type_of()
            ))),
        }
    }

    pub fn call_function(&self, func: &Arc<Function>, args: Vec<Value>) -> EvalResult<Value> {
        let _guard = self.enter()?;
        match func.as_ref() {
            Function::Closure { decl, env, module } => {
                let module = module
                    .upgrade()
                    .ok_or_else(|| EvalError::new("function called after its module was unloaded"))?;
                let mut scope = env.clone();
                // Named functions can refer to themselves.
                if let Some(name) = &decl.name {
                    scope = scope.bind(name.clone(), Value::Function(func.clone()));
                }
                let mut args = args.into_iter();
                for param in &decl.params {
                    let arg = args.next().unwrap_or_default();
                    scope = self.bind_pattern(param, arg, scope, &module)?;
                }
                match &decl.body {
                    FnBody::Expr(expr) => self.eval(expr, &scope, &module),
                    FnBody::Block(stmts) => {
                        Ok(self.exec_block(stmts, scope, &module)?.unwrap_or_default())
                    }
                }
            }
            Function::Native(native) => (native.call)(self, args),
            Function::Method { this, name } => builtins::call_method(self, this, name, args),
        }
    }

    /// Create a closure over `scope`.
    pub fn closure(&self, decl: &Arc<FunctionDecl>, scope: &Scope, module: &Arc<Module>) -> Value {
        Value::Function(Arc::new(Function::Closure {
            decl: decl.clone(),
            env: scope.clone(),
            module: Arc::downgrade(module),
        }))
    }

    // ------------------------------------------------------------------------
    // Statements and bindings
    // ------------------------------------------------------------------------

    /// Run a block; `Some` carries the value of a `return`.
    fn exec_block(
        &self,
        stmts: &[Stmt],
        mut scope: Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Option<Value>> {
        for stmt in stmts {
            if let Stmt::Function(decl) = stmt {
                if let Some(name) = &decl.name {
                    let f = self.closure(decl, &scope, module);
                    scope = scope.bind(name.clone(), f);
                }
            }
        }

        for stmt in stmts {
            match stmt {
                Stmt::Binding(pattern, init) => {
                    let value = self.eval(init, &scope, module)?;
                    scope = self.bind_pattern(pattern, value, scope, module)?;
                }
                Stmt::Return(value) => {
                    let value = match value {
                        Some(expr) => self.eval(expr, &scope, module)?,
                        None => Value::Undefined,
                    };
                    return Ok(Some(value));
                }
                Stmt::If(test, consequent, alternate) => {
                    let branch = if self.eval(test, &scope, module)?.truthy() {
                        Some(consequent)
                    } else {
                        alternate.as_ref()
                    };
                    if let Some(branch) = branch {
                        if let Some(value) = self.exec_block(branch, scope.clone(), module)? {
                            return Ok(Some(value));
                        }
                    }
                }
                Stmt::Function(_) => {}
                Stmt::Expr(expr) => {
                    self.eval(expr, &scope, module)?;
                }
            }
        }
        Ok(None)
    }

    pub fn bind_pattern(
        &self,
        pattern: &Pattern,
        value: Value,
        scope: Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Scope> {
        match pattern {
            Pattern::Ident(name) => Ok(scope.bind(name.clone(), value)),
            Pattern::Default(inner, default) => {
                let value = if matches!(value, Value::Undefined) {
                    self.eval(default, &scope, module)?
                } else {
                    value
                };
                self.bind_pattern(inner, value, scope, module)
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(EvalError::new(format!(
                        "cannot destructure properties of {}",
                        value.to_js_string()
                    )));
                }
                let mut scope = scope;
                for (key, target) in props {
                    let field = builtins::get_property(&value, key);
                    scope = self.bind_pattern(target, field, scope, module)?;
                }
                if let Some(rest) = rest {
                    let remaining: Object = match &value {
                        Value::Object(object) => object
                            .iter()
                            .filter(|(k, _)| !props.iter().any(|(p, _)| p == *k))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                        _ => Object::default(),
                    };
                    scope = scope.bind(rest.clone(), remaining.into());
                }
                Ok(scope)
            }
            Pattern::Array { elems, rest } => {
                let items = builtins::iterate(&value)?;
                let mut scope = scope;
                for (i, elem) in elems.iter().enumerate() {
                    if let Some(target) = elem {
                        let item = items.get(i).cloned().unwrap_or_default();
                        scope = self.bind_pattern(target, item, scope, module)?;
                    }
                }
                if let Some(rest) = rest {
                    let tail: Vec<Value> = items.iter().skip(elems.len()).cloned().collect();
                    scope = scope.bind(rest.clone(), tail.into());
                }
                Ok(scope)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    pub fn eval(&self, expr: &Expr, scope: &Scope, module: &Arc<Module>) -> EvalResult<Value> {
        self.eval_kind(expr, scope, module)
            .map_err(|e| e.locate(module, expr.pos))
    }

    fn eval_kind(&self, expr: &Expr, scope: &Scope, module: &Arc<Module>) -> EvalResult<Value> {
        Ok(match &expr.kind {
            ExprKind::Undefined => Value::Undefined,
            ExprKind::Null => Value::Null,
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Number(n) => Value::Number(*n),
            ExprKind::Str(s) => Value::from(s.as_str()),
            ExprKind::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Str(s) => out.push_str(s),
                        TemplatePart::Expr(e) => {
                            out.push_str(&self.eval(e, scope, module)?.to_js_string());
                        }
                    }
                    check_length(out.len(), "string").map_err(|e| e.locate(module, expr.pos))?;
                }
                Value::from(out)
            }
            ExprKind::Ident(name) => self
                .try_lookup(name, scope, module)
                .ok_or_else(|| EvalError::new(format!("`{name}` is not defined")))?,
            ExprKind::Array(items) => Value::from(self.eval_spreadable(items, scope, module)?),
            ExprKind::Object(props) => self.eval_object(props, scope, module)?,
            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Call { .. } => {
                self.eval_chain(expr, scope, module)?.unwrap_or_default()
            }
            ExprKind::New { callee, args } => {
                if !matches!(&callee.kind, ExprKind::Ident(name) if name.as_str() == "Date") {
                    return Err(EvalError::new(format!(
                        "`new {}` is not supported; only `new Date(...)` is",
                        describe(callee)
                    )));
                }
                let args = self.eval_spreadable(args, scope, module)?;
                builtins::construct_date(&args)
            }
            ExprKind::Unary(op, argument) => match op {
                UnaryOp::TypeOf => {
                    // `typeof undeclared` is "undefined", not an error
                    let value = match &argument.kind {
                        ExprKind::Ident(name) => {
                            self.try_lookup(name, scope, module).unwrap_or_default()
                        }
                        _ => self.eval(argument, scope, module)?,
                    };
                    Value::from(value.type_of())
                }
                UnaryOp::Not => Value::Bool(!self.eval(argument, scope, module)?.truthy()),
                UnaryOp::Neg => Value::Number(-self.eval(argument, scope, module)?.to_number()),
                UnaryOp::Plus => Value::Number(self.eval(argument, scope, module)?.to_number()),
            },
            ExprKind::Binary(op, left, right) => {
                let left = self.eval(left, scope, module)?;
                let right = self.eval(right, scope, module)?;
                binary(*op, &left, &right).map_err(|e| e.locate(module, expr.pos))?
            }
            ExprKind::Logical(op, left, right) => {
                let left = self.eval(left, scope, module)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    left
                } else {
                    self.eval(right, scope, module)?
                }
            }
            ExprKind::Conditional(test, consequent, alternate) => {
                if self.eval(test, scope, module)?.truthy() {
                    self.eval(consequent, scope, module)?
                } else {
                    self.eval(alternate, scope, module)?
                }
            }
            ExprKind::Function(decl) => self.closure(decl, scope, module),
            ExprKind::Jsx(element) => Value::from(self.eval_jsx(element, scope, module)?),
        })
    }

    fn try_lookup(&self, name: &str, scope: &Scope, module: &Module) -> Option<Value> {
        scope
            .lookup(name)
            .cloned()
            .or_else(|| module.lookup(name))
            .or_else(|| builtins::global(name))
    }

    /// Member, index and call chains. `None` means an optional link (`?.`)
    /// short-circuited the rest of the chain.
    fn eval_chain(
        &self,
        expr: &Expr,
        scope: &Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Option<Value>> {
        match &expr.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = self.eval_link(object, scope, module)? else {
                    return Ok(None);
                };
                if target.is_nullish() {
                    if *optional {
                        return Ok(None);
                    }
                    return Err(EvalError::new(format!(
                        "cannot read `{property}` of {} (`{}`)",
                        target.to_js_string(),
                        describe(object)
                    )));
                }
                Ok(Some(builtins::get_property(&target, property)))
            }
            ExprKind::Index {
                object,
                index,
                optional,
            } => {
                let Some(target) = self.eval_link(object, scope, module)? else {
                    return Ok(None);
                };
                if target.is_nullish() {
                    if *optional {
                        return Ok(None);
                    }
                    return Err(EvalError::new(format!(
                        "cannot index {} (`{}`)",
                        target.to_js_string(),
                        describe(object)
                    )));
                }
                let key = self.eval(index, scope, module)?;
                Ok(Some(builtins::get_index(&target, &key)))
            }
            ExprKind::Call {
                callee,
                args,
                optional,
            } => {
                let Some(func) = self.eval_link(callee, scope, module)? else {
                    return Ok(None);
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let Value::Function(func) = func else {
                    return Err(EvalError::new(format!(
                        "`{}` is not a function",
                        describe(callee)
                    )));
                };
                let args = self.eval_spreadable(args, scope, module)?;
                self.call_function(&func, args).map(Some)
            }
            _ => self.eval(expr, scope, module).map(Some),
        }
    }

    fn eval_link(
        &self,
        expr: &Expr,
        scope: &Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Option<Value>> {
        match expr.kind {
            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Call { .. } => self
                .eval_chain(expr, scope, module)
                .map_err(|e| e.locate(module, expr.pos)),
            _ => self.eval(expr, scope, module).map(Some),
        }
    }

    fn eval_spreadable(
        &self,
        items: &[Spreadable],
        scope: &Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Spreadable::Item(expr) => out.push(self.eval(expr, scope, module)?),
                Spreadable::Spread(expr) => {
                    let value = self.eval(expr, scope, module)?;
                    out.extend(builtins::iterate(&value).map_err(|e| e.locate(module, expr.pos))?);
                    check_length(out.len(), "array").map_err(|e| e.locate(module, expr.pos))?;
                }
            }
        }
        Ok(out)
    }

    fn eval_object(
        &self,
        props: &[ObjectProp],
        scope: &Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Value> {
        let mut object = Object::default();
        for prop in props {
            match prop {
                ObjectProp::KeyValue(key, expr) => {
                    object.insert(key.clone(), self.eval(expr, scope, module)?);
                }
                ObjectProp::Computed(key, expr) => {
                    let key = self.eval(key, scope, module)?.to_js_string();
                    object.insert(key, self.eval(expr, scope, module)?);
                }
                ObjectProp::Spread(expr) => {
                    builtins::spread_into(&mut object, &self.eval(expr, scope, module)?);
                }
            }
        }
        Ok(object.into())
    }

    // ------------------------------------------------------------------------
    // JSX
    // ------------------------------------------------------------------------

    pub fn eval_jsx(
        &self,
        element: &JsxElement,
        scope: &Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Node> {
        self.eval_jsx_inner(element, scope, module)
            .map_err(|e| e.locate(module, element.pos))
    }

    fn eval_jsx_inner(
        &self,
        element: &JsxElement,
        scope: &Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Node> {
        match &element.name {
            JsxName::Fragment => Ok(Node::Fragment(
                self.eval_children(&element.children, scope, module)?,
            )),
            JsxName::Intrinsic(tag) => {
                let mut el = Element::new(tag.clone());
                for attr in &element.attrs {
                    match attr {
                        JsxAttr::Named(name, value) => {
                            let value = match value {
                                Some(expr) => self.eval(expr, scope, module)?,
                                None => Value::Bool(true),
                            };
                            set_attribute(&mut el, name, &value)?;
                        }
                        JsxAttr::Spread(expr) => {
                            if let Value::Object(object) = self.eval(expr, scope, module)? {
                                for (name, value) in object.iter() {
                                    set_attribute(&mut el, name, value)?;
                                }
                            }
                        }
                    }
                }
                // dangerouslySetInnerHTML wins over JSX children
                if el.children.is_empty() {
                    el.children = self.eval_children(&element.children, scope, module)?;
                }
                Ok(Node::Element(el))
            }
            JsxName::Component(callee) => {
                let component = self.eval(callee, scope, module)?;
                let mut props = Object::default();
                for attr in &element.attrs {
                    match attr {
                        JsxAttr::Named(name, value) => {
                            let value = match value {
                                Some(expr) => self.eval(expr, scope, module)?,
                                None => Value::Bool(true),
                            };
                            props.insert(name.clone(), value);
                        }
                        JsxAttr::Spread(expr) => {
                            builtins::spread_into(&mut props, &self.eval(expr, scope, module)?);
                        }
                    }
                }

                if !element.children.is_empty() {
                    let mut children = Vec::with_capacity(element.children.len());
                    for child in &element.children {
                        children.push(match child {
                            JsxChild::Text(text) => Value::from(text.as_str()),
                            JsxChild::Html(html) => Value::from(Node::raw(html.as_str())),
                            JsxChild::Expr(expr) => self.eval(expr, scope, module)?,
                            JsxChild::Element(el) => Value::from(self.eval_jsx(el, scope, module)?),
                        });
                    }
                    let children = if children.len() == 1 {
                        children.pop().unwrap_or_default()
                    } else {
                        Value::from(children)
                    };
                    props.insert("children", children);
                }

                let Value::Function(func) = &component else {
                    return Err(EvalError::new(format!(
                        "`{}` is not a component (found {})",
                        describe(callee),
                        component.type_of()
                    )));
                };
                let rendered = self.call_function(func, vec![props.into()])?;
                value_to_node(rendered)
            }
        }
    }

    fn eval_children(
        &self,
        children: &[JsxChild],
        scope: &Scope,
        module: &Arc<Module>,
    ) -> EvalResult<Vec<Node>> {
        children
            .iter()
            .map(|child| match child {
                JsxChild::Text(text) => Ok(Node::text(text.as_str())),
                JsxChild::Html(html) => Ok(Node::raw(html.as_str())),
                JsxChild::Expr(expr) => value_to_node(self.eval(expr, scope, module)?)
                    .map_err(|e| e.locate(module, expr.pos)),
                JsxChild::Element(el) => self.eval_jsx(el, scope, module),
            })
            .collect()
    }
}

/// Convert a component's return value (or a JSX child) into a node.
pub fn value_to_node(value: Value) -> EvalResult<Node> {
    Ok(match value {
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Function(_) => Node::Empty,
        Value::Number(n) => Node::Text(format_number(n)),
        Value::Str(s) => Node::Text(s.to_string()),
        Value::Date(date) => Node::Text(date.to_string()),
        Value::Node(node) => match Arc::try_unwrap(node) {
            Ok(node) => node,
            Err(shared) => Node::Shared(shared),
        },
        Value::Array(items) => Node::Fragment(
            items
                .iter()
                .cloned()
                .map(value_to_node)
                .collect::<EvalResult<_>>()?,
        ),
        Value::Object(_) => {
            return Err(EvalError::new(
                "objects are not valid as a JSX child; render one of its fields instead",
            ));
        }
    })
}

/// JSX prop names that differ from their HTML attribute.
const ATTRIBUTE_NAMES: &[(&str, &str)] = &[
    ("className", "class"),
    ("htmlFor", "for"),
    ("charSet", "charset"),
    ("httpEquiv", "http-equiv"),
    ("acceptCharset", "accept-charset"),
    ("tabIndex", "tabindex"),
    ("readOnly", "readonly"),
    ("maxLength", "maxlength"),
    ("minLength", "minlength"),
    ("crossOrigin", "crossorigin"),
    ("autoComplete", "autocomplete"),
    ("autoFocus", "autofocus"),
    ("colSpan", "colspan"),
    ("rowSpan", "rowspan"),
    ("srcSet", "srcset"),
    ("dateTime", "datetime"),
    ("noValidate", "novalidate"),
    ("contentEditable", "contenteditable"),
    ("spellCheck", "spellcheck"),
    ("referrerPolicy", "referrerpolicy"),
    ("strokeWidth", "stroke-width"),
    ("strokeLinecap", "stroke-linecap"),
    ("strokeLinejoin", "stroke-linejoin"),
    ("fillRule", "fill-rule"),
    ("clipRule", "clip-rule"),
    ("xlinkHref", "xlink:href"),
];

/// CSS properties whose numeric values take no `px` suffix.
const UNITLESS: &[&str] = &[
    "opacity", "zIndex", "fontWeight", "lineHeight", "flex", "flexGrow", "flexShrink", "order",
    "zoom", "gridRow", "gridColumn", "tabSize", "orphans", "widows", "columnCount",
];

fn attribute_name(name: &str) -> &str {
    ATTRIBUTE_NAMES
        .iter()
        .find(|(jsx, _)| *jsx == name)
        .map_or(name, |(_, html)| html)
}

fn set_attribute(el: &mut Element, name: &str, value: &Value) -> EvalResult<()> {
    match name {
        "key" | "ref" | "children" => return Ok(()),
        "dangerouslySetInnerHTML" => {
            if let Value::Object(object) = value {
                if let Some(html) = object.get("__html") {
                    el.children = vec![Node::raw(html.to_js_string())];
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let name = attribute_name(name);
    let stringly = name.starts_with("data-") || name.starts_with("aria-");
    let value = match value {
        // event handlers and absent values are not rendered
        Value::Undefined | Value::Null | Value::Function(_) => return Ok(()),
        Value::Bool(b) if stringly => AttrValue::Text(b.to_string()),
        Value::Bool(true) => AttrValue::Flag,
        Value::Bool(false) => return Ok(()),
        Value::Object(style) if name == "style" => AttrValue::Text(style_string(style)),
        Value::Object(_) | Value::Node(_) => {
            return Err(EvalError::new(format!(
                "attribute `{name}` cannot take an object value"
            )));
        }
        other => AttrValue::Text(other.to_js_string()),
    };
    el.attrs.push((name.into(), value));
    Ok(())
}

/// `{ fontSize: 12, color: 'red' }` → `font-size:12px;color:red`
fn style_string(style: &Object) -> String {
    style
        .iter()
        .filter(|(_, v)| !v.is_nullish() && !matches!(v, Value::Bool(_)))
        .map(|(key, value)| {
            let value = match value {
                Value::Number(n) if *n != 0.0 && !UNITLESS.contains(&key.as_str()) => {
                    format!("{}px", format_number(*n))
                }
                other => other.to_js_string(),
            };
            format!("{}:{value}", css_property(key))
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn css_property(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_owned();
    }
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let numeric = |v: &Value| {
        matches!(
            v,
            Value::Number(_) | Value::Bool(_) | Value::Null | Value::Undefined
        )
    };
    let compare = || match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Ok(match op {
        BinaryOp::Add if numeric(left) && numeric(right) => {
            Value::Number(left.to_number() + right.to_number())
        }
        BinaryOp::Add => {
            let (a, b) = (left.to_js_string(), right.to_js_string());
            check_length(a.len() + b.len(), "string")?;
            Value::from(a + &b)
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(compare() == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare() == Some(Ordering::Greater)),
        BinaryOp::Le => Value::Bool(matches!(compare(), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
    })
}

/// Short source-like description of an expression for diagnostics.
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.to_string(),
        ExprKind::Member {
            object,
            property,
            optional,
        } => {
            let dot = if *optional { "?." } else { "." };
            format!("{}{dot}{property}", describe(object))
        }
        ExprKind::Index { object, .. } => format!("{}[…]", describe(object)),
        ExprKind::Call { callee, .. } => format!("{}(…)", describe(callee)),
        _ => "expression".to_owned(),
    }
}
