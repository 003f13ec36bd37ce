//! Module instantiation and import resolution.
//!
//! A [`ModuleLoader`] lives for one build pass. It parses each file once,
//! instantiates its top-level bindings and links imports between files.
//! Imports are limited to relative paths inside the source root plus a few
//! built-in modules, so a template cannot reach anything the build did not
//! hand it.

use super::TsxError;
use super::ast::{Export, ImportDecl, Item, Name, Program};
use super::builtins;
use super::interp::Interp;
use super::parser::{line_col, parse_module};
use super::value::{Object, Scope, Value};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// An instantiated module: its top-level bindings and exports.
#[derive(Debug)]
pub struct Module {
    name: String,
    path: PathBuf,
    source: Arc<str>,
    bindings: RwLock<FxHashMap<Name, Value>>,
    exports: RwLock<Vec<(Name, Value)>>,
    default: RwLock<Option<Value>>,
}

impl Module {
    fn new(name: String, path: PathBuf, source: Arc<str>) -> Self {
        Self {
            name,
            path,
            source,
            bindings: RwLock::default(),
            exports: RwLock::default(),
            default: RwLock::default(),
        }
    }

    /// Display name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Top-level binding visible inside the module.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.bindings.read().get(name).cloned()
    }

    pub fn default_export(&self) -> Option<Value> {
        self.default.read().clone()
    }

    pub fn named_export(&self, name: &str) -> Option<Value> {
        self.exports
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn bind(&self, name: Name, value: Value) {
        self.bindings.write().insert(name, value);
    }

    fn export(&self, name: Name, value: Value) {
        let mut exports = self.exports.write();
        match exports.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => exports.push((name, value)),
        }
    }

    fn set_default(&self, value: Value) {
        *self.default.write() = Some(value);
    }

    fn namespace(&self) -> Value {
        let mut object: Object = self.exports.read().iter().cloned().collect();
        if let Some(default) = self.default_export() {
            object.insert("default", default);
        }
        object.into()
    }
}

/// What an import declaration resolved to.
enum Resolved {
    File(Arc<Module>),
    Builtin {
        default: Option<Value>,
        named: Vec<(Name, Value)>,
    },
}

impl Resolved {
    fn default(&self) -> Option<Value> {
        match self {
            Self::File(module) => module.default_export(),
            Self::Builtin { default, .. } => default.clone(),
        }
    }

    fn named(&self, name: &str) -> Option<Value> {
        match self {
            Self::File(module) => module.named_export(name),
            Self::Builtin { named, .. } => named
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
        }
    }

    fn namespace(&self) -> Value {
        match self {
            Self::File(module) => module.namespace(),
            Self::Builtin { default, named } => {
                let mut object: Object = named.iter().cloned().collect();
                if let Some(default) = default {
                    object.insert("default", default.clone());
                }
                object.into()
            }
        }
    }
}

pub struct ModuleLoader {
    root: PathBuf,
    extensions: Vec<String>,
    cache: Mutex<FxHashMap<PathBuf, Arc<Module>>>,
}

impl ModuleLoader {
    /// `root` bounds import resolution; `extensions` are tried in order for
    /// extensionless specifiers.
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root: normalize(&root.into()),
            extensions: extensions.to_vec(),
            cache: Mutex::default(),
        }
    }

    /// Name a file for diagnostics: relative to the directory holding the root.
    pub fn display_name(&self, path: &Path) -> String {
        let base = self.root.parent().unwrap_or(&self.root);
        normalize(path)
            .strip_prefix(base)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Load, instantiate and cache the module at `path`.
    #[cfg(test)]
    pub fn load(&self, path: &Path) -> Result<Arc<Module>, TsxError> {
        self.load_file(&normalize(path), &mut Vec::new())
    }

    /// Instantiate a module from in-memory source. Its imports resolve
    /// relative to `path`, which does not need to exist.
    pub fn load_source(
        &self,
        path: &Path,
        name: &str,
        source: Arc<str>,
    ) -> Result<Arc<Module>, TsxError> {
        let path = normalize(path);
        let program = parse_module(&source).map_err(|error| TsxError::Syntax {
            file: name.to_owned(),
            error,
        })?;
        let mut stack = vec![path.clone()];
        self.instantiate(Module::new(name.to_owned(), path, source), &program, &mut stack)
    }

    fn load_file(&self, path: &Path, stack: &mut Vec<PathBuf>) -> Result<Arc<Module>, TsxError> {
        if let Some(module) = self.cache.lock().get(path) {
            return Ok(module.clone());
        }

        let name = self.display_name(path);
        let source: Arc<str> = fs::read_to_string(path)
            .map_err(|e| TsxError::Module(format!("{name}: {e}")))?
            .into();
        let program = parse_module(&source).map_err(|error| TsxError::Syntax {
            file: name.clone(),
            error,
        })?;

        stack.push(path.to_path_buf());
        let module = self.instantiate(Module::new(name, path.to_path_buf(), source), &program, stack);
        stack.pop();
        let module = module?;

        // another thread may have loaded the same file meanwhile; keep the first
        Ok(self
            .cache
            .lock()
            .entry(path.to_path_buf())
            .or_insert(module)
            .clone())
    }

    /// Link imports, then evaluate top-level items in source order.
    /// Function declarations are hoisted.
    fn instantiate(
        &self,
        module: Module,
        program: &Program,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Arc<Module>, TsxError> {
        let module = Arc::new(module);
        let interp = Interp::new();

        for item in &program.items {
            if let Item::Import(import) = item {
                self.link(&module, import, stack)?;
            }
        }

        for item in &program.items {
            if let Item::Function { decl, export } = item {
                let value = interp.closure(decl, &Scope::default(), &module);
                if let Some(name) = &decl.name {
                    module.bind(name.clone(), value.clone());
                    if *export == Export::Named {
                        module.export(name.clone(), value.clone());
                    }
                }
                if *export == Export::Default {
                    module.set_default(value);
                }
            }
        }

        for item in &program.items {
            match item {
                Item::Binding {
                    pattern,
                    init,
                    exported,
                } => {
                    let value = interp.eval(init, &Scope::default(), &module)?;
                    let scope = interp
                        .bind_pattern(pattern, value, Scope::default(), &module)
                        .map_err(|e| e.locate(&module, init.pos))?;
                    let mut names = Vec::new();
                    pattern.bound_names(&mut names);
                    for name in names {
                        let value = scope.lookup(&name).cloned().unwrap_or_default();
                        if *exported {
                            module.export(name.clone(), value.clone());
                        }
                        module.bind(name, value);
                    }
                }
                Item::ExportDefault(expr) => {
                    let value = interp.eval(expr, &Scope::default(), &module)?;
                    module.set_default(value);
                }
                Item::Expr(expr) => {
                    interp.eval(expr, &Scope::default(), &module)?;
                }
                Item::Import(_) | Item::Function { .. } => {}
            }
        }

        Ok(module)
    }

    fn link(
        &self,
        module: &Arc<Module>,
        import: &ImportDecl,
        stack: &mut Vec<PathBuf>,
    ) -> Result<(), TsxError> {
        let error = |message: String| {
            let (line, column) = line_col(module.source(), import.pos);
            TsxError::Module(format!("{}:{line}:{column}: {message}", module.name()))
        };
        let spec = import.source.as_str();

        let resolved = self.resolve(module, spec, stack).map_err(error)?;

        if let Some(local) = &import.default {
            let value = resolved
                .default()
                .ok_or_else(|| error(format!("`{spec}` has no default export")))?;
            module.bind(local.clone(), value);
        }
        for (imported, local) in &import.named {
            let value = if imported == "default" {
                resolved.default()
            } else {
                resolved.named(imported)
            };
            let value =
                value.ok_or_else(|| error(format!("`{spec}` does not export `{imported}`")))?;
            module.bind(local.clone(), value);
        }
        if let Some(local) = &import.namespace {
            module.bind(local.clone(), resolved.namespace());
        }
        Ok(())
    }

    fn resolve(
        &self,
        module: &Module,
        spec: &str,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Resolved, String> {
        match spec {
            "dayjs" => {
                return Ok(Resolved::Builtin {
                    default: Some(builtins::dayjs()),
                    named: Vec::new(),
                });
            }
            "react" | "preact" | "react/jsx-runtime" | "preact/jsx-runtime" => {
                let fragment = builtins::fragment();
                return Ok(Resolved::Builtin {
                    default: Some(Object::from_iter([("Fragment", fragment.clone())]).into()),
                    named: vec![("Fragment".into(), fragment)],
                });
            }
            _ if spec.starts_with("dayjs/plugin/") => {
                return Ok(Resolved::Builtin {
                    default: Some(builtins::noop()),
                    named: Vec::new(),
                });
            }
            // stylesheets are handled by the stylesheet stage
            _ if spec.ends_with(".css") => {
                return Ok(Resolved::Builtin {
                    default: Some(Object::default().into()),
                    named: Vec::new(),
                });
            }
            _ => {}
        }

        if !(spec.starts_with("./") || spec.starts_with("../")) {
            return Err(format!(
                "cannot import `{spec}`: only relative paths and the built-in modules \
                 (dayjs, react, preact) are available"
            ));
        }

        let dir = module.path.parent().unwrap_or(Path::new(""));
        let base = normalize(&dir.join(spec));
        if !base.starts_with(&self.root) {
            return Err(format!("`{spec}` resolves outside the source directory"));
        }
        let path = self
            .candidates(&base)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| format!("cannot find module `{spec}`"))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            return load_json(&path).map(|data| {
                let named = match &data {
                    Value::Object(object) => object
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    _ => Vec::new(),
                };
                Resolved::Builtin {
                    default: Some(data),
                    named,
                }
            });
        }

        if let Some(start) = stack.iter().position(|p| *p == path) {
            let cycle: Vec<String> = stack[start..]
                .iter()
                .chain(std::iter::once(&path))
                .map(|p| self.display_name(p))
                .collect();
            return Err(format!("import cycle: {}", cycle.join(" -> ")));
        }

        self.load_file(&path, stack)
            .map(Resolved::File)
            .map_err(|e| match e {
                // keep the innermost location; the importer is added by the caller
                TsxError::Module(message) => message,
                other => other.to_string(),
            })
    }

    fn candidates(&self, base: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![base.to_path_buf()];
        for ext in &self.extensions {
            let mut with_ext = base.as_os_str().to_owned();
            with_ext.push(".");
            with_ext.push(ext);
            candidates.push(PathBuf::from(with_ext));
        }
        for ext in &self.extensions {
            candidates.push(base.join(format!("index.{ext}")));
        }
        candidates
    }
}

fn load_json(path: &Path) -> Result<Value, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|json| Value::from_json(&json))
        .map_err(|e| format!("invalid JSON in {}: {e}", path.display()))
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
