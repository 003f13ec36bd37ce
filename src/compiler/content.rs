//! Post compiler: Markdown with a metadata header and embedded components.
//!
//! ```text
//! ---                              frontmatter ──► Frontmatter
//! title: Hello
//! ---
//! import Note from '../Note'       imports ─────► Module
//!
//! Some *prose*.                    markdown ────► HTML with placeholders
//!
//! <Note kind="tip">Hi</Note>       components ──► JsxElement[]
//! ```
//!
//! Components are cut out of the Markdown before it is rendered and replaced
//! by `<!--sprig:N-->` placeholders, which pass through the Markdown renderer
//! as raw HTML. At render time each placeholder is replaced by its component's
//! output. Capitalised tags inside fenced code blocks and inline code spans
//! are left alone.

use super::component::CompiledComponent;
use super::error::CompileError;
use super::frontmatter::{DEFAULT_EXTRACTORS, Frontmatter, extract};
use crate::tsx::{Interp, JsxElement, Module, ModuleLoader, Scope, Value, parse_jsx_at};
use crate::vdom::{Node, render_to_string};
use pulldown_cmark::{Options, Parser, html};
use std::path::Path;
use std::sync::Arc;

const PLACEHOLDER: &str = "<!--sprig:";
const PLACEHOLDER_END: &str = "-->";

/// Rendered Markdown plus the components it embeds.
#[derive(Debug)]
pub struct ContentBody {
    html: String,
    elements: Vec<JsxElement>,
}

/// Compile one post.
///
/// `path` anchors relative imports and need not exist. `name` labels
/// diagnostics.
pub fn compile(
    loader: &ModuleLoader,
    path: &Path,
    name: &str,
    source: Arc<str>,
) -> Result<(CompiledComponent, Frontmatter), CompileError> {
    let header = extract(&source, DEFAULT_EXTRACTORS).map_err(|message| {
        CompileError::Frontmatter {
            unit: name.to_owned(),
            message,
        }
    })?;

    let imports_end = import_block(&source, header.body_start);
    let module_source = keep_only(&source, header.body_start..imports_end);
    let module = loader
        .load_source(path, name, module_source.into())
        .map_err(|e| CompileError::from_tsx(name, e))?;

    let (markdown, elements) = cut_components(&source, imports_end, name)?;
    let body = ContentBody {
        html: render_markdown(&markdown),
        elements,
    };

    Ok((
        CompiledComponent::content(name.to_owned(), module, body),
        header.frontmatter,
    ))
}

impl ContentBody {
    /// Substitute every placeholder with its rendered component. `props` and
    /// each of its fields are in scope.
    pub(super) fn render(
        &self,
        interp: &Interp,
        module: &Arc<Module>,
        props: Value,
        unit: &str,
    ) -> Result<Node, CompileError> {
        let mut scope = Scope::default();
        if let Value::Object(object) = &props {
            for (key, value) in object.iter() {
                scope = scope.bind(key.clone(), value.clone());
            }
        }
        let scope = scope.bind("props", props);

        let mut out = String::with_capacity(self.html.len());
        let mut rest = self.html.as_str();
        while let Some(start) = rest.find(PLACEHOLDER) {
            out.push_str(&rest[..start]);
            let after = &rest[start + PLACEHOLDER.len()..];
            let Some(end) = after.find(PLACEHOLDER_END) else {
                rest = &rest[start..];
                break;
            };

            let element = after[..end]
                .parse::<usize>()
                .ok()
                .and_then(|index| self.elements.get(index));
            match element {
                Some(element) => {
                    let node = interp
                        .eval_jsx(element, &scope, module)
                        .map_err(|e| CompileError::from((unit, e)))?;
                    out.push_str(&render_to_string(&node));
                }
                None => out.push_str(&rest[start..start + PLACEHOLDER.len() + end + 3]),
            }
            rest = &after[end + PLACEHOLDER_END.len()..];
        }
        out.push_str(rest);

        Ok(Node::Raw(out))
    }
}

// ============================================================================
// Source splitting
// ============================================================================

/// End offset of the `import` statements at the top of the body.
fn import_block(source: &str, start: usize) -> usize {
    let mut pos = start;
    let mut end = start;
    let mut open = false;

    while pos < source.len() {
        let line_end = next_line(source, pos);
        let line = source[pos..line_end].trim();

        if open || is_import(line) {
            open = !ends_statement(line);
            end = line_end;
        } else if !line.is_empty() {
            break;
        }
        pos = line_end;
    }
    end
}

fn is_import(line: &str) -> bool {
    line.strip_prefix("import")
        .is_some_and(|rest| rest.starts_with([' ', '{', '\'', '"', '*']))
}

/// An import statement ends with its module specifier.
fn ends_statement(line: &str) -> bool {
    let line = line.trim_end_matches(';').trim_end();
    line.ends_with('\'') || line.ends_with('"')
}

/// Blank everything outside `keep`, preserving byte offsets and newlines, so
/// the module's diagnostics point into the original file.
fn keep_only(source: &str, keep: std::ops::Range<usize>) -> String {
    let mut out = String::with_capacity(source.len());
    for (i, c) in source.char_indices() {
        if c == '\n' || keep.contains(&i) {
            out.push(c);
        } else {
            out.extend(std::iter::repeat_n(' ', c.len_utf8()));
        }
    }
    out
}

/// Replace component invocations after `start` with placeholders.
fn cut_components(
    source: &str,
    start: usize,
    unit: &str,
) -> Result<(String, Vec<JsxElement>), CompileError> {
    let mut markdown = String::with_capacity(source.len() - start);
    let mut elements = Vec::new();
    let mut fence: Option<Fence> = None;
    let mut pos = start;

    while pos < source.len() {
        let line_end = next_line(source, pos);
        let line = &source[pos..line_end];

        if let Some(marker) = Fence::parse(line) {
            match fence {
                None => fence = Some(marker),
                Some(open) if open.closes_with(&marker) => fence = None,
                Some(_) => {}
            }
            markdown.push_str(line);
            pos = line_end;
        } else if fence.is_some() {
            markdown.push_str(line);
            pos = line_end;
        } else {
            pos = cut_line(source, pos, line_end, unit, &mut markdown, &mut elements)?;
        }
    }

    Ok((markdown, elements))
}

/// Scan one line. Returns where scanning continues, which is past the line
/// end when a component spans several lines.
fn cut_line(
    source: &str,
    mut pos: usize,
    line_end: usize,
    unit: &str,
    markdown: &mut String,
    elements: &mut Vec<JsxElement>,
) -> Result<usize, CompileError> {
    let bytes = source.as_bytes();
    // length of the backtick run that opened the current code span
    let mut code_span = 0;

    while pos < line_end {
        match bytes[pos] {
            b'`' => {
                let run = bytes[pos..line_end].iter().take_while(|&&b| b == b'`').count();
                if code_span == 0 {
                    code_span = run;
                } else if run == code_span {
                    code_span = 0;
                }
                markdown.push_str(&source[pos..pos + run]);
                pos += run;
            }
            b'<' if code_span == 0
                && bytes.get(pos + 1).is_some_and(u8::is_ascii_uppercase) =>
            {
                let (element, end) =
                    parse_jsx_at(source, pos, &render_child_markdown).map_err(|error| CompileError::Syntax {
                        unit: unit.to_owned(),
                        line: error.line,
                        column: error.column,
                        message: error.message,
                    })?;
                markdown.push_str(&format!("{PLACEHOLDER}{}{PLACEHOLDER_END}", elements.len()));
                elements.push(element);
                if end >= line_end {
                    return Ok(end);
                }
                pos = end;
            }
            _ => {
                let len = source[pos..].chars().next().map_or(1, char::len_utf8);
                markdown.push_str(&source[pos..pos + len]);
                pos += len;
            }
        }
    }
    Ok(line_end)
}

fn next_line(source: &str, pos: usize) -> usize {
    source[pos..].find('\n').map_or(source.len(), |i| pos + i + 1)
}

/// A fenced code block delimiter: ```` ``` ```` or `~~~`.
#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: u8,
    len: usize,
    /// No info string follows; only such a line can close a block.
    bare: bool,
}

impl Fence {
    fn parse(line: &str) -> Option<Self> {
        let indent = line.len() - line.trim_start_matches(' ').len();
        if indent > 3 {
            return None;
        }
        let line = &line[indent..];
        let marker = *line.as_bytes().first()?;
        if marker != b'`' && marker != b'~' {
            return None;
        }
        let len = line.bytes().take_while(|&b| b == marker).count();
        (len >= 3).then(|| Self {
            marker,
            len,
            bare: line[len..].trim().is_empty(),
        })
    }

    fn closes_with(&self, other: &Self) -> bool {
        other.bare && other.marker == self.marker && other.len >= self.len
    }
}

// ============================================================================
// Markdown
// ============================================================================

fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

/// Markdown between component tags. Text that stays on one line renders
/// inline, keeping its surrounding spaces; text spanning lines renders as
/// blocks after removing its common indentation.
fn render_child_markdown(raw: &str) -> String {
    if raw.contains('\n') {
        return render_markdown(&dedent(raw));
    }
    let html = render_markdown(raw.trim());
    let html = html.trim_end();
    let inner = html
        .strip_prefix("<p>")
        .and_then(|h| h.strip_suffix("</p>"))
        .filter(|h| !h.contains("<p>"))
        .unwrap_or(html);

    let mut out = String::with_capacity(inner.len() + 2);
    if raw.starts_with([' ', '\t']) {
        out.push(' ');
    }
    out.push_str(inner);
    if raw.ends_with([' ', '\t']) {
        out.push(' ');
    }
    out
}

fn dedent(raw: &str) -> String {
    let indent = raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    raw.lines()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::component::PostProps;
    use std::fs;
    use tempfile::tempdir;

    fn compile_post(root: &Path, source: &str) -> Result<(CompiledComponent, Frontmatter), CompileError> {
        let loader = ModuleLoader::new(root.join("src"), &["tsx".to_owned()]);
        compile(
            &loader,
            &root.join("src/posts/hello.mdx"),
            "src/posts/hello.mdx",
            source.into(),
        )
    }

    fn render(component: &CompiledComponent, frontmatter: Frontmatter) -> String {
        let node = component
            .render(PostProps {
                slug: "hello".into(),
                frontmatter,
            })
            .unwrap();
        render_to_string(&node)
    }

    #[test]
    fn test_markdown_with_frontmatter() {
        let dir = tempdir().unwrap();
        let source = "---\ntitle: Hello\ndate: 2024-01-02\n---\n# Heading\n\nSome *prose* and ~~old~~.\n";
        let (component, frontmatter) = compile_post(dir.path(), source).unwrap();

        assert_eq!(frontmatter.title(), Some("Hello"));
        assert_eq!(frontmatter.date(), Some("2024-01-02"));
        let html = render(&component, frontmatter);
        assert!(html.contains("<h1>Heading</h1>"));
        assert!(html.contains("<em>prose</em>"));
        assert!(html.contains("<del>old</del>"));
        assert!(!html.contains("title:"));
    }

    #[test]
    fn test_tables() {
        let dir = tempdir().unwrap();
        let (component, fm) = compile_post(dir.path(), "| a | b |\n|---|---|\n| 1 | 2 |\n").unwrap();
        let html = render(&component, fm);
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_imported_component() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/posts")).unwrap();
        fs::write(
            dir.path().join("src/Note.tsx"),
            "export default function Note({ kind, children }) {\n  return <aside class={`note ${kind}`}>{children}</aside>\n}\n",
        )
        .unwrap();

        let source = "---\ntitle: Hello\n---\nimport Note from '../Note'\n\nIntro.\n\n<Note kind=\"tip\">Read {frontmatter.title}</Note>\n\nOutro.\n";
        let (component, fm) = compile_post(dir.path(), source).unwrap();
        let html = render(&component, fm);

        assert!(html.contains(r#"<aside class="note tip">Read Hello</aside>"#));
        assert!(html.contains("<p>Intro.</p>"));
        assert!(html.contains("<p>Outro.</p>"));
        assert!(!html.contains("import"));
    }

    #[test]
    fn test_component_children_are_markdown() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("src/Note.tsx"),
            "export default ({ children }) => <aside>{children}</aside>\n",
        )
        .unwrap();

        let source = "import Note from '../Note'\n\n<Note>\n  Some *emphasis* here.\n\n  - one\n  - two\n</Note>\n\n<Note>Inline **bold** for {slug}</Note>\n";
        let (component, fm) = compile_post(dir.path(), source).unwrap();
        let html = render(&component, fm);

        assert!(html.contains("<p>Some <em>emphasis</em> here.</p>"), "{html}");
        assert!(html.contains("<li>one</li>"), "{html}");
        assert!(html.contains("<aside>Inline <strong>bold</strong> for hello</aside>"), "{html}");
    }

    #[test]
    fn test_render_child_markdown() {
        assert_eq!(render_child_markdown("Read "), "Read ");
        assert_eq!(render_child_markdown(" a & *b*"), " a &amp; <em>b</em>");
        assert_eq!(render_child_markdown("\n    # Title\n    text\n"), "<h1>Title</h1>\n<p>text</p>\n");
        assert_eq!(dedent("  a\n\n    b"), "a\n\n  b");
    }

    #[test]
    fn test_inline_component_uses_slug() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("src/Slug.tsx"),
            "export const Slug = ({ value }) => <code>{value}</code>\n",
        )
        .unwrap();

        let source = "import { Slug } from '../Slug'\n\nThis post is <Slug value={slug} />.\n";
        let (component, fm) = compile_post(dir.path(), source).unwrap();
        let html = render(&component, fm);
        assert!(html.contains("<p>This post is <code>hello</code>.</p>"));
    }

    #[test]
    fn test_code_is_not_scanned() {
        let dir = tempdir().unwrap();
        let source = "Use `<Button />` like so:\n\n```tsx\n<Button label=\"x\" />\n```\n";
        let (component, fm) = compile_post(dir.path(), source).unwrap();
        let html = render(&component, fm);
        assert!(html.contains("<code>&lt;Button /&gt;</code>"));
        assert!(html.contains("&lt;Button label=&quot;x&quot; /&gt;"));
    }

    #[test]
    fn test_lowercase_html_passes_through() {
        let dir = tempdir().unwrap();
        let (component, fm) = compile_post(dir.path(), "<div class=\"raw\">kept</div>\n").unwrap();
        assert!(render(&component, fm).contains(r#"<div class="raw">kept</div>"#));
    }

    #[test]
    fn test_component_syntax_error_has_file_position() {
        let dir = tempdir().unwrap();
        let source = "---\ntitle: x\n---\n\ntext\n\n<Broken a={ />\n";
        let err = compile_post(dir.path(), source).unwrap_err();
        let CompileError::Syntax { unit, line, .. } = err else {
            panic!("expected syntax error, got {err}");
        };
        assert_eq!(unit, "src/posts/hello.mdx");
        assert_eq!(line, 7);
    }

    #[test]
    fn test_undefined_component_is_located() {
        let dir = tempdir().unwrap();
        let source = "---\ntitle: x\n---\n\n<Missing />\n";
        let (component, frontmatter) = compile_post(dir.path(), source).unwrap();
        let err = component
            .render(PostProps {
                slug: "hello".into(),
                frontmatter,
            })
            .unwrap_err();
        assert!(err.to_string().starts_with("src/posts/hello.mdx:5:"), "{err}");
    }

    #[test]
    fn test_missing_import_is_module_error() {
        let dir = tempdir().unwrap();
        let err = compile_post(dir.path(), "import X from './nope'\n\n<X />\n").unwrap_err();
        assert!(matches!(err, CompileError::Module { .. }), "{err}");
        assert!(err.to_string().contains("src/posts/hello.mdx:1:"));
    }

    #[test]
    fn test_bad_frontmatter() {
        let dir = tempdir().unwrap();
        let err = compile_post(dir.path(), "---\n[not, a, mapping]\n---\n").unwrap_err();
        assert!(matches!(err, CompileError::Frontmatter { .. }));
    }

    #[test]
    fn test_import_block_and_keep_only() {
        let source = "import A from './a'\nimport {\n  B,\n} from './b';\n\nBody import x\n";
        let end = import_block(source, 0);
        assert_eq!(&source[end..], "\nBody import x\n");

        let kept = keep_only("ab\ncé\nd", 3..4);
        assert_eq!(kept.len(), "ab\ncé\nd".len());
        assert_eq!(kept, "  \nc  \n ");
    }

    #[test]
    fn test_fences() {
        let open = Fence::parse("```rust\n").unwrap();
        assert!(!open.bare);
        assert!(open.closes_with(&Fence::parse("````\n").unwrap()));
        assert!(!open.closes_with(&Fence::parse("~~~\n").unwrap()));
        assert!(Fence::parse("    ```\n").is_none());
        assert!(Fence::parse("``\n").is_none());
    }
}
