//! Page and layout compiler.

use super::component::CompiledComponent;
use super::error::CompileError;
use crate::tsx::{ModuleLoader, Value};
use std::path::Path;
use std::sync::Arc;

/// Compile one template into its default export.
///
/// `path` anchors relative imports; `name` labels diagnostics.
pub fn compile(
    loader: &ModuleLoader,
    path: &Path,
    name: &str,
    source: Arc<str>,
) -> Result<CompiledComponent, CompileError> {
    let module = loader
        .load_source(path, name, source)
        .map_err(|e| CompileError::from_tsx(name, e))?;

    match module.default_export() {
        Some(render @ Value::Function(_)) => {
            Ok(CompiledComponent::function(name.to_owned(), module, render))
        }
        Some(other) => Err(CompileError::evaluate(
            name,
            format!("default export is {}, not a component", other.type_of()),
            false,
        )),
        None => Err(CompileError::evaluate(name, "missing default export", false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::component::{PageProps, PostIndex};
    use crate::compiler::frontmatter::{DEFAULT_EXTRACTORS, extract};
    use crate::vdom::render_to_string;
    use tempfile::tempdir;

    fn compile_page(source: &str) -> Result<CompiledComponent, CompileError> {
        let dir = tempdir().unwrap();
        let loader = ModuleLoader::new(dir.path(), &["tsx".to_owned()]);
        compile(&loader, &dir.path().join("index.tsx"), "src/index.tsx", source.into())
    }

    #[test]
    fn test_compile_and_render_page() {
        let page = compile_page(
            "export default function Index({ posts }) {\n  return <main>{Object.keys(posts).length} posts</main>\n}\n",
        )
        .unwrap();

        let mut index = PostIndex::default();
        let fm = extract("---\ntitle: A\n---\n", DEFAULT_EXTRACTORS).unwrap().frontmatter;
        index.insert("a", "src/posts/a.md", fm).unwrap();

        let node = page.render(PageProps { posts: &index }).unwrap();
        assert_eq!(render_to_string(&node), "<main>1 posts</main>");
        assert_eq!(page.name(), "src/index.tsx");
    }

    #[test]
    fn test_sorted_post_listing() {
        let page = compile_page(
            r#"import dayjs from 'dayjs'

interface Frontmatter {
  title: string
  date: string
}

function Post({ src, slug }: { src: Frontmatter; slug: string }) {
  return <a href={`/posts/${slug}`}>{src.title}</a>
}

export default function Index(params: { posts: Record<string, Frontmatter> }) {
  const sorted = Object.entries(params.posts)
    .map(([index, frontmatter]) => ({ index, frontmatter }))
    .sort((a, b) => dayjs(b.frontmatter.date).diff(dayjs(a.frontmatter.date)))
  return <ul>{sorted.map((fm) => <li><Post src={fm.frontmatter} slug={fm.index} /></li>)}</ul>
}
"#,
        )
        .unwrap();

        let mut index = PostIndex::default();
        for (slug, date) in [("old", "2022-01-01"), ("new", "2024-06-01"), ("mid", "2023-03-15")] {
            let header = format!("---\ntitle: {slug}\ndate: {date}\n---\n");
            let fm = extract(&header, DEFAULT_EXTRACTORS).unwrap().frontmatter;
            index.insert(slug, slug, fm).unwrap();
        }

        let html = render_to_string(&page.render(PageProps { posts: &index }).unwrap());
        assert_eq!(
            html,
            r#"<ul><li><a href="/posts/new">new</a></li><li><a href="/posts/mid">mid</a></li><li><a href="/posts/old">old</a></li></ul>"#
        );
    }

    #[test]
    fn test_missing_default_export() {
        let err = compile_page("export const x = 1\n").unwrap_err();
        assert_eq!(err.to_string(), "src/index.tsx: missing default export");

        let err = compile_page("export default 42\n").unwrap_err();
        assert!(err.to_string().contains("not a component"));
    }

    #[test]
    fn test_syntax_error_names_unit() {
        let err = compile_page("export default function () {\n  return <div>\n}\n").unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
        assert!(err.to_string().starts_with("src/index.tsx:"));
    }

    #[test]
    fn test_runtime_error_is_located() {
        let page = compile_page("export default function () {\n  return <p>{missing.field}</p>\n}\n").unwrap();
        let index = PostIndex::default();
        let err = page.render(PageProps { posts: &index }).unwrap_err();
        assert!(err.to_string().starts_with("src/index.tsx:2:"), "{err}");
    }
}
