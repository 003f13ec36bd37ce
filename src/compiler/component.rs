//! Compiled components and the typed props passed into them.

use super::content::ContentBody;
use super::error::CompileError;
use super::frontmatter::Frontmatter;
use crate::tsx::{Interp, Module, Object, Value, value_to_node};
use crate::vdom::Node;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A source unit compiled into something that renders props to a node tree.
///
/// Rendering is pure: each call gets a fresh interpreter, so one component
/// can render on several threads at once.
#[derive(Debug)]
pub struct CompiledComponent {
    name: String,
    module: Arc<Module>,
    body: Body,
}

#[derive(Debug)]
enum Body {
    /// A template's default export.
    Function(Value),
    /// A post body with embedded component invocations.
    Content(ContentBody),
}

impl CompiledComponent {
    pub(super) fn function(name: String, module: Arc<Module>, render: Value) -> Self {
        Self {
            name,
            module,
            body: Body::Function(render),
        }
    }

    pub(super) fn content(name: String, module: Arc<Module>, content: ContentBody) -> Self {
        Self {
            name,
            module,
            body: Body::Content(content),
        }
    }

    /// Name of the unit this component was compiled from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, props: impl Props) -> Result<Node, CompileError> {
        let interp = Interp::new();
        let props = props.into_value();
        match &self.body {
            Body::Function(render) => interp
                .call(render, vec![props])
                .and_then(value_to_node)
                .map_err(|e| CompileError::from((self.name.as_str(), e))),
            Body::Content(content) => content.render(&interp, &self.module, props, &self.name),
        }
    }
}

// ============================================================================
// Props
// ============================================================================

/// Properties a component is invoked with.
pub trait Props {
    fn into_value(self) -> Value;
}

/// Props of the shared layout.
#[derive(Debug, Clone)]
pub struct LayoutProps {
    pub body: Node,
    /// Route of the page being wrapped (`/`, `/contact`, `/posts/hello`).
    pub uri: String,
    /// Set when wrapping a post.
    pub frontmatter: Option<Frontmatter>,
    pub slug: Option<String>,
}

impl Props for LayoutProps {
    fn into_value(self) -> Value {
        let mut object = Object::default();
        object.insert("body", Value::Node(Arc::new(self.body)));
        object.insert("uri", self.uri.into());
        if let Some(frontmatter) = self.frontmatter {
            object.insert("frontmatter", frontmatter.to_value());
        }
        if let Some(slug) = self.slug {
            object.insert("slug", slug.into());
        }
        object.into()
    }
}

/// Props of a page: every post of the pass, keyed by slug.
#[derive(Debug, Clone, Copy)]
pub struct PageProps<'a> {
    pub posts: &'a PostIndex,
}

impl Props for PageProps<'_> {
    fn into_value(self) -> Value {
        let mut object = Object::default();
        object.insert("posts", self.posts.to_value());
        object.into()
    }
}

/// Props of a post body.
#[derive(Debug, Clone)]
pub struct PostProps {
    pub slug: String,
    pub frontmatter: Frontmatter,
}

impl Props for PostProps {
    fn into_value(self) -> Value {
        let mut object = Object::default();
        object.insert("slug", self.slug.into());
        object.insert("frontmatter", self.frontmatter.to_value());
        object.into()
    }
}

// ============================================================================
// Post Index
// ============================================================================

/// Slug to frontmatter for every post of one pass, ordered by slug.
#[derive(Debug, Clone, Default)]
pub struct PostIndex {
    entries: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    unit: String,
    frontmatter: Frontmatter,
}

impl PostIndex {
    /// Add a post. A slug already taken by another unit is an error.
    pub fn insert(
        &mut self,
        slug: &str,
        unit: &str,
        frontmatter: Frontmatter,
    ) -> Result<(), CompileError> {
        if let Some(existing) = self.entries.get(slug) {
            return Err(CompileError::DuplicateSlug {
                slug: slug.to_owned(),
                first: existing.unit.clone(),
                second: unit.to_owned(),
            });
        }
        self.entries.insert(
            slug.to_owned(),
            IndexEntry {
                unit: unit.to_owned(),
                frontmatter,
            },
        );
        Ok(())
    }

    pub fn get(&self, slug: &str) -> Option<&Frontmatter> {
        self.entries.get(slug).map(|entry| &entry.frontmatter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Frontmatter)> {
        self.entries
            .iter()
            .map(|(slug, entry)| (slug.as_str(), &entry.frontmatter))
    }

    /// Template value: `{ [slug]: frontmatter }`.
    pub fn to_value(&self) -> Value {
        self.iter()
            .map(|(slug, frontmatter)| (slug, frontmatter.to_value()))
            .collect::<Object>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontmatter::{DEFAULT_EXTRACTORS, extract};

    fn frontmatter(src: &str) -> Frontmatter {
        extract(src, DEFAULT_EXTRACTORS).unwrap().frontmatter
    }

    #[test]
    fn test_post_index_rejects_duplicate_slug() {
        let mut index = PostIndex::default();
        index
            .insert("hello", "src/posts/hello.md", Frontmatter::default())
            .unwrap();
        let err = index
            .insert("hello", "src/posts/hello.mdx", Frontmatter::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateSlug { .. }));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_post_index_is_ordered_by_slug() {
        let mut index = PostIndex::default();
        for slug in ["zeta", "alpha", "mid"] {
            index.insert(slug, slug, Frontmatter::default()).unwrap();
        }
        let slugs: Vec<_> = index.iter().map(|(slug, _)| slug).collect();
        assert_eq!(slugs, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_page_props_value() {
        let mut index = PostIndex::default();
        index
            .insert("a", "src/posts/a.md", frontmatter("---\ntitle: A\n---\n"))
            .unwrap();

        let Value::Object(props) = PageProps { posts: &index }.into_value() else {
            panic!("expected object");
        };
        let Some(Value::Object(posts)) = props.get("posts") else {
            panic!("expected posts object");
        };
        let Some(Value::Object(a)) = posts.get("a") else {
            panic!("expected post a");
        };
        assert_eq!(a.get("title").map(Value::to_js_string).as_deref(), Some("A"));
    }

    #[test]
    fn test_layout_props_omit_absent_fields() {
        let props = LayoutProps {
            body: Node::text("hi"),
            uri: "/".into(),
            frontmatter: None,
            slug: None,
        };
        let Value::Object(object) = props.into_value() else {
            panic!("expected object");
        };
        assert!(matches!(object.get("body"), Some(Value::Node(_))));
        assert!(object.get("slug").is_none());
        assert!(object.get("frontmatter").is_none());
    }
}
