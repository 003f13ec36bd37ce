//! Layout renderer: wraps a rendered body in the site shell.

use super::component::{CompiledComponent, LayoutProps};
use super::error::CompileError;
use super::frontmatter::Frontmatter;
use crate::vdom::{Node, render_to_string};

const DOCTYPE: &str = "<!DOCTYPE html>";

/// Live-reload client, with `__SPRIG_RELOAD_PORT__` standing for the port.
const LIVERELOAD_JS: &str = include_str!("../embed/livereload.js");

/// What a build pass is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Production,
    /// Documents carry the live-reload client for the given WebSocket port.
    Development { reload_port: u16 },
}

/// Renders full HTML documents through the shared layout.
#[derive(Debug)]
pub struct LayoutRenderer {
    layout: CompiledComponent,
    /// Precomputed client script tag, present in development mode.
    reload_script: Option<String>,
}

impl LayoutRenderer {
    pub fn new(layout: CompiledComponent, mode: Mode) -> Self {
        let reload_script = match mode {
            Mode::Production => None,
            Mode::Development { reload_port } => Some(format!(
                "<script>{}</script>",
                LIVERELOAD_JS.replace("__SPRIG_RELOAD_PORT__", &reload_port.to_string())
            )),
        };
        Self {
            layout,
            reload_script,
        }
    }

    /// Render `body` at `uri` into a complete document. `post` carries the
    /// slug and frontmatter when the body is a post.
    pub fn render(
        &self,
        body: Node,
        uri: &str,
        post: Option<(&str, &Frontmatter)>,
    ) -> Result<String, CompileError> {
        let props = LayoutProps {
            body,
            uri: uri.to_owned(),
            frontmatter: post.map(|(_, fm)| fm.clone()),
            slug: post.map(|(slug, _)| slug.to_owned()),
        };
        let html = render_to_string(&self.layout.render(props)?);

        let script = self.reload_script.as_deref().unwrap_or_default();
        let mut document = String::with_capacity(DOCTYPE.len() + html.len() + script.len());
        document.push_str(DOCTYPE);
        document.push_str(&html);
        document.push_str(script);
        Ok(document)
    }
}

/// Route of a page named `name`.
pub fn page_route(name: &str) -> String {
    if name == "index" {
        "/".to_owned()
    } else {
        format!("/{name}")
    }
}

/// Route of the post with `slug`.
pub fn post_route(slug: &str) -> String {
    format!("/posts/{slug}")
}
