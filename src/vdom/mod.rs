//! Rendered node tree.
//!
//! Components return a [`Node`] tree; [`render_to_string`] serialises it
//! into HTML. The tree is plain data with no behaviour attached, so it can be
//! built on one thread and rendered on another.
//!
//! ```text
//! CompiledComponent ──► Node tree ──► render_to_string() ──► HTML
//! ```

mod node;
mod render;

pub use node::{AttrValue, Element, Node};
pub use render::render_to_string;
