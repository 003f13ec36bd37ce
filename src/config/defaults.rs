//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn source() -> PathBuf {
        "src".into()
    }

    pub fn posts() -> PathBuf {
        "posts".into()
    }

    pub fn public() -> PathBuf {
        "public".into()
    }

    pub fn output() -> PathBuf {
        "out".into()
    }

    pub fn layout() -> PathBuf {
        "+layout.tsx".into()
    }

    pub fn layout_marker() -> String {
        "+".into()
    }

    pub fn stylesheet() -> PathBuf {
        "index.css".into()
    }

    pub fn template_extensions() -> Vec<String> {
        vec!["tsx".into(), "jsx".into()]
    }

    pub fn post_extensions() -> Vec<String> {
        vec!["md".into(), "mdx".into(), "markdown".into()]
    }

    pub mod css {
        use super::super::super::CssEngine;

        pub fn engine() -> CssEngine {
            CssEngine::default()
        }

        pub fn command() -> Vec<String> {
            vec!["tailwindcss".into()]
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        3000
    }

    pub fn reload_port() -> u16 {
        3001
    }

    pub fn debounce_ms() -> u64 {
        100
    }
}
