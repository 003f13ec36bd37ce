//! Vendor prefixer for a fixed property table.
//!
//! Each declaration whose property appears in [`PREFIXES`] gets prefixed
//! copies inserted in front of it, unless the stylesheet already spells the
//! prefixed property out itself.

use regex::{Captures, Regex};
use std::{borrow::Cow, sync::LazyLock};

/// Property → prefixed variants.
const PREFIXES: &[(&str, &[&str])] = &[
    ("appearance", &["-webkit-appearance", "-moz-appearance"]),
    ("backdrop-filter", &["-webkit-backdrop-filter"]),
    ("background-clip", &["-webkit-background-clip"]),
    ("box-decoration-break", &["-webkit-box-decoration-break"]),
    ("hyphens", &["-webkit-hyphens"]),
    ("mask-image", &["-webkit-mask-image"]),
    ("tab-size", &["-moz-tab-size"]),
    ("text-size-adjust", &["-webkit-text-size-adjust"]),
    ("user-select", &["-webkit-user-select"]),
];

/// `<lead><indent><property>:<value>`, where lead is the start of input or a
/// character that can precede a declaration.
static DECLARATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)(?P<lead>^|[;{])(?P<indent>\s*)(?P<prop>-?[a-z][a-z-]*)\s*:(?P<value>[^;{}]*)")
        .ok()
});

/// Insert vendor-prefixed copies of known declarations.
pub fn prefix(css: &str) -> Cow<'_, str> {
    let Some(re) = DECLARATION.as_ref() else {
        return Cow::Borrowed(css);
    };

    re.replace_all(css, |caps: &Captures| {
        let whole = &caps[0];
        let Some((_, variants)) = PREFIXES.iter().find(|(p, _)| *p == &caps["prop"]) else {
            return whole.to_owned();
        };

        let lead = &caps["lead"];
        let indent = &caps["indent"];
        let value = caps["value"].trim();
        // Selector pseudo-classes like `a:hover` never reach here: `a` is
        // not a table entry.
        let mut out = String::from(lead);
        for variant in variants.iter().filter(|v| !css.contains(&format!("{v}:"))) {
            out.push_str(indent);
            out.push_str(variant);
            out.push_str(": ");
            out.push_str(value);
            out.push(';');
        }
        out.push_str(&whole[lead.len()..]);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_known_property() {
        let css = ".a {\n  user-select: none;\n}";
        assert_eq!(
            prefix(css),
            ".a {\n  -webkit-user-select: none;\n  user-select: none;\n}"
        );
    }

    #[test]
    fn test_multiple_variants_and_inline_block() {
        let css = "button{appearance:none;color:red}";
        assert_eq!(
            prefix(css),
            "button{-webkit-appearance: none;-moz-appearance: none;appearance:none;color:red}"
        );
    }

    #[test]
    fn test_leaves_unknown_and_selectors_alone() {
        let css = "a:hover {\n  color: red;\n}\n";
        assert_eq!(prefix(css), css);
    }

    #[test]
    fn test_skips_existing_prefixed_declaration() {
        let css = ".a {\n  -webkit-backdrop-filter: blur(4px);\n  backdrop-filter: blur(4px);\n}";
        assert_eq!(prefix(css), css);
    }

    #[test]
    fn test_prefix_is_deterministic() {
        let css = ".x { hyphens: auto; }\n.y { tab-size: 4; }";
        assert_eq!(prefix(css), prefix(css));
        assert!(prefix(css).contains("-webkit-hyphens: auto;"));
        assert!(prefix(css).contains("-moz-tab-size: 4;"));
    }
}
