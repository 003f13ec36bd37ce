//! Utility-class generator.
//!
//! Scans `class="…"` attributes in the built HTML and emits a rule for every
//! class the table below understands, with `hover:` `focus:` `active:`
//! `group-hover:` and `sm:` … `2xl:` variants.
//!
//! Output order: unconditional rules first, then one `@media` block per
//! breakpoint. Inside a block, rules sort by utility rank, then state, then
//! class name.

use super::palette;
use crate::compiler::collect_all_files;
use regex::Regex;
use std::{collections::BTreeSet, fmt::Write, fs, io, path::Path, sync::LazyLock};

type Decls = Vec<(&'static str, String)>;

// ============================================================================
// Scanning
// ============================================================================

static CLASS_ATTR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok());

/// Collect class names used by `*.html` files under `tree`.
pub fn scan(tree: &Path) -> io::Result<BTreeSet<String>> {
    let mut classes = BTreeSet::new();
    let Some(re) = CLASS_ATTR.as_ref() else {
        return Ok(classes);
    };

    let pages = collect_all_files(tree)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "html"));
    for page in pages {
        let html = fs::read_to_string(&page)?;
        for caps in re.captures_iter(&html) {
            let value = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            classes.extend(value.split_whitespace().map(str::to_owned));
        }
    }
    Ok(classes)
}

// ============================================================================
// Rule Generation
// ============================================================================

/// Emit CSS for every recognised class, in stable order.
pub fn generate(classes: &BTreeSet<String>) -> String {
    let mut rules: Vec<Rule> = classes.iter().filter_map(|c| Rule::parse(c)).collect();
    rules.sort_by(|a, b| a.key().cmp(&b.key()));

    let mut css = String::new();
    for group in rules.chunk_by(|a, b| a.breakpoint == b.breakpoint) {
        match group[0].breakpoint.checked_sub(1) {
            None => group.iter().for_each(|rule| rule.write(&mut css, "")),
            Some(index) => {
                _ = writeln!(css, "@media (min-width: {}px) {{", BREAKPOINTS[index].1);
                group.iter().for_each(|rule| rule.write(&mut css, "  "));
                css.push_str("}\n");
            }
        }
    }
    css
}

const BREAKPOINTS: &[(&str, u32)] = &[
    ("sm", 640),
    ("md", 768),
    ("lg", 1024),
    ("xl", 1280),
    ("2xl", 1536),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum State {
    Base,
    GroupHover,
    Hover,
    Focus,
    Active,
}

impl State {
    fn parse(variant: &str) -> Option<Self> {
        Some(match variant {
            "hover" => Self::Hover,
            "focus" => Self::Focus,
            "active" => Self::Active,
            "group-hover" => Self::GroupHover,
            _ => return None,
        })
    }
}

#[derive(Debug)]
struct Rule<'a> {
    class: &'a str,
    /// 0 for no breakpoint, otherwise index into [`BREAKPOINTS`] plus one.
    breakpoint: usize,
    state: State,
    utility: Utility,
}

impl<'a> Rule<'a> {
    fn parse(class: &'a str) -> Option<Self> {
        let mut variants: Vec<&str> = class.split(':').collect();
        let base = variants.pop()?;

        let mut breakpoint = 0;
        let mut state = State::Base;
        for variant in variants {
            if let Some(index) = BREAKPOINTS.iter().position(|(name, _)| *name == variant) {
                if breakpoint != 0 {
                    return None;
                }
                breakpoint = index + 1;
            } else if state == State::Base {
                state = State::parse(variant)?;
            } else {
                return None;
            }
        }

        Some(Self {
            class,
            breakpoint,
            state,
            utility: Utility::resolve(base)?,
        })
    }

    fn key(&self) -> (usize, usize, State, &str) {
        (self.breakpoint, self.utility.rank, self.state, self.class)
    }

    fn selector(&self) -> String {
        let class = escape(self.class);
        let mut selector = match self.state {
            State::Base => format!(".{class}"),
            State::GroupHover => format!(".group:hover .{class}"),
            State::Hover => format!(".{class}:hover"),
            State::Focus => format!(".{class}:focus"),
            State::Active => format!(".{class}:active"),
        };
        if let Some(child) = self.utility.child {
            selector.push_str(child);
        }
        selector
    }

    fn write(&self, css: &mut String, indent: &str) {
        _ = writeln!(css, "{indent}{} {{", self.selector());
        for (property, value) in &self.utility.decls {
            _ = writeln!(css, "{indent}  {property}: {value};");
        }
        _ = writeln!(css, "{indent}}}");
    }
}

/// Escape a class name for use in a selector.
fn escape(class: &str) -> String {
    let mut out = String::with_capacity(class.len() + 4);
    for (i, c) in class.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            _ = write!(out, "\\3{c} ");
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

// ============================================================================
// Utility Table
// ============================================================================

#[derive(Debug)]
struct Utility {
    rank: usize,
    decls: Decls,
    /// Selector suffix for utilities that style children.
    child: Option<&'static str>,
}

impl Utility {
    fn resolve(name: &str) -> Option<Self> {
        if let Some(rank) = KEYWORDS.iter().position(|(n, _)| *n == name) {
            let decls = KEYWORDS[rank]
                .1
                .iter()
                .map(|(p, v)| (*p, (*v).to_owned()))
                .collect();
            return Some(Self { rank, decls, child: None });
        }

        let (negative, name) = match name.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, name),
        };

        FAMILIES.iter().enumerate().find_map(|(i, family)| {
            if negative && !family.negative {
                return None;
            }
            let arg = name.strip_prefix(family.prefix)?.strip_prefix('-')?;
            let mut decls = declarations(family.prefix, arg)?;
            if negative {
                for (_, value) in &mut decls {
                    *value = negate(value)?;
                }
            }
            Some(Self {
                rank: KEYWORDS.len() + i,
                decls,
                child: family.child,
            })
        })
    }
}

/// Exact-match utilities.
#[rustfmt::skip]
const KEYWORDS: &[(&str, &[(&str, &str)])] = &[
    ("sr-only", &[("position", "absolute"), ("width", "1px"), ("height", "1px"), ("padding", "0"), ("margin", "-1px"), ("overflow", "hidden"), ("clip", "rect(0, 0, 0, 0)"), ("white-space", "nowrap"), ("border-width", "0")]),
    ("pointer-events-none", &[("pointer-events", "none")]),
    ("pointer-events-auto", &[("pointer-events", "auto")]),
    ("visible", &[("visibility", "visible")]),
    ("invisible", &[("visibility", "hidden")]),
    ("static", &[("position", "static")]),
    ("fixed", &[("position", "fixed")]),
    ("absolute", &[("position", "absolute")]),
    ("relative", &[("position", "relative")]),
    ("sticky", &[("position", "-webkit-sticky"), ("position", "sticky")]),
    ("block", &[("display", "block")]),
    ("inline-block", &[("display", "inline-block")]),
    ("inline", &[("display", "inline")]),
    ("flex", &[("display", "flex")]),
    ("inline-flex", &[("display", "inline-flex")]),
    ("table", &[("display", "table")]),
    ("grid", &[("display", "grid")]),
    ("inline-grid", &[("display", "inline-grid")]),
    ("contents", &[("display", "contents")]),
    ("hidden", &[("display", "none")]),
    ("flex-1", &[("flex", "1 1 0%")]),
    ("flex-auto", &[("flex", "1 1 auto")]),
    ("flex-initial", &[("flex", "0 1 auto")]),
    ("flex-none", &[("flex", "none")]),
    ("shrink", &[("flex-shrink", "1")]),
    ("shrink-0", &[("flex-shrink", "0")]),
    ("grow", &[("flex-grow", "1")]),
    ("grow-0", &[("flex-grow", "0")]),
    ("flex-row", &[("flex-direction", "row")]),
    ("flex-row-reverse", &[("flex-direction", "row-reverse")]),
    ("flex-col", &[("flex-direction", "column")]),
    ("flex-col-reverse", &[("flex-direction", "column-reverse")]),
    ("flex-wrap", &[("flex-wrap", "wrap")]),
    ("flex-wrap-reverse", &[("flex-wrap", "wrap-reverse")]),
    ("flex-nowrap", &[("flex-wrap", "nowrap")]),
    ("list-inside", &[("list-style-position", "inside")]),
    ("list-outside", &[("list-style-position", "outside")]),
    ("list-none", &[("list-style-type", "none")]),
    ("list-disc", &[("list-style-type", "disc")]),
    ("list-decimal", &[("list-style-type", "decimal")]),
    ("items-start", &[("align-items", "flex-start")]),
    ("items-end", &[("align-items", "flex-end")]),
    ("items-center", &[("align-items", "center")]),
    ("items-baseline", &[("align-items", "baseline")]),
    ("items-stretch", &[("align-items", "stretch")]),
    ("justify-start", &[("justify-content", "flex-start")]),
    ("justify-end", &[("justify-content", "flex-end")]),
    ("justify-center", &[("justify-content", "center")]),
    ("justify-between", &[("justify-content", "space-between")]),
    ("justify-around", &[("justify-content", "space-around")]),
    ("justify-evenly", &[("justify-content", "space-evenly")]),
    ("self-auto", &[("align-self", "auto")]),
    ("self-start", &[("align-self", "flex-start")]),
    ("self-end", &[("align-self", "flex-end")]),
    ("self-center", &[("align-self", "center")]),
    ("self-stretch", &[("align-self", "stretch")]),
    ("overflow-auto", &[("overflow", "auto")]),
    ("overflow-hidden", &[("overflow", "hidden")]),
    ("overflow-visible", &[("overflow", "visible")]),
    ("overflow-scroll", &[("overflow", "scroll")]),
    ("overflow-x-auto", &[("overflow-x", "auto")]),
    ("overflow-y-auto", &[("overflow-y", "auto")]),
    ("overflow-x-hidden", &[("overflow-x", "hidden")]),
    ("overflow-y-hidden", &[("overflow-y", "hidden")]),
    ("truncate", &[("overflow", "hidden"), ("text-overflow", "ellipsis"), ("white-space", "nowrap")]),
    ("whitespace-normal", &[("white-space", "normal")]),
    ("whitespace-nowrap", &[("white-space", "nowrap")]),
    ("whitespace-pre", &[("white-space", "pre")]),
    ("whitespace-pre-line", &[("white-space", "pre-line")]),
    ("whitespace-pre-wrap", &[("white-space", "pre-wrap")]),
    ("break-words", &[("overflow-wrap", "break-word")]),
    ("break-all", &[("word-break", "break-all")]),
    ("rounded", &[("border-radius", "0.25rem")]),
    ("border", &[("border-width", "1px")]),
    ("border-t", &[("border-top-width", "1px")]),
    ("border-r", &[("border-right-width", "1px")]),
    ("border-b", &[("border-bottom-width", "1px")]),
    ("border-l", &[("border-left-width", "1px")]),
    ("border-solid", &[("border-style", "solid")]),
    ("border-dashed", &[("border-style", "dashed")]),
    ("border-dotted", &[("border-style", "dotted")]),
    ("border-double", &[("border-style", "double")]),
    ("border-none", &[("border-style", "none")]),
    ("object-contain", &[("object-fit", "contain")]),
    ("object-cover", &[("object-fit", "cover")]),
    ("text-left", &[("text-align", "left")]),
    ("text-center", &[("text-align", "center")]),
    ("text-right", &[("text-align", "right")]),
    ("text-justify", &[("text-align", "justify")]),
    ("font-sans", &[("font-family", "ui-sans-serif, system-ui, sans-serif, \"Apple Color Emoji\", \"Segoe UI Emoji\"")]),
    ("font-serif", &[("font-family", "ui-serif, Georgia, Cambria, \"Times New Roman\", Times, serif")]),
    ("font-mono", &[("font-family", "ui-monospace, SFMono-Regular, Menlo, Monaco, Consolas, monospace")]),
    ("uppercase", &[("text-transform", "uppercase")]),
    ("lowercase", &[("text-transform", "lowercase")]),
    ("capitalize", &[("text-transform", "capitalize")]),
    ("normal-case", &[("text-transform", "none")]),
    ("italic", &[("font-style", "italic")]),
    ("not-italic", &[("font-style", "normal")]),
    ("underline", &[("text-decoration-line", "underline")]),
    ("overline", &[("text-decoration-line", "overline")]),
    ("line-through", &[("text-decoration-line", "line-through")]),
    ("no-underline", &[("text-decoration-line", "none")]),
    ("antialiased", &[("-webkit-font-smoothing", "antialiased"), ("-moz-osx-font-smoothing", "grayscale")]),
    ("shadow", &[("box-shadow", "0 1px 3px 0 rgb(0 0 0 / 0.1), 0 1px 2px -1px rgb(0 0 0 / 0.1)")]),
    ("cursor-default", &[("cursor", "default")]),
    ("cursor-pointer", &[("cursor", "pointer")]),
    ("cursor-not-allowed", &[("cursor", "not-allowed")]),
    ("select-none", &[("-webkit-user-select", "none"), ("user-select", "none")]),
    ("select-text", &[("-webkit-user-select", "text"), ("user-select", "text")]),
    ("select-all", &[("-webkit-user-select", "all"), ("user-select", "all")]),
    ("transition", &[("transition-property", "color, background-color, border-color, text-decoration-color, fill, stroke, opacity, box-shadow, transform"), ("transition-timing-function", "cubic-bezier(0.4, 0, 0.2, 1)"), ("transition-duration", "150ms")]),
    ("transition-colors", &[("transition-property", "color, background-color, border-color, text-decoration-color, fill, stroke"), ("transition-timing-function", "cubic-bezier(0.4, 0, 0.2, 1)"), ("transition-duration", "150ms")]),
];

#[derive(Debug)]
struct Family {
    prefix: &'static str,
    /// Accepts a leading `-`.
    negative: bool,
    child: Option<&'static str>,
}

const fn family(prefix: &'static str) -> Family {
    Family { prefix, negative: false, child: None }
}

const fn signed(prefix: &'static str) -> Family {
    Family { prefix, negative: true, child: None }
}

const SPACE_BETWEEN: &str = " > :not([hidden]) ~ :not([hidden])";

/// Value-taking utilities, in emit order. Longer prefixes sharing a stem
/// come after the shorter one; resolution falls through on mismatch.
const FAMILIES: &[Family] = &[
    signed("inset"),
    signed("inset-x"),
    signed("inset-y"),
    signed("top"),
    signed("right"),
    signed("bottom"),
    signed("left"),
    family("z"),
    family("grid-cols"),
    family("col-span"),
    signed("m"),
    signed("mx"),
    signed("my"),
    signed("mt"),
    signed("mr"),
    signed("mb"),
    signed("ml"),
    family("w"),
    family("min-w"),
    family("max-w"),
    family("h"),
    family("min-h"),
    family("max-h"),
    family("gap"),
    family("gap-x"),
    family("gap-y"),
    Family { prefix: "space-x", negative: true, child: Some(SPACE_BETWEEN) },
    Family { prefix: "space-y", negative: true, child: Some(SPACE_BETWEEN) },
    family("rounded"),
    family("rounded-t"),
    family("rounded-r"),
    family("rounded-b"),
    family("rounded-l"),
    family("border"),
    family("border-t"),
    family("border-r"),
    family("border-b"),
    family("border-l"),
    family("bg"),
    family("p"),
    family("px"),
    family("py"),
    family("pt"),
    family("pr"),
    family("pb"),
    family("pl"),
    family("text"),
    family("font"),
    family("leading"),
    family("tracking"),
    family("opacity"),
    family("shadow"),
];

fn declarations(family: &str, arg: &str) -> Option<Decls> {
    let one = |property: &'static str, value: String| Some(vec![(property, value)]);
    let all = |properties: &[&'static str], value: String| -> Option<Decls> {
        Some(properties.iter().map(|p| (*p, value.clone())).collect())
    };

    match family {
        "inset" => one("inset", inset(arg)?),
        "inset-x" => all(&["left", "right"], inset(arg)?),
        "inset-y" => all(&["top", "bottom"], inset(arg)?),
        "top" => one("top", inset(arg)?),
        "right" => one("right", inset(arg)?),
        "bottom" => one("bottom", inset(arg)?),
        "left" => one("left", inset(arg)?),
        "z" => match arg {
            "0" | "10" | "20" | "30" | "40" | "50" | "auto" => one("z-index", arg.to_owned()),
            _ => None,
        },
        "grid-cols" => match arg {
            "none" => one("grid-template-columns", "none".to_owned()),
            _ => one(
                "grid-template-columns",
                format!("repeat({}, minmax(0, 1fr))", columns(arg)?),
            ),
        },
        "col-span" => match arg {
            "full" => one("grid-column", "1 / -1".to_owned()),
            _ => {
                let n = columns(arg)?;
                one("grid-column", format!("span {n} / span {n}"))
            }
        },
        "m" => one("margin", margin(arg)?),
        "mx" => all(&["margin-left", "margin-right"], margin(arg)?),
        "my" => all(&["margin-top", "margin-bottom"], margin(arg)?),
        "mt" => one("margin-top", margin(arg)?),
        "mr" => one("margin-right", margin(arg)?),
        "mb" => one("margin-bottom", margin(arg)?),
        "ml" => one("margin-left", margin(arg)?),
        "p" => one("padding", spacing(arg)?),
        "px" => all(&["padding-left", "padding-right"], spacing(arg)?),
        "py" => all(&["padding-top", "padding-bottom"], spacing(arg)?),
        "pt" => one("padding-top", spacing(arg)?),
        "pr" => one("padding-right", spacing(arg)?),
        "pb" => one("padding-bottom", spacing(arg)?),
        "pl" => one("padding-left", spacing(arg)?),
        "w" => one("width", size(arg, "100vw")?),
        "h" => one("height", size(arg, "100vh")?),
        "min-w" => match arg {
            "0" => one("min-width", "0px".to_owned()),
            "full" | "min" | "max" | "fit" => one("min-width", size(arg, "100vw")?),
            _ => None,
        },
        "max-w" => one("max-width", lookup(MAX_WIDTHS, arg)?),
        "min-h" => match arg {
            "0" => one("min-height", "0px".to_owned()),
            "full" | "screen" | "min" | "max" | "fit" => one("min-height", size(arg, "100vh")?),
            _ => None,
        },
        "max-h" => match arg {
            "full" | "screen" | "min" | "max" | "fit" => one("max-height", size(arg, "100vh")?),
            _ => one("max-height", spacing(arg)?),
        },
        "gap" => one("gap", spacing(arg)?),
        "gap-x" => one("column-gap", spacing(arg)?),
        "gap-y" => one("row-gap", spacing(arg)?),
        "space-x" => one("margin-left", spacing(arg)?),
        "space-y" => one("margin-top", spacing(arg)?),
        "rounded" => one("border-radius", lookup(RADII, arg)?),
        "rounded-t" => all(&["border-top-left-radius", "border-top-right-radius"], lookup(RADII, arg)?),
        "rounded-r" => all(&["border-top-right-radius", "border-bottom-right-radius"], lookup(RADII, arg)?),
        "rounded-b" => all(&["border-bottom-right-radius", "border-bottom-left-radius"], lookup(RADII, arg)?),
        "rounded-l" => all(&["border-top-left-radius", "border-bottom-left-radius"], lookup(RADII, arg)?),
        "border" => match border_width(arg) {
            Some(width) => one("border-width", width),
            None => one("border-color", palette::color(arg)?),
        },
        "border-t" => one("border-top-width", border_width(arg)?),
        "border-r" => one("border-right-width", border_width(arg)?),
        "border-b" => one("border-bottom-width", border_width(arg)?),
        "border-l" => one("border-left-width", border_width(arg)?),
        "bg" => one("background-color", palette::color(arg)?),
        "text" => match FONT_SIZES.iter().find(|(name, ..)| *name == arg) {
            Some((_, size, height)) => Some(vec![
                ("font-size", (*size).to_owned()),
                ("line-height", (*height).to_owned()),
            ]),
            None => one("color", palette::color(arg)?),
        },
        "font" => one("font-weight", lookup(FONT_WEIGHTS, arg)?),
        "leading" => one("line-height", lookup(LINE_HEIGHTS, arg).or_else(|| {
            let n: u8 = arg.parse().ok()?;
            (3..=10).contains(&n).then(|| format!("{}rem", f64::from(n) / 4.0))
        })?),
        "tracking" => one("letter-spacing", lookup(LETTER_SPACINGS, arg)?),
        "opacity" => {
            let n: u8 = arg.parse().ok()?;
            (n <= 100 && n % 5 == 0).then(|| vec![("opacity", format!("{}", f64::from(n) / 100.0))])
        }
        "shadow" => one("box-shadow", lookup(SHADOWS, arg)?),
        _ => None,
    }
}

// ============================================================================
// Value Scales
// ============================================================================

/// Spacing steps above 12.
const LARGE_SPACING: &[u32] = &[14, 16, 20, 24, 28, 32, 36, 40, 44, 48, 52, 56, 60, 64, 72, 80, 96];

/// Spacing scale: `n` is `n / 4` rem.
fn spacing(arg: &str) -> Option<String> {
    match arg {
        "0" => return Some("0px".to_owned()),
        "px" => return Some("1px".to_owned()),
        _ => {}
    }
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }

    let n: f64 = arg.parse().ok()?;
    if (n * 2.0).fract() != 0.0 {
        return None;
    }
    let valid = if n.fract() == 0.0 {
        n <= 12.0 || LARGE_SPACING.contains(&(n as u32))
    } else {
        n < 4.0
    };
    valid.then(|| format!("{}rem", n / 4.0))
}

fn margin(arg: &str) -> Option<String> {
    match arg {
        "auto" => Some("auto".to_owned()),
        _ => spacing(arg),
    }
}

fn inset(arg: &str) -> Option<String> {
    match arg {
        "auto" => Some("auto".to_owned()),
        "full" => Some("100%".to_owned()),
        _ => spacing(arg).or_else(|| fraction(arg)),
    }
}

fn size(arg: &str, screen: &str) -> Option<String> {
    Some(
        match arg {
            "auto" => "auto",
            "full" => "100%",
            "screen" => screen,
            "min" => "min-content",
            "max" => "max-content",
            "fit" => "fit-content",
            _ => return spacing(arg).or_else(|| fraction(arg)),
        }
        .to_owned(),
    )
}

/// `a/b` as a percentage.
fn fraction(arg: &str) -> Option<String> {
    let (a, b) = arg.split_once('/')?;
    let (a, b): (u32, u32) = (a.parse().ok()?, b.parse().ok()?);
    if !(2..=12).contains(&b) || a == 0 || a >= b {
        return None;
    }
    let percent = format!("{:.6}", f64::from(a) * 100.0 / f64::from(b));
    Some(format!("{}%", percent.trim_end_matches('0').trim_end_matches('.')))
}

fn columns(arg: &str) -> Option<u8> {
    arg.parse().ok().filter(|n| (1..=12).contains(n))
}

fn border_width(arg: &str) -> Option<String> {
    matches!(arg, "0" | "2" | "4" | "8").then(|| format!("{arg}px"))
}

fn negate(value: &str) -> Option<String> {
    if value == "0px" {
        Some(value.to_owned())
    } else if value.starts_with(|c: char| c.is_ascii_digit()) {
        Some(format!("-{value}"))
    } else {
        None
    }
}

fn lookup(table: &[(&str, &str)], arg: &str) -> Option<String> {
    table
        .iter()
        .find(|(name, _)| *name == arg)
        .map(|(_, value)| (*value).to_owned())
}

/// Name, font size, line height.
const FONT_SIZES: &[(&str, &str, &str)] = &[
    ("xs", "0.75rem", "1rem"),
    ("sm", "0.875rem", "1.25rem"),
    ("base", "1rem", "1.5rem"),
    ("lg", "1.125rem", "1.75rem"),
    ("xl", "1.25rem", "1.75rem"),
    ("2xl", "1.5rem", "2rem"),
    ("3xl", "1.875rem", "2.25rem"),
    ("4xl", "2.25rem", "2.5rem"),
    ("5xl", "3rem", "1"),
    ("6xl", "3.75rem", "1"),
    ("7xl", "4.5rem", "1"),
    ("8xl", "6rem", "1"),
    ("9xl", "8rem", "1"),
];

const FONT_WEIGHTS: &[(&str, &str)] = &[
    ("thin", "100"),
    ("extralight", "200"),
    ("light", "300"),
    ("normal", "400"),
    ("medium", "500"),
    ("semibold", "600"),
    ("bold", "700"),
    ("extrabold", "800"),
    ("black", "900"),
];

const LINE_HEIGHTS: &[(&str, &str)] = &[
    ("none", "1"),
    ("tight", "1.25"),
    ("snug", "1.375"),
    ("normal", "1.5"),
    ("relaxed", "1.625"),
    ("loose", "2"),
];

const LETTER_SPACINGS: &[(&str, &str)] = &[
    ("tighter", "-0.05em"),
    ("tight", "-0.025em"),
    ("normal", "0em"),
    ("wide", "0.025em"),
    ("wider", "0.05em"),
    ("widest", "0.1em"),
];

const MAX_WIDTHS: &[(&str, &str)] = &[
    ("none", "none"),
    ("xs", "20rem"),
    ("sm", "24rem"),
    ("md", "28rem"),
    ("lg", "32rem"),
    ("xl", "36rem"),
    ("2xl", "42rem"),
    ("3xl", "48rem"),
    ("4xl", "56rem"),
    ("5xl", "64rem"),
    ("6xl", "72rem"),
    ("7xl", "80rem"),
    ("full", "100%"),
    ("min", "min-content"),
    ("max", "max-content"),
    ("fit", "fit-content"),
    ("prose", "65ch"),
    ("screen-sm", "640px"),
    ("screen-md", "768px"),
    ("screen-lg", "1024px"),
    ("screen-xl", "1280px"),
    ("screen-2xl", "1536px"),
];

const RADII: &[(&str, &str)] = &[
    ("none", "0px"),
    ("sm", "0.125rem"),
    ("md", "0.375rem"),
    ("lg", "0.5rem"),
    ("xl", "0.75rem"),
    ("2xl", "1rem"),
    ("3xl", "1.5rem"),
    ("full", "9999px"),
];

const SHADOWS: &[(&str, &str)] = &[
    ("sm", "0 1px 2px 0 rgb(0 0 0 / 0.05)"),
    ("md", "0 4px 6px -1px rgb(0 0 0 / 0.1), 0 2px 4px -2px rgb(0 0 0 / 0.1)"),
    ("lg", "0 10px 15px -3px rgb(0 0 0 / 0.1), 0 4px 6px -4px rgb(0 0 0 / 0.1)"),
    ("xl", "0 20px 25px -5px rgb(0 0 0 / 0.1), 0 8px 10px -6px rgb(0 0 0 / 0.1)"),
    ("none", "0 0 #0000"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn set(classes: &[&str]) -> BTreeSet<String> {
        classes.iter().map(|c| (*c).to_owned()).collect()
    }

    fn decls(name: &str) -> Vec<(&'static str, String)> {
        Utility::resolve(name).unwrap().decls
    }

    #[test]
    fn test_spacing_scale() {
        assert_eq!(spacing("0").as_deref(), Some("0px"));
        assert_eq!(spacing("px").as_deref(), Some("1px"));
        assert_eq!(spacing("1").as_deref(), Some("0.25rem"));
        assert_eq!(spacing("0.5").as_deref(), Some("0.125rem"));
        assert_eq!(spacing("4").as_deref(), Some("1rem"));
        assert_eq!(spacing("96").as_deref(), Some("24rem"));
        assert_eq!(spacing("13"), None);
        assert_eq!(spacing("4.5"), None);
        assert_eq!(spacing("1e1"), None);
    }

    #[test]
    fn test_fractions() {
        assert_eq!(fraction("1/2").as_deref(), Some("50%"));
        assert_eq!(fraction("1/3").as_deref(), Some("33.333333%"));
        assert_eq!(fraction("2/3").as_deref(), Some("66.666667%"));
        assert_eq!(fraction("3/3"), None);
    }

    #[test]
    fn test_resolve_utilities() {
        assert_eq!(decls("p-4"), [("padding", "1rem".to_owned())]);
        assert_eq!(
            decls("px-2"),
            [("padding-left", "0.5rem".to_owned()), ("padding-right", "0.5rem".to_owned())]
        );
        assert_eq!(decls("mx-auto")[0], ("margin-left", "auto".to_owned()));
        assert_eq!(decls("-mt-4"), [("margin-top", "-1rem".to_owned())]);
        assert_eq!(decls("w-1/2"), [("width", "50%".to_owned())]);
        assert_eq!(decls("text-blue-500"), [("color", "#3b82f6".to_owned())]);
        assert_eq!(decls("text-lg")[0], ("font-size", "1.125rem".to_owned()));
        assert_eq!(decls("border-2"), [("border-width", "2px".to_owned())]);
        assert_eq!(decls("border-gray-200"), [("border-color", "#e5e7eb".to_owned())]);
        assert_eq!(decls("rounded-t-lg").len(), 2);
        assert_eq!(decls("bg-black/50"), [("background-color", "rgb(0 0 0 / 0.5)".to_owned())]);
        assert_eq!(decls("opacity-75"), [("opacity", "0.75".to_owned())]);
    }

    #[test]
    fn test_unknown_utilities() {
        for name in ["post", "-p-4", "mx-auto-x", "text-nope", "grid-cols-13", "-mx-auto", "group"] {
            assert!(Utility::resolve(name).is_none(), "{name}");
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("md:flex"), r"md\:flex");
        assert_eq!(escape("w-1/2"), r"w-1\/2");
        assert_eq!(escape("p-0.5"), r"p-0\.5");
        assert_eq!(escape("2xl:block"), r"\32 xl\:block");
    }

    #[test]
    fn test_generate_variants() {
        let css = generate(&set(&["hover:underline", "group-hover:text-white", "focus:bg-gray-100"]));
        assert!(css.contains(".hover\\:underline:hover {\n  text-decoration-line: underline;\n}"));
        assert!(css.contains(".group:hover .group-hover\\:text-white {"));
        assert!(css.contains(".focus\\:bg-gray-100:focus {"));
    }

    #[test]
    fn test_generate_media_blocks_follow_base_rules() {
        let css = generate(&set(&["md:flex", "hidden", "sm:p-2", "lg:hidden"]));
        assert_eq!(
            css,
            ".hidden {\n  display: none;\n}\n\
             @media (min-width: 640px) {\n  .sm\\:p-2 {\n    padding: 0.5rem;\n  }\n}\n\
             @media (min-width: 768px) {\n  .md\\:flex {\n    display: flex;\n  }\n}\n\
             @media (min-width: 1024px) {\n  .lg\\:hidden {\n    display: none;\n  }\n}\n"
        );
    }

    #[test]
    fn test_generate_orders_by_rank() {
        let css = generate(&set(&["p-4", "flex", "m-2", "text-sm"]));
        let flex = css.find(".flex").unwrap();
        let margin = css.find(".m-2").unwrap();
        let padding = css.find(".p-4").unwrap();
        let text = css.find(".text-sm").unwrap();
        assert!(flex < margin && margin < padding && padding < text);
    }

    #[test]
    fn test_space_between_children() {
        let css = generate(&set(&["space-y-4"]));
        assert!(css.starts_with(".space-y-4 > :not([hidden]) ~ :not([hidden]) {\n  margin-top: 1rem;"));
    }

    #[test]
    fn test_invalid_variant_combinations_are_skipped() {
        let css = generate(&set(&["sm:md:flex", "hover:focus:flex", "print:flex", "flex"]));
        assert_eq!(css, ".flex {\n  display: flex;\n}\n");
    }

    #[test]
    fn test_scan_html_tree() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("posts")).unwrap();
        fs::write(dir.path().join("index.html"), r#"<div class="flex  p-4"><a class='underline'>x</a></div>"#).unwrap();
        fs::write(dir.path().join("posts/a.html"), r#"<p class="text-sm p-4">y</p>"#).unwrap();
        fs::write(dir.path().join("notes.txt"), r#"class="hidden""#).unwrap();

        let classes = scan(dir.path()).unwrap();
        assert_eq!(classes, set(&["flex", "p-4", "text-sm", "underline"]));
    }
}
