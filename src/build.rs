//! Site building orchestration.
//!
//! One build pass compiles every source unit into a staging directory next to
//! the output, then swaps it into place. A failing pass leaves the previous
//! output untouched.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── SourceSet::discover()
//!     ├── compile layout ──► LayoutRenderer
//!     │
//!     ├── posts   (parallel compile) ──► PostIndex ──► (parallel render + write)
//!     │                                       │
//!     ├── pages   (parallel) ◄────────────────┘
//!     ├── assets  (parallel copy)
//!     ├── stylesheet ──► index.css (scans the written HTML)
//!     │
//!     └── publish: remove output, rename staging ──► output
//! ```

use crate::{
    compiler::{
        CompiledComponent, Frontmatter, LayoutRenderer, Mode, PageProps, PostIndex, PostProps,
        SourceSet, SourceUnit, content, copy_assets, page_route, post_route, template,
    },
    config::SiteConfig,
    css, log,
    tsx::ModuleLoader,
};
use anyhow::{Context, Result};
use rayon::{ThreadPoolBuilder, prelude::*};
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Name of the generated stylesheet in the output root.
pub const STYLESHEET_OUTPUT: &str = "index.css";

/// Template evaluation recurses on the native stack.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Summary of a successful pass.
#[derive(Debug)]
pub struct BuildReport {
    pub output: PathBuf,
    pub pages: usize,
    pub assets: usize,
    /// Whether `index.css` was generated.
    pub stylesheet: bool,
    /// Every post of the pass.
    pub posts: PostIndex,
    pub elapsed: Duration,
}

/// Run one build pass.
///
/// # Errors
///
/// Any compile, I/O or stylesheet failure. The staging directory is removed
/// and the previous output tree is preserved.
pub fn build_site(config: &SiteConfig, mode: Mode) -> Result<BuildReport> {
    let started = Instant::now();
    let sources = SourceSet::discover(config)?;
    let staging = config.build.staging_dir();

    let result = prepare_staging(&staging)
        .and_then(|()| build_into(config, mode, &sources, &staging))
        .and_then(|report| publish(&staging, &config.build.output).map(|()| report));

    match result {
        Ok(mut report) => {
            report.elapsed = started.elapsed();
            log!(
                "build";
                "{} pages, {} posts, {} assets{} -> {} in {}ms",
                report.pages,
                report.posts.len(),
                report.assets,
                if report.stylesheet { ", stylesheet" } else { "" },
                report.output.display(),
                report.elapsed.as_millis()
            );
            Ok(report)
        }
        Err(e) => {
            if staging.exists() {
                _ = fs::remove_dir_all(&staging);
            }
            Err(e)
        }
    }
}

fn prepare_staging(staging: &Path) -> Result<()> {
    if staging.exists() {
        fs::remove_dir_all(staging)
            .with_context(|| format!("Failed to clear staging directory {}", staging.display()))?;
    }
    fs::create_dir_all(staging.join("posts"))
        .with_context(|| format!("Failed to create staging directory {}", staging.display()))
}

fn build_into(
    config: &SiteConfig,
    mode: Mode,
    sources: &SourceSet,
    staging: &Path,
) -> Result<BuildReport> {
    let pool = ThreadPoolBuilder::new()
        .stack_size(WORKER_STACK_SIZE)
        .build()
        .context("Failed to start build workers")?;
    let loader = ModuleLoader::new(&config.build.source, &config.build.template_extensions);

    let layout = &sources.layout;
    let source = layout.read()?;
    let layout =
        pool.install(|| template::compile(&loader, &layout.path, &layout.name, source))?;
    let renderer = LayoutRenderer::new(layout, mode);

    // ========================================================================
    // Posts
    // ========================================================================
    let compiled = pool.install(|| {
        sources
            .posts
            .par_iter()
            .map(|unit| {
                let (component, frontmatter) =
                    content::compile(&loader, &unit.path, &unit.name, unit.read()?)?;
                Ok((unit, component, frontmatter))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut posts = PostIndex::default();
    for (unit, _, frontmatter) in &compiled {
        posts.insert(unit.stem(), &unit.name, frontmatter.clone())?;
    }

    pool.install(|| {
        compiled
            .par_iter()
            .try_for_each(|(unit, component, frontmatter)| {
                write_post(&renderer, unit, component, frontmatter, staging)
            })
    })?;

    // ========================================================================
    // Pages
    // ========================================================================
    pool.install(|| {
        sources
            .pages
            .par_iter()
            .try_for_each(|unit| write_page(&loader, &renderer, unit, &posts, staging))
    })?;

    // ========================================================================
    // Assets & Stylesheet
    // ========================================================================
    pool.install(|| copy_assets(&sources.assets, &config.build.public, staging))?;

    let stylesheet = match &sources.stylesheet {
        Some(unit) => {
            let css = css::generate(config, unit, staging)
                .with_context(|| format!("Failed to generate stylesheet from {}", unit.name))?;
            fs::write(staging.join(STYLESHEET_OUTPUT), css)
                .with_context(|| format!("Failed to write {STYLESHEET_OUTPUT}"))?;
            true
        }
        None => {
            log!(
                "warning";
                "stylesheet {} not found, skipping",
                config.build.stylesheet.display()
            );
            false
        }
    };

    Ok(BuildReport {
        output: config.build.output.clone(),
        pages: sources.pages.len(),
        assets: sources.assets.len(),
        stylesheet,
        posts,
        elapsed: Duration::ZERO,
    })
}

fn write_post(
    renderer: &LayoutRenderer,
    unit: &SourceUnit,
    component: &CompiledComponent,
    frontmatter: &Frontmatter,
    staging: &Path,
) -> Result<()> {
    let slug = unit.stem();
    let body = component.render(PostProps {
        slug: slug.to_owned(),
        frontmatter: frontmatter.clone(),
    })?;
    let html = renderer.render(body, &post_route(slug), Some((slug, frontmatter)))?;

    let target = staging.join("posts").join(format!("{slug}.html"));
    fs::write(&target, html).with_context(|| format!("Failed to write output for {}", unit.name))
}

fn write_page(
    loader: &ModuleLoader,
    renderer: &LayoutRenderer,
    unit: &SourceUnit,
    posts: &PostIndex,
    staging: &Path,
) -> Result<()> {
    let component = template::compile(loader, &unit.path, &unit.name, unit.read()?)?;
    let body = component.render(PageProps { posts })?;
    let html = renderer.render(body, &page_route(unit.stem()), None)?;

    let target = staging.join(format!("{}.html", unit.stem()));
    fs::write(&target, html).with_context(|| format!("Failed to write output for {}", unit.name))
}

/// Replace `output` with `staging`.
fn publish(staging: &Path, output: &Path) -> Result<()> {
    if output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("Failed to remove previous output {}", output.display()))?;
    }
    fs::rename(staging, output)
        .with_context(|| format!("Failed to publish build into {}", output.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{collect_all_files, error::CompileError};
    use std::collections::BTreeMap;
    use tempfile::{TempDir, tempdir};

    const LAYOUT: &str = r#"export default function Layout({ body, uri, frontmatter }) {
  return (
    <html>
      <head>
        <title>{frontmatter ? frontmatter.title : "Site"}</title>
        <link rel="stylesheet" href="/index.css" />
      </head>
      <body data-uri={uri} class="p-4">{body}</body>
    </html>
  )
}
"#;

    const INDEX: &str = r#"export default function Index({ posts }) {
  return (
    <ul class="flex">
      {Object.entries(posts).map(([slug, fm]) => <li><a href={`/posts/${slug}`}>{fm.title}</a></li>)}
    </ul>
  )
}
"#;

    const POST: &str = "---\ntitle: Hello\ndescription: First post\ndate: 2024-01-02\n---\n\n# Hello\n\nSome *text*.\n";

    fn site(files: &[(&str, &[u8])]) -> (TempDir, SiteConfig) {
        let dir = tempdir().unwrap();
        for (path, contents) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        let config = SiteConfig::load(dir.path(), Path::new("sprig.toml")).unwrap();
        (dir, config)
    }

    fn blog() -> (TempDir, SiteConfig) {
        site(&[
            ("src/+layout.tsx", LAYOUT.as_bytes()),
            ("src/index.tsx", INDEX.as_bytes()),
            ("src/posts/hello.md", POST.as_bytes()),
            ("src/index.css", b"@tailwind utilities;\n".as_slice()),
            ("public/robots.txt", b"User-agent: *\n".as_slice()),
        ])
    }

    fn tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        collect_all_files(dir)
            .into_iter()
            .map(|p| (p.strip_prefix(dir).unwrap().to_path_buf(), fs::read(&p).unwrap()))
            .collect()
    }

    #[test]
    fn test_production_build() {
        let (_dir, config) = blog();
        let report = build_site(&config, Mode::Production).unwrap();
        let out = &config.build.output;

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.starts_with("<!DOCTYPE html>"));
        assert!(!index.contains("<script>"));
        assert!(index.contains(r#"<a href="/posts/hello">Hello</a>"#));

        let post = fs::read_to_string(out.join("posts/hello.html")).unwrap();
        assert!(post.contains("<title>Hello</title>"));
        assert!(post.contains("<h1>Hello</h1>"));
        assert!(post.contains(r#"data-uri="/posts/hello""#));

        let css = fs::read_to_string(out.join("index.css")).unwrap();
        assert!(css.contains(".flex {"));
        assert!(css.contains(".p-4 {"));

        assert_eq!(report.pages, 1);
        assert_eq!(report.assets, 1);
        assert!(report.stylesheet);
        assert!(!config.build.staging_dir().exists());
    }

    #[test]
    fn test_development_build_appends_script_once() {
        let (_dir, config) = blog();
        build_site(&config, Mode::Development { reload_port: 35729 }).unwrap();

        for page in ["index.html", "posts/hello.html"] {
            let html = fs::read_to_string(config.build.output.join(page)).unwrap();
            assert!(html.starts_with("<!DOCTYPE html>"));
            assert_eq!(html.matches("<script>").count(), 1, "{page}");
            assert!(html.contains("35729"));
        }
    }

    #[test]
    fn test_post_index_matches_frontmatter() {
        let (_dir, config) = blog();
        let report = build_site(&config, Mode::Production).unwrap();

        assert_eq!(report.posts.len(), 1);
        let fm = report.posts.get("hello").unwrap();
        assert_eq!(fm.title(), Some("Hello"));
        assert_eq!(fm.description(), Some("First post"));
        assert_eq!(fm.date(), Some("2024-01-02"));
    }

    #[test]
    fn test_builds_are_idempotent() {
        let (_dir, config) = blog();
        build_site(&config, Mode::Production).unwrap();
        let first = tree(&config.build.output);
        build_site(&config, Mode::Production).unwrap();
        assert_eq!(first, tree(&config.build.output));
    }

    #[test]
    fn test_assets_copied_byte_for_byte() {
        let bytes: Vec<u8> = (0..=255).rev().collect();
        let (_dir, config) = site(&[
            ("src/+layout.tsx", LAYOUT.as_bytes()),
            ("public/fonts/a.woff2", bytes.as_slice()),
        ]);
        build_site(&config, Mode::Production).unwrap();
        assert_eq!(fs::read(config.build.output.join("fonts/a.woff2")).unwrap(), bytes);
    }

    #[test]
    fn test_invalid_page_keeps_previous_output() {
        let (dir, config) = blog();
        build_site(&config, Mode::Production).unwrap();
        let before = tree(&config.build.output);

        fs::write(
            dir.path().join("src/contact.tsx"),
            "export default function Contact() {\n  return <div>\n}\n",
        )
        .unwrap();
        let err = build_site(&config, Mode::Production).unwrap_err();

        assert!(format!("{err:#}").contains("src/contact.tsx"));
        assert_eq!(before, tree(&config.build.output));
        assert!(!config.build.output.join("contact.html").exists());
        assert!(!config.build.staging_dir().exists());
    }

    #[test]
    fn test_failed_first_build_writes_nothing() {
        let (_dir, config) = site(&[
            ("src/+layout.tsx", LAYOUT.as_bytes()),
            ("src/index.tsx", b"export default function () { return missing.x }\n".as_slice()),
            ("src/index.css", b"body {}\n".as_slice()),
        ]);
        assert!(build_site(&config, Mode::Production).is_err());
        assert!(!config.build.output.exists());
        assert!(!config.build.staging_dir().exists());
    }

    #[test]
    fn test_duplicate_slugs_are_rejected() {
        let (_dir, config) = site(&[
            ("src/+layout.tsx", LAYOUT.as_bytes()),
            ("src/posts/a.md", b"# one\n".as_slice()),
            ("src/posts/a.mdx", b"# two\n".as_slice()),
        ]);
        let err = build_site(&config, Mode::Production).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompileError>(),
            Some(CompileError::DuplicateSlug { slug, .. }) if slug == "a"
        ));
        assert!(!config.build.output.exists());
    }

    #[test]
    fn test_empty_posts_directory() {
        let (dir, config) = site(&[
            ("src/+layout.tsx", LAYOUT.as_bytes()),
            ("src/index.tsx", INDEX.as_bytes()),
        ]);
        fs::create_dir_all(dir.path().join("src/posts")).unwrap();

        let report = build_site(&config, Mode::Production).unwrap();
        assert!(report.posts.is_empty());
        let index = fs::read_to_string(config.build.output.join("index.html")).unwrap();
        assert!(index.contains(r#"<ul class="flex"></ul>"#));
    }

    #[test]
    fn test_layout_only_source() {
        let (_dir, config) = site(&[
            ("src/+layout.tsx", LAYOUT.as_bytes()),
            ("src/index.css", b"body { margin: 0; }\n".as_slice()),
            ("public/robots.txt", b"User-agent: *\n".as_slice()),
        ]);
        let report = build_site(&config, Mode::Production).unwrap();

        let out = &config.build.output;
        let mut entries: Vec<_> = fs::read_dir(out)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        entries.sort();
        assert_eq!(entries, ["index.css", "posts", "robots.txt"]);
        assert_eq!(report.pages, 0);
    }

    #[test]
    fn test_missing_stylesheet_is_skipped() {
        let (_dir, config) = site(&[("src/+layout.tsx", LAYOUT.as_bytes())]);
        let report = build_site(&config, Mode::Production).unwrap();
        assert!(!report.stylesheet);
        assert!(!config.build.output.join("index.css").exists());
    }

    #[test]
    fn test_missing_layout_is_an_error() {
        let (_dir, config) = site(&[("src/index.tsx", INDEX.as_bytes())]);
        let err = build_site(&config, Mode::Production).unwrap_err();
        assert!(err.to_string().contains("layout"));
    }

    #[test]
    fn test_marker_prefixed_templates_are_not_pages() {
        let (_dir, config) = site(&[
            ("src/+layout.tsx", LAYOUT.as_bytes()),
            ("src/+nav.tsx", b"export default function Nav() { return <nav /> }\n".as_slice()),
            ("src/contact.tsx", b"export default function () { return <p>hi</p> }\n".as_slice()),
        ]);
        build_site(&config, Mode::Production).unwrap();
        let out = &config.build.output;
        assert!(out.join("contact.html").exists());
        assert!(!out.join("+nav.html").exists());
        assert!(!out.join("+layout.html").exists());
    }

    #[test]
    fn test_demo_site_builds() {
        let demo = Path::new(env!("CARGO_MANIFEST_DIR")).join("demo");
        let work = tempdir().unwrap();
        for file in collect_all_files(&demo) {
            let relative = file.strip_prefix(&demo).unwrap();
            if relative.starts_with("out") {
                continue;
            }
            let target = work.path().join(relative);
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::copy(&file, &target).unwrap();
        }

        let config = SiteConfig::load(work.path(), Path::new("sprig.toml")).unwrap();
        let report = build_site(&config, Mode::Production).unwrap();
        assert!(report.posts.len() >= 2);

        let out = &config.build.output;
        let index = fs::read_to_string(out.join("index.html")).unwrap();
        for (slug, fm) in report.posts.iter() {
            assert!(out.join(format!("posts/{slug}.html")).exists());
            assert!(index.contains(fm.title().unwrap()), "{slug}");
        }
        assert!(out.join("contact.html").exists());
        assert!(out.join("robots.txt").exists());
        assert!(fs::read_to_string(out.join("index.css")).unwrap().contains("box-sizing"));
    }
}
