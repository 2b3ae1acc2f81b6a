//! New-post publishing: render an article page and link it from the index.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

/// Characters of content kept in the index excerpt.
const SUMMARY_CHARS: usize = 100;

/// Lower-case, every non-alphanumeric run collapsed to one `-`, no leading
/// or trailing `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Index excerpt: the first 100 characters, with `...` when cut.
pub fn summary(content: &str) -> String {
    if content.chars().count() > SUMMARY_CHARS {
        let head: String = content.chars().take(SUMMARY_CHARS).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

/// Full article page. Each content line becomes a paragraph.
pub fn render_post(title: &str, content: &str, published: NaiveDate) -> String {
    let paragraphs = content
        .lines()
        .map(|line| format!("            <p>{}</p>", line))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Cat-logs</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <header>
        <h1><a href="index.html">Cat-logs</a></h1>
    </header>
    <main>
        <article>
            <h2>{title}</h2>
            <p>Published on {date}</p>
{paragraphs}
        </article>
    </main>
</body>
</html>"#,
        title = title,
        date = published.format("%B %d, %Y"),
        paragraphs = paragraphs,
    )
}

/// The `<article>` block added to the index for a new post.
pub fn index_entry(filename: &str, title: &str, content: &str) -> String {
    format!(
        "        <article>\n            <h2><a href=\"{}\">{}</a></h2>\n            <p>{}</p>\n        </article>",
        filename,
        title,
        summary(content)
    )
}

/// Insert `entry` as the last child of the index page's `<main>`.
pub fn insert_into_index(index_html: &str, entry: &str) -> Result<String> {
    let open = index_html
        .find("<main>")
        .context("Could not find main section in index.html")?;
    let close = index_html[open..]
        .find("</main>")
        .map(|i| open + i)
        .context("Could not find main section in index.html")?;

    // Whitespace before </main> stays attached to the closing tag.
    let body_end = index_html[..close].trim_end().len();

    let mut out = String::with_capacity(index_html.len() + entry.len() + 1);
    out.push_str(&index_html[..body_end]);
    out.push('\n');
    out.push_str(entry);
    out.push_str(&index_html[body_end..]);
    Ok(out)
}

/// What [`publish`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub post: PathBuf,
    pub index: PathBuf,
}

/// Write the post page into `dir` and link it from `dir/index.html`.
pub fn publish(
    dir: &Path,
    title: &str,
    content: &str,
    published: NaiveDate,
    overwrite: bool,
) -> Result<Published> {
    let title = title.trim();
    let content = content.trim();
    if title.is_empty() {
        bail!("Title cannot be empty.");
    }
    if content.is_empty() {
        bail!("Content cannot be empty.");
    }

    let slug = slugify(title);
    if slug.is_empty() {
        bail!("Title '{}' has no characters usable in a file name", title);
    }
    let filename = format!("{}.html", slug);
    let post = dir.join(&filename);
    if post.exists() && !overwrite {
        bail!("File {} already exists", post.display());
    }

    std::fs::write(&post, render_post(title, content, published))
        .with_context(|| format!("Failed to write {}", post.display()))?;
    log::info!("Created {}", post.display());

    let index = dir.join("index.html");
    let index_html = std::fs::read_to_string(&index)
        .with_context(|| format!("Failed to read {}", index.display()))?;
    let updated = insert_into_index(&index_html, &index_entry(&filename, title, content))?;
    std::fs::write(&index, updated)
        .with_context(|| format!("Failed to write {}", index.display()))?;
    log::info!("Updated {} with new post link", index.display());

    Ok(Published { post, index })
}
