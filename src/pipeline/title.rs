//! Logical title of the page and the artifact base name derived from it.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

/// Base name used when the page offers no usable title.
pub const FALLBACK_BASENAME: &str = "behance_project";

/// Separator between the project name and the site name in `<title>`.
const SITE_MARKER: &str = ":: Behance";

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

/// Elements that carry the project title, most specific first.
static HEADING_SELS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [r#"[data-id="project-title"]"#, ".Project-title"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

/// Find the page's logical title.
///
/// Order: the `<title>` text before the site marker, then the project-title
/// heading elements, then the bare `<title>`, then [`FALLBACK_BASENAME`].
pub fn document_title(html: &Html) -> String {
    let head_title = html
        .select(&TITLE_SEL)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()));

    if let Some(ref title) = head_title {
        if let Some((project, _)) = title.split_once(SITE_MARKER) {
            let project = project.trim();
            if !project.is_empty() {
                return project.to_string();
            }
        }
    }

    for sel in HEADING_SELS.iter() {
        if let Some(el) = html.select(sel).next() {
            let text = collapse_whitespace(&el.text().collect::<String>());
            if !text.is_empty() {
                return text;
            }
        }
    }

    head_title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| FALLBACK_BASENAME.to_string())
}

/// Reduce a title to lowercase ASCII letters, digits and underscores.
///
/// Each whitespace character becomes one underscore; each run of other
/// characters (punctuation, symbols, non-ASCII letters) becomes one
/// underscore. Returns [`FALLBACK_BASENAME`] if nothing usable remains.
pub fn sanitize_basename(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_symbol_run = false;

    for ch in title.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            in_symbol_run = false;
        } else if ch.is_whitespace() {
            out.push('_');
            in_symbol_run = false;
        } else if !in_symbol_run {
            out.push('_');
            in_symbol_run = true;
        }
    }

    if out.chars().all(|c| c == '_') {
        FALLBACK_BASENAME.to_string()
    } else {
        out
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitises_punctuation_and_spaces() {
        assert_eq!(
            sanitize_basename("My Cool Project!! 2024"),
            "my_cool_project__2024"
        );
    }

    #[test]
    fn sanitises_non_ascii() {
        assert_eq!(sanitize_basename("Café Noir"), "caf__noir");
        assert_eq!(sanitize_basename("Brand/Identity"), "brand_identity");
    }

    #[test]
    fn empty_title_falls_back() {
        assert_eq!(sanitize_basename(""), FALLBACK_BASENAME);
        assert_eq!(sanitize_basename("!!!"), FALLBACK_BASENAME);
    }

    #[test]
    fn title_before_site_marker() {
        let html = Html::parse_document(
            "<html><head><title>Neon Posters :: Behance</title></head><body></body></html>",
        );
        assert_eq!(document_title(&html), "Neon Posters");
    }

    #[test]
    fn heading_when_marker_missing() {
        let html = Html::parse_document(
            r#"<html><head><title>Something else</title></head>
               <body><h1 data-id="project-title">  Type
               Specimen </h1></body></html>"#,
        );
        assert_eq!(document_title(&html), "Type Specimen");
    }

    #[test]
    fn legacy_heading_class() {
        let html = Html::parse_document(
            r#"<html><body><div class="Project-title">Old Layout</div></body></html>"#,
        );
        assert_eq!(document_title(&html), "Old Layout");
    }

    #[test]
    fn bare_title_then_fallback() {
        let html = Html::parse_document("<html><head><title>Plain</title></head></html>");
        assert_eq!(document_title(&html), "Plain");

        let html = Html::parse_document("<html><body></body></html>");
        assert_eq!(document_title(&html), FALLBACK_BASENAME);
    }
}
