//! Asset location: find the gallery's media and resolve each to its best source.
//!
//! Markup differs between template generations, so discovery runs an ordered
//! list of independent [`MatcherStrategy`]s and unions their matches. A new
//! layout is supported by adding one selector, not by touching the rest.
//!
//! Per matched `<img>` the source is chosen by priority:
//!
//! 1. `srcset` — the candidate with the highest density factor
//! 2. `data-hi-res`, `data-high-res`
//! 3. `data-src`
//! 4. `src`
//!
//! The chosen URL is normalised (transcoding marker and quality/format query
//! parameters stripped), deduplicated (first occurrence wins), and filtered
//! for non-content markers and unsupported extensions.

use crate::asset::Asset;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::input::PageDocument;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Built-in matcher strategies, in scan order.
pub const DEFAULT_STRATEGIES: &[&str] = &[
    ".ImageElement-root-kir",
    ".ImageElement-blockPointerEvents-Rkg",
    r#"img[src*="behance"]"#,
    ".js-project-image",
    ".project-cover",
    ".project-image",
];

/// Extensions accepted as gallery media.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// URL fragments that mark chrome rather than content.
pub const NON_CONTENT_MARKERS: &[&str] = &["placeholder", "logo", "avatar", "icon"];

/// Path marker the CDN inserts for transcoded variants.
const TRANSCODE_MARKER: &str = "_webp";

/// Query parameters that only select quality or output format.
const TRANSCODE_PARAMS: &[&str] = &["q", "quality", "fm", "format"];

/// Attributes holding an explicit high-resolution source, in priority order.
const DATA_ATTRS: &[&str] = &["data-hi-res", "data-high-res", "data-src"];

static IMG_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

static BUILTIN: Lazy<Vec<MatcherStrategy>> = Lazy::new(|| {
    DEFAULT_STRATEGIES
        .iter()
        .map(|css| MatcherStrategy::parse(css).unwrap())
        .collect()
});

/// `2x`, `1.5x`, `1200w`
static RE_DESCRIPTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?|\.\d+)([xXwW])$").unwrap());

/// One way of finding media elements on the page.
#[derive(Debug, Clone)]
pub struct MatcherStrategy {
    css: String,
    selector: Selector,
}

impl MatcherStrategy {
    pub fn parse(css: &str) -> Result<Self, ExtractError> {
        let selector = Selector::parse(css)
            .map_err(|e| ExtractError::InvalidConfig(format!("Invalid selector '{css}': {e}")))?;
        Ok(Self {
            css: css.to_string(),
            selector,
        })
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    /// `<img>` elements this strategy yields: the match itself if it is an
    /// image, otherwise the images inside it.
    fn images<'a>(&self, html: &'a Html) -> Vec<ElementRef<'a>> {
        let mut out = Vec::new();
        for el in html.select(&self.selector) {
            if el.value().name() == "img" {
                out.push(el);
            } else {
                out.extend(el.select(&IMG_SEL));
            }
        }
        out
    }
}

/// Scans a page for gallery assets.
#[derive(Debug, Clone)]
pub struct Locator {
    strategies: Vec<MatcherStrategy>,
}

impl Default for Locator {
    fn default() -> Self {
        Self {
            strategies: BUILTIN.clone(),
        }
    }
}

impl Locator {
    /// Built-in strategies followed by the configured extra selectors.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let mut locator = Self::default();
        for css in &config.extra_selectors {
            locator.strategies.push(MatcherStrategy::parse(css)?);
        }
        Ok(locator)
    }

    pub fn with_strategies(strategies: Vec<MatcherStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[MatcherStrategy] {
        &self.strategies
    }

    /// Locate assets in discovery order. An empty result is not an error here.
    ///
    /// Ordinals follow strategy order first, then document order within
    /// each strategy's matches.
    pub fn locate(&self, doc: &PageDocument) -> Vec<Asset> {
        let html = Html::parse_document(doc.html());
        let candidates: Vec<ElementRef<'_>> = self
            .strategies
            .iter()
            .flat_map(|s| s.images(&html))
            .collect();
        debug!(
            "{} candidate images from {} strategies",
            candidates.len(),
            self.strategies.len()
        );

        let mut seen: HashSet<String> = HashSet::new();
        let mut assets: Vec<Asset> = Vec::new();

        for img in candidates {
            let Some(raw) = best_source(&img) else {
                continue;
            };
            let Some(url) = normalize_url(&raw, doc.url()) else {
                debug!("Skipping unresolvable source: {}", raw);
                continue;
            };
            if !seen.insert(url.as_str().to_string()) {
                continue;
            }
            if is_non_content(&url) {
                debug!("Skipping non-content image: {}", url);
                continue;
            }
            let Some(extension) = accepted_extension(&url) else {
                debug!("Skipping non-image URL: {}", url);
                continue;
            };
            assets.push(Asset::new(assets.len() + 1, url, extension));
        }

        info!("Found {} unique images", assets.len());
        assets
    }
}

/// Pick the best source reference of an `<img>`.
///
/// Images without a rendered `src` are not considered at all.
pub fn best_source(img: &ElementRef<'_>) -> Option<String> {
    let el = img.value();
    let src = el.attr("src").map(str::trim).filter(|s| !s.is_empty())?;

    if let Some(url) = el.attr("srcset").and_then(highest_density_candidate) {
        return Some(url);
    }
    DATA_ATTRS
        .iter()
        .filter_map(|attr| el.attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .or(Some(src))
        .map(str::to_string)
}

/// The URL paired with the largest density factor in a `srcset`.
///
/// A candidate without a descriptor counts as `1x`. Ties keep the earlier
/// candidate.
pub fn highest_density_candidate(srcset: &str) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in srcset.split(',') {
        let mut parts = candidate.split_whitespace();
        let Some(url) = parts.next() else {
            continue;
        };
        let factor = parts.next().map(descriptor_factor).unwrap_or(1.0);
        if best.map_or(true, |(_, f)| factor > f) {
            best = Some((url, factor));
        }
    }
    best.map(|(url, _)| url.to_string())
}

fn descriptor_factor(descriptor: &str) -> f64 {
    RE_DESCRIPTOR
        .captures(descriptor)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .unwrap_or(1.0)
}

/// Resolve `raw` against `base` and strip cosmetic variant markers.
///
/// Returns `None` for anything that is not an HTTP(S) URL.
pub fn normalize_url(raw: &str, base: &Url) -> Option<Url> {
    let mut url = base.join(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    if url.path().contains(TRANSCODE_MARKER) {
        let path = url.path().replace(TRANSCODE_MARKER, "");
        url.set_path(&path);
    }

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !TRANSCODE_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.set_fragment(None);
    Some(url)
}

/// Whether the URL contains a placeholder/logo/avatar/icon marker.
pub fn is_non_content(url: &Url) -> bool {
    let s = url.as_str().to_ascii_lowercase();
    NON_CONTENT_MARKERS.iter().any(|m| s.contains(m))
}

/// The accepted extension of the URL's last path segment, if any.
pub fn accepted_extension(url: &Url) -> Option<&'static str> {
    let segment = url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ACCEPTED_EXTENSIONS
        .iter()
        .copied()
        .find(|accepted| ext.starts_with(accepted))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://www.behance.net/gallery/42/Neon-Posters";

    fn doc(body: &str) -> PageDocument {
        PageDocument::from_html(PAGE, format!("<html><body>{body}</body></html>")).unwrap()
    }

    fn urls(assets: &[Asset]) -> Vec<&str> {
        assets.iter().map(|a| a.source_url.as_str()).collect()
    }

    #[test]
    fn highest_density_wins() {
        let set = "https://cdn.x/a.jpg 1x, https://cdn.x/b.jpg 2x, https://cdn.x/c.jpg 3x";
        assert_eq!(
            highest_density_candidate(set).as_deref(),
            Some("https://cdn.x/c.jpg")
        );
    }

    #[test]
    fn width_descriptors_and_missing_descriptor() {
        let set = "a.jpg 600w, b.jpg 1400w, c.jpg 1000w";
        assert_eq!(highest_density_candidate(set).as_deref(), Some("b.jpg"));
        assert_eq!(highest_density_candidate("only.jpg").as_deref(), Some("only.jpg"));
        assert_eq!(highest_density_candidate(" , "), None);
    }

    #[test]
    fn density_tie_keeps_first() {
        assert_eq!(
            highest_density_candidate("a.jpg 2x, b.jpg 2x").as_deref(),
            Some("a.jpg")
        );
    }

    #[test]
    fn normalisation_strips_transcoding() {
        let base = Url::parse(PAGE).unwrap();
        let url = normalize_url(
            "https://mir-s3-cdn-cf.behance.net/project_modules/max_1200_webp/abc.png?q=80&fm=webp&v=2",
            &base,
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://mir-s3-cdn-cf.behance.net/project_modules/max_1200/abc.png?v=2"
        );

        let url = normalize_url("/img/a.jpg?q=90#frag", &base).unwrap();
        assert_eq!(url.as_str(), "https://www.behance.net/img/a.jpg");
    }

    #[test]
    fn non_http_sources_rejected() {
        let base = Url::parse(PAGE).unwrap();
        assert!(normalize_url("data:image/png;base64,AAAA", &base).is_none());
        assert!(normalize_url("blob:https://x/1", &base).is_none());
    }

    #[test]
    fn extension_filter() {
        let u = |s: &str| Url::parse(s).unwrap();
        assert_eq!(accepted_extension(&u("https://x/a.JPG")), Some("jpg"));
        assert_eq!(accepted_extension(&u("https://x/a.jpeg?x=1")), Some("jpeg"));
        assert_eq!(accepted_extension(&u("https://x/a.webp")), Some("webp"));
        assert_eq!(accepted_extension(&u("https://x/a.svg")), None);
        assert_eq!(accepted_extension(&u("https://x/noext")), None);
    }

    #[test]
    fn dedups_by_normalised_url_in_first_occurrence_order() {
        let d = doc(r#"
            <div class="project-image"><img src="https://cdn.behance.net/b.png"></div>
            <div class="project-image"><img src="https://cdn.behance.net/a.png?q=80"></div>
            <img class="js-project-image" src="https://cdn.behance.net/a.png">
            <img class="js-project-image" src="https://cdn.behance.net/c.jpg">
        "#);
        let assets = Locator::default().locate(&d);
        // Four matched elements (plus src*=behance re-matches), three distinct URLs.
        assert_eq!(
            urls(&assets),
            vec![
                "https://cdn.behance.net/b.png",
                "https://cdn.behance.net/a.png",
                "https://cdn.behance.net/c.jpg",
            ]
        );
        let names: Vec<_> = assets.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["image_001.png", "image_002.png", "image_003.jpg"]);
        let ordinals: Vec<_> = assets.iter().map(|a| a.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[test]
    fn markers_excluded_even_with_valid_extension() {
        let d = doc(r#"
            <div class="project-image">
              <img src="https://cdn.example.com/team-logo.png">
              <img src="https://cdn.example.com/user_avatar.jpg">
              <img src="https://cdn.example.com/placeholder.gif">
              <img src="https://cdn.example.com/icons/star.png">
              <img src="https://cdn.example.com/art.png">
            </div>
        "#);
        let assets = Locator::default().locate(&d);
        assert_eq!(urls(&assets), vec!["https://cdn.example.com/art.png"]);
        assert_eq!(assets[0].filename, "image_001.png");
    }

    #[test]
    fn source_priority() {
        let d = doc(r#"
            <div class="ImageElement-root-kir">
              <img src="https://cdn.example.com/low1.jpg"
                   srcset="https://cdn.example.com/s1.jpg 1x, https://cdn.example.com/s3.jpg 3x, https://cdn.example.com/s2.jpg 2x"
                   data-hi-res="https://cdn.example.com/hires1.jpg">
              <img src="https://cdn.example.com/low2.jpg"
                   data-high-res="https://cdn.example.com/hires2.jpg"
                   data-src="https://cdn.example.com/lazy2.jpg">
              <img src="https://cdn.example.com/low3.jpg" data-src="https://cdn.example.com/lazy3.jpg">
              <img src="https://cdn.example.com/low4.jpg">
              <img data-src="https://cdn.example.com/never.jpg">
            </div>
        "#);
        let assets = Locator::default().locate(&d);
        assert_eq!(
            urls(&assets),
            vec![
                "https://cdn.example.com/s3.jpg",
                "https://cdn.example.com/hires2.jpg",
                "https://cdn.example.com/lazy3.jpg",
                "https://cdn.example.com/low4.jpg",
            ]
        );
    }

    #[test]
    // Strategy order wins over document order.
    fn strategies_union_across_layouts() {
        let d = doc(r#"
            <div class="ImageElement-blockPointerEvents-Rkg"><img src="/m/one.jpg"></div>
            <div class="project-cover"><picture><img src="/m/two.png"></picture></div>
            <img src="https://mir-s3-cdn-cf.behance.net/three.gif">
            <img src="https://unrelated.example.com/skip.jpg">
        "#);
        let assets = Locator::default().locate(&d);
        assert_eq!(
            urls(&assets),
            vec![
                "https://www.behance.net/m/one.jpg",
                "https://mir-s3-cdn-cf.behance.net/three.gif",
                "https://www.behance.net/m/two.png",
            ]
        );
    }

    #[test]
    fn extra_selector_extends_scan() {
        let d = doc(r#"<figure class="Gallery-item"><img src="https://cdn.example.com/x.webp"></figure>"#);
        assert!(Locator::default().locate(&d).is_empty());

        let config = ExtractionConfig::builder()
            .extra_selector(".Gallery-item")
            .build()
            .unwrap();
        let locator = Locator::from_config(&config).unwrap();
        assert_eq!(locator.strategies().len(), DEFAULT_STRATEGIES.len() + 1);
        let assets = locator.locate(&d);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].filename, "image_001.webp");
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(Locator::default().locate(&doc("<p>no images</p>")).is_empty());
    }
}
