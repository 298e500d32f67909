//! Decides whether an image is a translatable comic page.
//!
//! Gates run in a fixed order and the first failing gate decides. Layout gates
//! come first so obviously ineligible images never pay for URL decoding or the
//! ancestor walk.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{
    COMIC_KEYWORDS, EXCLUDED_KEYWORDS, MAX_ASPECT_RATIO, MIN_ASPECT_RATIO, MIN_NATURAL_HEIGHT,
    MIN_NATURAL_WIDTH, MIN_RENDERED_AREA, MIN_RENDERED_HEIGHT, MIN_RENDERED_WIDTH,
};
use crate::page::Page;
use crate::signals::{Geometry, Snapshot, TextSignals, is_roundish};

static EXCLUDED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(EXCLUDED_KEYWORDS).expect("valid exclusion pattern"));
static COMIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(COMIC_KEYWORDS).expect("valid comic pattern"));
static SVG_EXTENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.svg(\?|#|$)").expect("valid svg pattern"));

/// Where an exclusion keyword was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordSource {
    /// The image URL
    Url,
    /// The alt text
    Alt,
    /// id/class/aria-label of the image or a near ancestor
    Context,
}

/// Why an image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not an image, or not attached to the document
    NotEligible,
    /// Rendered too small (thumbnail)
    TooSmall,
    /// Scrolled entirely above or left of the viewport
    OffScreen,
    /// Intrinsic resolution too low
    LowResolution,
    /// Banner or extreme strip
    AspectRatio,
    /// No source URL
    MissingSource,
    /// SVG image
    VectorGraphic,
    /// Named like an avatar, icon, logo...
    ExcludedKeyword(KeywordSource),
    /// Round like an avatar, and the URL does not say comic
    RoundAvatar,
}

impl Rejection {
    /// Short name for logs and report output.
    pub fn name(&self) -> &'static str {
        match self {
            Rejection::NotEligible => "not-eligible",
            Rejection::TooSmall => "too-small",
            Rejection::OffScreen => "off-screen",
            Rejection::LowResolution => "low-resolution",
            Rejection::AspectRatio => "aspect-ratio",
            Rejection::MissingSource => "missing-source",
            Rejection::VectorGraphic => "vector-graphic",
            Rejection::ExcludedKeyword(KeywordSource::Url) => "excluded-keyword:url",
            Rejection::ExcludedKeyword(KeywordSource::Alt) => "excluded-keyword:alt",
            Rejection::ExcludedKeyword(KeywordSource::Context) => "excluded-keyword:context",
            Rejection::RoundAvatar => "round-avatar",
        }
    }
}

/// Outcome of classifying one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Looks like a comic page
    Translatable,
    /// Rejected by a gate
    Rejected(Rejection),
}

impl Verdict {
    /// True for [`Verdict::Translatable`].
    pub fn is_translatable(&self) -> bool {
        matches!(self, Verdict::Translatable)
    }

    fn from_gates(result: Result<(), Rejection>) -> Self {
        match result {
            Ok(()) => Verdict::Translatable,
            Err(rejection) => Verdict::Rejected(rejection),
        }
    }
}

/// Classify a live image. Reads the page afresh on every call.
pub fn classify<P: Page>(page: &P, node: &P::Node) -> Verdict {
    let verdict = Verdict::from_gates(run_gates(page, node));
    if let Verdict::Rejected(rejection) = verdict {
        log::trace!(
            "Rejected {}: {}",
            page.current_source(node),
            rejection.name()
        );
    }
    verdict
}

/// Shorthand for `classify(page, node).is_translatable()`.
pub fn is_translatable<P: Page>(page: &P, node: &P::Node) -> bool {
    classify(page, node).is_translatable()
}

/// Classify already captured signals.
pub fn classify_snapshot(snapshot: &Snapshot) -> Verdict {
    Verdict::from_gates((|| {
        check_geometry(&snapshot.geometry)?;
        check_text(&snapshot.text)?;
        check_shape(snapshot.is_roundish, &snapshot.text.decoded_url)
    })())
}

fn run_gates<P: Page>(page: &P, node: &P::Node) -> Result<(), Rejection> {
    let geometry = Geometry::read(page, node).ok_or(Rejection::NotEligible)?;
    check_geometry(&geometry)?;

    let text = TextSignals::read(page, node);
    check_text(&text)?;

    let roundish = is_roundish(&page.corner_style(node), &geometry.rendered);
    check_shape(roundish, &text.decoded_url)
}

fn check_geometry(geometry: &Geometry) -> Result<(), Rejection> {
    let rect = &geometry.rendered;
    if rect.width < MIN_RENDERED_WIDTH
        || rect.height < MIN_RENDERED_HEIGHT
        || rect.area() < MIN_RENDERED_AREA
    {
        return Err(Rejection::TooSmall);
    }
    if rect.bottom() <= 0.0 || rect.right() <= 0.0 {
        return Err(Rejection::OffScreen);
    }
    if geometry.natural_width < MIN_NATURAL_WIDTH || geometry.natural_height < MIN_NATURAL_HEIGHT
    {
        return Err(Rejection::LowResolution);
    }
    let ratio = geometry.aspect_ratio();
    if !(MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&ratio) {
        return Err(Rejection::AspectRatio);
    }
    Ok(())
}

fn check_text(text: &TextSignals) -> Result<(), Rejection> {
    let url = text.decoded_url.as_str();
    if url.is_empty() {
        return Err(Rejection::MissingSource);
    }
    if is_vector_url(url) {
        return Err(Rejection::VectorGraphic);
    }
    if has_excluded_keyword(url) {
        return Err(Rejection::ExcludedKeyword(KeywordSource::Url));
    }
    if has_excluded_keyword(&text.alt_text) {
        return Err(Rejection::ExcludedKeyword(KeywordSource::Alt));
    }
    if has_excluded_keyword(&text.context_text) {
        return Err(Rejection::ExcludedKeyword(KeywordSource::Context));
    }
    Ok(())
}

fn check_shape(roundish: bool, url: &str) -> Result<(), Rejection> {
    if roundish && !has_comic_keyword(url) {
        return Err(Rejection::RoundAvatar);
    }
    Ok(())
}

/// Whether a URL points at an SVG, by data-URI type or file extension.
pub fn is_vector_url(url: &str) -> bool {
    url.to_ascii_lowercase().starts_with("data:image/svg") || SVG_EXTENSION_RE.is_match(url)
}

/// Whether text contains an exclusion keyword.
pub fn has_excluded_keyword(text: &str) -> bool {
    EXCLUDED_RE.is_match(text)
}

/// Whether a URL contains a comic-affirming keyword.
pub fn has_comic_keyword(url: &str) -> bool {
    COMIC_RE.is_match(url)
}
