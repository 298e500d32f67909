//! Global constants for comic image detection.

/// Minimum rendered width in CSS pixels
pub const MIN_RENDERED_WIDTH: f64 = 160.0;

/// Minimum rendered height in CSS pixels
pub const MIN_RENDERED_HEIGHT: f64 = 160.0;

/// Minimum rendered area in square CSS pixels
pub const MIN_RENDERED_AREA: f64 = 42_000.0;

/// Minimum intrinsic width in source pixels
pub const MIN_NATURAL_WIDTH: f64 = 260.0;

/// Minimum intrinsic height in source pixels
pub const MIN_NATURAL_HEIGHT: f64 = 260.0;

/// Narrowest accepted width/height ratio (tall manga strips)
pub const MIN_ASPECT_RATIO: f64 = 0.28;

/// Widest accepted width/height ratio
pub const MAX_ASPECT_RATIO: f64 = 3.5;

/// Number of elements, starting with the image itself, whose id/class/aria-label
/// are searched for exclusion keywords
pub const CONTEXT_DEPTH: usize = 4;

/// Border-radius percentage at or above which an image counts as round
pub const ROUND_PERCENT: f64 = 40.0;

/// Top-left radius, as a fraction of the shorter rendered side, at or above
/// which an image counts as round
pub const ROUND_SIDE_FRACTION: f64 = 0.35;

/// Pattern of names that mark non-comic images
pub const EXCLUDED_KEYWORDS: &str =
    r"(?i)(avatar|icon|logo|emoji|emoticon|sprite|thumb|thumbnail|favicon|profile|userpic|badge)";

/// Pattern of URL words that mark comic content
pub const COMIC_KEYWORDS: &str = r"(?i)(comic|manga|manhua|manhwa|chapter|panel|page|raw)";

/// Data attribute carrying an image's binding key
pub const BINDING_ATTRIBUTE: &str = "data-panel-lens";

/// CSS class of the floating control
pub const CONTROL_CLASS: &str = "panel-lens-btn";
