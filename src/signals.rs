//! Signals read from a single image element.
//!
//! Reading is split in two: [`Geometry`] is cheap layout data, [`TextSignals`]
//! needs URL decoding and an ancestor walk. The classifier only reads text
//! signals for images whose geometry already passed.

use serde::Serialize;

use crate::constants::{CONTEXT_DEPTH, ROUND_PERCENT, ROUND_SIDE_FRACTION};
use crate::page::{CornerStyle, Page, Rect};

/// Layout signals of an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geometry {
    /// Rendered bounding box
    pub rendered: Rect,
    /// Intrinsic width, or rendered width when the image has not decoded yet
    pub natural_width: f64,
    /// Intrinsic height, or rendered height when the image has not decoded yet
    pub natural_height: f64,
}

impl Geometry {
    /// Read layout signals. `None` when the node is not an image or is detached.
    pub fn read<P: Page>(page: &P, node: &P::Node) -> Option<Self> {
        if !page.is_image(node) || !page.is_connected(node) {
            return None;
        }
        let rendered = page.bounding_rect(node);
        let (natural_width, natural_height) = page.natural_size(node);
        Some(Self {
            rendered,
            natural_width: positive_or(natural_width, rendered.width),
            natural_height: positive_or(natural_height, rendered.height),
        })
    }

    /// Natural width over natural height; zero for a degenerate height.
    pub fn aspect_ratio(&self) -> f64 {
        if self.natural_height > 0.0 {
            self.natural_width / self.natural_height
        } else {
            0.0
        }
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// Naming signals of an image, all lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSignals {
    /// Percent-decoded current source
    pub decoded_url: String,
    /// `alt` text
    pub alt_text: String,
    /// id/class/aria-label of the image and its nearest ancestors
    pub context_text: String,
}

impl TextSignals {
    /// Read naming signals.
    pub fn read<P: Page>(page: &P, node: &P::Node) -> Self {
        Self {
            decoded_url: decode_url(&page.current_source(node)),
            alt_text: page.alt_text(node).to_lowercase(),
            context_text: context_text(page, node),
        }
    }
}

/// Everything known about an image at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Layout signals
    pub geometry: Geometry,
    /// Naming signals
    pub text: TextSignals,
    /// Whether the corners make it look like a circular avatar
    pub is_roundish: bool,
}

impl Snapshot {
    /// Read all signals at once. `None` when the node is not an eligible image.
    pub fn capture<P: Page>(page: &P, node: &P::Node) -> Option<Self> {
        let geometry = Geometry::read(page, node)?;
        Some(Self {
            is_roundish: is_roundish(&page.corner_style(node), &geometry.rendered),
            text: TextSignals::read(page, node),
            geometry,
        })
    }
}

/// Percent-decode and lower-case a URL.
///
/// A URL with a malformed escape or that decodes to invalid UTF-8 is returned
/// undecoded (still lower-cased).
pub fn decode_url(raw: &str) -> String {
    if has_malformed_escape(raw) {
        return raw.to_lowercase();
    }
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.to_lowercase(),
        Err(_) => raw.to_lowercase(),
    }
}

fn has_malformed_escape(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    })
}

/// Lower-cased id/class/aria-label of the node and up to `CONTEXT_DEPTH - 1`
/// ancestors, space separated.
pub fn context_text<P: Page>(page: &P, node: &P::Node) -> String {
    let mut parts = Vec::with_capacity(CONTEXT_DEPTH);
    let mut current = Some(node.clone());
    while let Some(element) = current {
        if parts.len() == CONTEXT_DEPTH {
            break;
        }
        parts.push(page.name_attributes(&element).match_text());
        current = page.parent(&element);
    }
    parts.join(" ")
}

/// Whether the corners approximate a circle.
///
/// True when the `border-radius` is a percentage of at least 40%, or when the
/// top-left radius in pixels reaches 35% of the shorter rendered side.
pub fn is_roundish(corners: &CornerStyle, rendered: &Rect) -> bool {
    if corners.border_radius.contains('%')
        && parse_css_number(&corners.border_radius).is_some_and(|p| p >= ROUND_PERCENT)
    {
        return true;
    }

    let top_left = corners.top_left.trim();
    if top_left.ends_with('%') {
        return false;
    }
    let min_side = rendered.min_side();
    parse_css_number(top_left)
        .is_some_and(|radius| min_side > 0.0 && radius >= min_side * ROUND_SIDE_FRACTION)
}

/// Leading number of a CSS value (`"12.5px"` → 12.5), ignoring leading whitespace.
/// `None` when the value does not start with a finite number.
pub fn parse_css_number(value: &str) -> Option<f64> {
    let s = value.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}
