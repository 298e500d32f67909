//! The host document, as seen by the detector.
//!
//! Everything the crate reads from or writes to a page goes through [`Page`].
//! The browser implementation lives in `web`; [`crate::fixture::FixturePage`]
//! is an in-memory document for tests and offline probing.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;

use crate::error::LensError;

/// Bounding box in viewport coordinates (CSS pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Left edge
    pub left: f64,
    /// Top edge
    pub top: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Width times height.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Shorter of the two sides.
    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }
}

/// Computed corner radii, as the CSS engine reports them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CornerStyle {
    /// The `border-radius` shorthand (e.g. `"50%"`, `"8px 8px 0px 0px"`)
    pub border_radius: String,
    /// The `border-top-left-radius` longhand
    pub top_left: String,
}

/// Naming attributes of an element used for keyword matching.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameAttributes {
    /// `id`
    pub id: String,
    /// `class` (space separated)
    pub class: String,
    /// `aria-label`
    pub aria_label: String,
}

impl NameAttributes {
    /// Lower-cased `"<id> <class> <aria-label>"`.
    pub fn match_text(&self) -> String {
        format!("{} {} {}", self.id, self.class, self.aria_label).to_lowercase()
    }
}

/// Identity of a binding, stored as the marker on its image.
pub type BindingKey = u32;

/// Handle of a scheduled timer.
pub type TimerId = u32;

/// Pointer and activation events delivered for a bound image or its control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingEvent {
    /// Pointer entered the image or the control
    PointerEnter,
    /// Pointer left the image or the control
    PointerLeave,
    /// The control was clicked
    Activate,
}

/// Receiver of a binding's events.
pub type EventSink = Rc<dyn Fn(BindingEvent)>;

/// A unit of work for the page's event loop.
pub type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

/// Access to a live document.
///
/// All methods take `&self`; implementations use interior mutability where
/// they need it. Callbacks handed to the page (sinks, timer tasks) are never
/// invoked from inside a `Page` method call.
pub trait Page {
    /// An element in the document.
    type Node: Clone + PartialEq + 'static;
    /// The floating control created by [`Page::create_control`].
    type Control: Clone + 'static;
    /// Handle of a running insertion observer.
    type Subscription;

    // --- reads ---

    /// Whether the node is an `<img>` element.
    fn is_image(&self, node: &Self::Node) -> bool;
    /// Whether the node is attached to the document.
    fn is_connected(&self, node: &Self::Node) -> bool;
    /// Rendered bounding box in viewport coordinates.
    fn bounding_rect(&self, node: &Self::Node) -> Rect;
    /// Intrinsic size `(width, height)`; zero when not yet decoded.
    fn natural_size(&self, node: &Self::Node) -> (f64, f64);
    /// `currentSrc`, falling back to `src`.
    fn current_source(&self, node: &Self::Node) -> String;
    /// Resolved `src`.
    fn source(&self, node: &Self::Node) -> String;
    /// `alt` text.
    fn alt_text(&self, node: &Self::Node) -> String;
    /// id, class and aria-label.
    fn name_attributes(&self, node: &Self::Node) -> NameAttributes;
    /// Parent element, if any.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    /// Computed corner radii.
    fn corner_style(&self, node: &Self::Node) -> CornerStyle;
    /// Document scroll offset `(x, y)`.
    fn scroll_offset(&self) -> (f64, f64);
    /// Page origin, `"<scheme>://<hostname>"`.
    fn origin(&self) -> String;
    /// Image elements inside the node's subtree, excluding the node itself.
    fn images_within(&self, node: &Self::Node) -> Vec<Self::Node>;
    /// Every image element in the document.
    fn document_images(&self) -> Vec<Self::Node>;

    // --- binding marker ---

    /// Binding key stored on the image, if it is bound.
    fn binding_key(&self, node: &Self::Node) -> Option<BindingKey>;
    /// Store the binding key on the image.
    fn mark_bound(&self, node: &Self::Node, key: BindingKey);

    // --- writes ---

    /// Create a hidden control appended to the document body.
    fn create_control(&self, label: &str, z_index: i32) -> Result<Self::Control, LensError>;
    /// Set the control's text.
    fn set_label(&self, control: &Self::Control, label: &str);
    /// Show or hide the control.
    fn set_visible(&self, control: &Self::Control, visible: bool);
    /// Move the control to document coordinates.
    fn place(&self, control: &Self::Control, left: f64, top: f64);
    /// Replace the image's source.
    fn set_source(&self, node: &Self::Node, url: &str);
    /// Deliver pointer events of the image and control, and clicks on the control, to `sink`.
    fn wire(
        &self,
        image: &Self::Node,
        control: &Self::Control,
        sink: EventSink,
    ) -> Result<(), LensError>;

    // --- timers ---

    /// Run `task` once after `delay`.
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerId;
    /// Cancel a timer. Unknown or already fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);

    /// Run a future on the page's event loop. It is polled after the
    /// current call returns.
    fn spawn_local(&self, task: LocalTask);

    // --- observation ---

    /// Report inserted elements to `sink` until disconnected: one call per
    /// mutation batch, elements in insertion order. Non-element nodes are
    /// not reported.
    fn observe_insertions(
        &self,
        sink: Rc<dyn Fn(Vec<Self::Node>)>,
    ) -> Result<Self::Subscription, LensError>;
    /// Stop an insertion observer.
    fn disconnect(&self, subscription: Self::Subscription);
}
