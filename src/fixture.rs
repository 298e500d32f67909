//! In-memory document for tests and offline probing.
//!
//! [`FixturePage`] implements [`Page`] over a small element tree. Time is
//! virtual: timers only fire from [`FixturePage::advance`], and spawned tasks
//! only run from [`FixturePage::run_tasks`] (which every event helper calls).
//! Documents can be built in code or loaded from JSON:
//!
//! ```json
//! {
//!   "origin": "https://reader.example",
//!   "body": [
//!     { "tag": "div", "class": "reader", "children": [
//!       { "tag": "img", "src": "https://cdn.example/ch12/p03.jpg",
//!         "rect": { "left": 0, "top": 0, "width": 300, "height": 300 },
//!         "natural": [800, 800] }
//!     ] }
//!   ]
//! }
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use serde::Deserialize;

use crate::classify::{Rejection, Verdict, classify_snapshot};
use crate::error::LensError;
use crate::page::{
    BindingEvent, BindingKey, CornerStyle, EventSink, LocalTask, NameAttributes, Page, Rect,
    TimerId,
};
use crate::signals::Snapshot;

/// Element handle in a [`FixturePage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Control handle in a [`FixturePage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(usize);

/// Description of an element and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FixtureElement {
    /// Tag name, `"img"` for images
    pub tag: String,
    /// `id` attribute
    pub id: String,
    /// `class` attribute
    pub class: String,
    /// `aria-label` attribute
    pub aria_label: String,
    /// Resolved `src`
    pub src: String,
    /// `currentSrc`, when it differs from `src`
    pub current_src: String,
    /// `alt` text
    pub alt: String,
    /// Rendered box in viewport coordinates
    pub rect: Rect,
    /// Intrinsic size; `(0, 0)` when not decoded
    pub natural: (f64, f64),
    /// Computed `border-radius`
    pub border_radius: String,
    /// Computed `border-top-left-radius`; defaults to the first `border-radius` value
    pub top_left_radius: String,
    /// Child elements
    pub children: Vec<FixtureElement>,
}

impl FixtureElement {
    /// An `<img>` with the given source, rendered box and intrinsic size.
    pub fn image(src: &str, rect: Rect, natural: (f64, f64)) -> Self {
        Self {
            tag: "img".to_string(),
            src: src.to_string(),
            rect,
            natural,
            ..Self::default()
        }
    }

    /// A non-image element.
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    /// Set the `id`.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Set the `class`.
    pub fn with_class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    /// Set the `aria-label`.
    pub fn with_aria_label(mut self, label: &str) -> Self {
        self.aria_label = label.to_string();
        self
    }

    /// Set the `alt` text.
    pub fn with_alt(mut self, alt: &str) -> Self {
        self.alt = alt.to_string();
        self
    }

    /// Set the computed `border-radius`.
    pub fn with_radius(mut self, radius: &str) -> Self {
        self.border_radius = radius.to_string();
        self
    }

    /// Append a child.
    pub fn with_child(mut self, child: FixtureElement) -> Self {
        self.children.push(child);
        self
    }
}

/// A whole document: origin, scroll position and body content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FixtureDocument {
    /// Page origin, `scheme://host`
    pub origin: String,
    /// Scroll offset `(x, y)`
    pub scroll: (f64, f64),
    /// Children of `<body>`
    pub body: Vec<FixtureElement>,
}

impl Default for FixtureDocument {
    fn default() -> Self {
        Self {
            origin: "https://comics.example".to_string(),
            scroll: (0.0, 0.0),
            body: Vec::new(),
        }
    }
}

/// Observable state of a control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlView {
    /// Current text
    pub label: String,
    /// Whether it is shown
    pub visible: bool,
    /// Document x coordinate
    pub left: f64,
    /// Document y coordinate
    pub top: f64,
    /// Stacking order
    pub z_index: i32,
}

struct NodeData {
    element: FixtureElement,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    connected: bool,
    binding: Option<BindingKey>,
}

struct Timer {
    id: TimerId,
    deadline: u64,
    task: Box<dyn FnOnce()>,
}

/// In-memory [`Page`] with a virtual clock.
pub struct FixturePage {
    nodes: RefCell<Vec<NodeData>>,
    controls: RefCell<Vec<ControlView>>,
    origin: String,
    scroll: Cell<(f64, f64)>,
    image_sinks: RefCell<HashMap<NodeId, EventSink>>,
    control_sinks: RefCell<HashMap<ControlId, EventSink>>,
    timers: RefCell<Vec<Timer>>,
    next_timer: Cell<TimerId>,
    now_ms: Cell<u64>,
    tasks: RefCell<Vec<LocalTask>>,
    observers: RefCell<HashMap<u32, Rc<dyn Fn(Vec<NodeId>)>>>,
    next_observer: Cell<u32>,
}

impl FixturePage {
    /// An empty document with the given origin.
    pub fn new(origin: &str) -> Self {
        let body = NodeData {
            element: FixtureElement::element("body"),
            parent: None,
            children: Vec::new(),
            connected: true,
            binding: None,
        };
        Self {
            nodes: RefCell::new(vec![body]),
            controls: RefCell::new(Vec::new()),
            origin: origin.to_string(),
            scroll: Cell::new((0.0, 0.0)),
            image_sinks: RefCell::new(HashMap::new()),
            control_sinks: RefCell::new(HashMap::new()),
            timers: RefCell::new(Vec::new()),
            next_timer: Cell::new(1),
            now_ms: Cell::new(0),
            tasks: RefCell::new(Vec::new()),
            observers: RefCell::new(HashMap::new()),
            next_observer: Cell::new(1),
        }
    }

    /// Build a page from a document description.
    pub fn from_document(document: FixtureDocument) -> Self {
        let page = Self::new(&document.origin);
        page.scroll.set(document.scroll);
        for element in document.body {
            page.build(Some(page.body()), element, true);
        }
        page
    }

    /// Parse a JSON document description.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_document(serde_json::from_str(json)?))
    }

    /// The `<body>` element.
    pub fn body(&self) -> NodeId {
        NodeId(0)
    }

    /// Insert a subtree under `parent` and report it as one mutation batch.
    pub fn append(&self, parent: NodeId, element: FixtureElement) -> NodeId {
        self.append_all(parent, vec![element])[0]
    }

    /// Insert several subtrees under `parent` and report them as one mutation batch.
    pub fn append_all(&self, parent: NodeId, elements: Vec<FixtureElement>) -> Vec<NodeId> {
        let connected = self.with_node(parent, |n| n.connected);
        let roots: Vec<NodeId> = elements
            .into_iter()
            .map(|element| self.build(Some(parent), element, connected))
            .collect();
        if connected {
            self.notify(roots.clone());
        }
        roots
    }

    /// Create a subtree that is not attached to the document.
    pub fn create_detached(&self, element: FixtureElement) -> NodeId {
        self.build(None, element, false)
    }

    /// Detach a subtree from the document.
    pub fn remove(&self, node: NodeId) {
        let parent = self.with_node(node, |n| n.parent);
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = parent {
            nodes[parent.0].children.retain(|c| *c != node);
        }
        nodes[node.0].parent = None;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            nodes[current.0].connected = false;
            stack.extend(nodes[current.0].children.iter().copied());
        }
    }

    /// Copy of an element's attributes (without children).
    pub fn element(&self, node: NodeId) -> FixtureElement {
        self.with_node(node, |n| n.element.clone())
    }

    /// Change an element's attributes in place.
    pub fn modify(&self, node: NodeId, f: impl FnOnce(&mut FixtureElement)) {
        f(&mut self.nodes.borrow_mut()[node.0].element);
    }

    /// Set the document scroll offset.
    pub fn set_scroll(&self, x: f64, y: f64) {
        self.scroll.set((x, y));
    }

    /// Pointer enters an image.
    pub fn pointer_enter(&self, image: NodeId) {
        self.dispatch_image(image, BindingEvent::PointerEnter);
    }

    /// Pointer leaves an image.
    pub fn pointer_leave(&self, image: NodeId) {
        self.dispatch_image(image, BindingEvent::PointerLeave);
    }

    /// Pointer enters a control.
    pub fn control_enter(&self, control: ControlId) {
        self.dispatch_control(control, BindingEvent::PointerEnter);
    }

    /// Pointer leaves a control.
    pub fn control_leave(&self, control: ControlId) {
        self.dispatch_control(control, BindingEvent::PointerLeave);
    }

    /// Click a control.
    pub fn click(&self, control: ControlId) {
        self.dispatch_control(control, BindingEvent::Activate);
    }

    /// Move the clock forward, firing due timers in deadline order.
    pub fn advance(&self, ms: u64) {
        let target = self.now_ms.get() + ms;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let due = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| (t.deadline, t.id))
                    .map(|(i, _)| i);
                due.map(|i| timers.remove(i))
            };
            let Some(timer) = next else {
                break;
            };
            self.now_ms.set(timer.deadline);
            (timer.task)();
            self.run_tasks();
        }
        self.now_ms.set(target);
    }

    /// Virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    /// Number of timers scheduled and not yet fired or cleared.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Poll spawned tasks until none makes progress. Returns how many are still pending.
    pub fn run_tasks(&self) -> usize {
        let mut cx = Context::from_waker(Waker::noop());
        loop {
            let batch = std::mem::take(&mut *self.tasks.borrow_mut());
            if batch.is_empty() {
                break;
            }
            let mut finished = false;
            let mut pending = Vec::new();
            for mut task in batch {
                match task.as_mut().poll(&mut cx) {
                    Poll::Ready(()) => finished = true,
                    Poll::Pending => pending.push(task),
                }
            }
            let spawned = !self.tasks.borrow().is_empty();
            self.tasks.borrow_mut().extend(pending);
            if !finished && !spawned {
                break;
            }
        }
        self.tasks.borrow().len()
    }

    /// Observable state of a control.
    pub fn control_view(&self, control: ControlId) -> Option<ControlView> {
        self.controls.borrow().get(control.0).cloned()
    }

    /// Number of controls created.
    pub fn control_count(&self) -> usize {
        self.controls.borrow().len()
    }

    /// Number of active insertion observers.
    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&NodeData) -> R) -> R {
        f(&self.nodes.borrow()[node.0])
    }

    fn build(
        &self,
        parent: Option<NodeId>,
        mut element: FixtureElement,
        connected: bool,
    ) -> NodeId {
        let children = std::mem::take(&mut element.children);
        let id = {
            let mut nodes = self.nodes.borrow_mut();
            let id = NodeId(nodes.len());
            nodes.push(NodeData {
                element,
                parent,
                children: Vec::new(),
                connected,
                binding: None,
            });
            if let Some(parent) = parent {
                nodes[parent.0].children.push(id);
            }
            id
        };
        for child in children {
            self.build(Some(id), child, connected);
        }
        id
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = nodes[node.0].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    fn notify(&self, roots: Vec<NodeId>) {
        let observers: Vec<_> = self.observers.borrow().values().cloned().collect();
        for observer in observers {
            observer(roots.clone());
        }
    }

    fn dispatch_image(&self, image: NodeId, event: BindingEvent) {
        let sink = self.image_sinks.borrow().get(&image).cloned();
        if let Some(sink) = sink {
            sink(event);
            self.run_tasks();
        }
    }

    fn dispatch_control(&self, control: ControlId, event: BindingEvent) {
        let sink = self.control_sinks.borrow().get(&control).cloned();
        if let Some(sink) = sink {
            sink(event);
            self.run_tasks();
        }
    }

    fn with_control(&self, control: ControlId, f: impl FnOnce(&mut ControlView)) {
        if let Some(view) = self.controls.borrow_mut().get_mut(control.0) {
            f(view);
        }
    }
}

/// Verdict for one image of a document, as `lens-classify` prints it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    /// Current source of the image
    pub src: String,
    /// Classifier verdict
    pub verdict: Verdict,
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.verdict {
            Verdict::Translatable => write!(f, "{}\ttranslatable", self.src),
            Verdict::Rejected(rejection) => {
                write!(f, "{}\trejected\t{}", self.src, rejection.name())
            }
        }
    }
}

impl FixturePage {
    /// Classify every image in the document, in document order.
    ///
    /// Signals are captured once per image, so the report reflects the
    /// document at a single instant.
    pub fn report(&self) -> Vec<ReportLine> {
        self.document_images()
            .into_iter()
            .map(|image| {
                let src = self.current_source(&image);
                let verdict = match Snapshot::capture(self, &image) {
                    Some(snapshot) => classify_snapshot(&snapshot),
                    None => Verdict::Rejected(Rejection::NotEligible),
                };
                if let Verdict::Rejected(rejection) = verdict {
                    log::trace!("Rejected {}: {}", src, rejection.name());
                }
                ReportLine { src, verdict }
            })
            .collect()
    }
}

impl Page for FixturePage {
    type Node = NodeId;
    type Control = ControlId;
    type Subscription = u32;

    fn is_image(&self, node: &NodeId) -> bool {
        self.with_node(*node, |n| n.element.tag.eq_ignore_ascii_case("img"))
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        self.with_node(*node, |n| n.connected)
    }

    fn bounding_rect(&self, node: &NodeId) -> Rect {
        self.with_node(*node, |n| n.element.rect)
    }

    fn natural_size(&self, node: &NodeId) -> (f64, f64) {
        self.with_node(*node, |n| n.element.natural)
    }

    fn current_source(&self, node: &NodeId) -> String {
        self.with_node(*node, |n| {
            if n.element.current_src.is_empty() {
                n.element.src.clone()
            } else {
                n.element.current_src.clone()
            }
        })
    }

    fn source(&self, node: &NodeId) -> String {
        self.with_node(*node, |n| n.element.src.clone())
    }

    fn alt_text(&self, node: &NodeId) -> String {
        self.with_node(*node, |n| n.element.alt.clone())
    }

    fn name_attributes(&self, node: &NodeId) -> NameAttributes {
        self.with_node(*node, |n| NameAttributes {
            id: n.element.id.clone(),
            class: n.element.class.clone(),
            aria_label: n.element.aria_label.clone(),
        })
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.with_node(*node, |n| n.parent)
    }

    fn corner_style(&self, node: &NodeId) -> CornerStyle {
        self.with_node(*node, |n| {
            let border_radius = n.element.border_radius.clone();
            let top_left = if n.element.top_left_radius.is_empty() {
                border_radius
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string()
            } else {
                n.element.top_left_radius.clone()
            };
            CornerStyle {
                border_radius,
                top_left,
            }
        })
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.scroll.get()
    }

    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn images_within(&self, node: &NodeId) -> Vec<NodeId> {
        self.descendants(*node)
            .into_iter()
            .filter(|n| self.is_image(n))
            .collect()
    }

    fn document_images(&self) -> Vec<NodeId> {
        self.images_within(&self.body())
    }

    fn binding_key(&self, node: &NodeId) -> Option<BindingKey> {
        self.with_node(*node, |n| n.binding)
    }

    fn mark_bound(&self, node: &NodeId, key: BindingKey) {
        self.nodes.borrow_mut()[node.0].binding = Some(key);
    }

    fn create_control(&self, label: &str, z_index: i32) -> Result<ControlId, LensError> {
        let mut controls = self.controls.borrow_mut();
        controls.push(ControlView {
            label: label.to_string(),
            visible: false,
            left: 0.0,
            top: 0.0,
            z_index,
        });
        Ok(ControlId(controls.len() - 1))
    }

    fn set_label(&self, control: &ControlId, label: &str) {
        self.with_control(*control, |view| view.label = label.to_string());
    }

    fn set_visible(&self, control: &ControlId, visible: bool) {
        self.with_control(*control, |view| view.visible = visible);
    }

    fn place(&self, control: &ControlId, left: f64, top: f64) {
        self.with_control(*control, |view| {
            view.left = left;
            view.top = top;
        });
    }

    fn set_source(&self, node: &NodeId, url: &str) {
        self.modify(*node, |element| {
            element.src = url.to_string();
            element.current_src.clear();
        });
    }

    fn wire(&self, image: &NodeId, control: &ControlId, sink: EventSink) -> Result<(), LensError> {
        self.image_sinks.borrow_mut().insert(*image, Rc::clone(&sink));
        self.control_sinks.borrow_mut().insert(*control, sink);
        Ok(())
    }

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_timer.get();
        self.next_timer.set(id + 1);
        let deadline = self.now_ms.get() + u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.timers.borrow_mut().push(Timer { id, deadline, task });
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.timers.borrow_mut().retain(|t| t.id != id);
    }

    fn spawn_local(&self, task: LocalTask) {
        self.tasks.borrow_mut().push(task);
    }

    fn observe_insertions(&self, sink: Rc<dyn Fn(Vec<NodeId>)>) -> Result<u32, LensError> {
        let id = self.next_observer.get();
        self.next_observer.set(id + 1);
        self.observers.borrow_mut().insert(id, sink);
        Ok(id)
    }

    fn disconnect(&self, subscription: u32) {
        self.observers.borrow_mut().remove(&subscription);
    }
}
