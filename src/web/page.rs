//! [`Page`] over the live browser document.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, EventTarget, HtmlButtonElement, HtmlElement, HtmlImageElement,
    MutationObserver, MutationObserverInit, MutationRecord, NodeList, Window,
};

use super::js_error;
use crate::constants::{BINDING_ATTRIBUTE, CONTROL_CLASS};
use crate::error::LensError;
use crate::page::{
    BindingEvent, BindingKey, CornerStyle, EventSink, LocalTask, NameAttributes, Page, Rect,
    TimerId,
};

struct TimerSlot {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

/// Timer closures stay here until they fire or are cleared. A fired timer is
/// only recorded; its closure is released on the next timer call, never while
/// it is running.
#[derive(Default)]
struct TimerTable {
    slots: HashMap<TimerId, TimerSlot>,
    fired: Vec<TimerId>,
    running: Option<TimerId>,
    next_id: TimerId,
}

impl TimerTable {
    fn sweep(&mut self) -> Vec<TimerSlot> {
        let running = self.running;
        let mut released = Vec::new();
        for id in mem::take(&mut self.fired) {
            if Some(id) == running {
                self.fired.push(id);
            } else if let Some(slot) = self.slots.remove(&id) {
                released.push(slot);
            }
        }
        released
    }
}

struct Observer {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

/// The document the content script runs in.
pub struct WebPage {
    window: Window,
    document: Document,
    body: HtmlElement,
    timers: Rc<RefCell<TimerTable>>,
    listeners: RefCell<Vec<Closure<dyn FnMut(Event)>>>,
    observers: RefCell<HashMap<u32, Observer>>,
    next_observer: Cell<u32>,
}

impl WebPage {
    /// Bind to the current window's document.
    pub fn new() -> Result<Self, LensError> {
        let window = web_sys::window().ok_or(LensError::MissingGlobal("window"))?;
        let document = window
            .document()
            .ok_or(LensError::MissingGlobal("document"))?;
        let body = document.body().ok_or(LensError::MissingGlobal("body"))?;
        Ok(Self {
            window,
            document,
            body,
            timers: Rc::new(RefCell::new(TimerTable {
                next_id: 1,
                ..TimerTable::default()
            })),
            listeners: RefCell::new(Vec::new()),
            observers: RefCell::new(HashMap::new()),
            next_observer: Cell::new(1),
        })
    }

    fn listen(
        &self,
        target: &EventTarget,
        event_type: &str,
        sink: &EventSink,
        event: BindingEvent,
    ) -> Result<(), LensError> {
        let sink = Rc::clone(sink);
        let callback = Closure::wrap(Box::new(move |e: Event| {
            if event == BindingEvent::Activate {
                e.prevent_default();
                e.stop_propagation();
            }
            sink(event);
        }) as Box<dyn FnMut(Event)>);
        target
            .add_event_listener_with_callback(event_type, callback.as_ref().unchecked_ref())
            .map_err(|e| js_error(event_type, e))?;
        self.listeners.borrow_mut().push(callback);
        Ok(())
    }

    fn style(&self, control: &HtmlButtonElement, property: &str, value: &str) {
        if let Err(e) = control.style().set_property(property, value) {
            log::warn!("Failed to set {} on control: {:?}", property, e);
        }
    }

    fn release_fired_timers(&self) {
        let released = self.timers.borrow_mut().sweep();
        drop(released);
    }
}

fn elements(list: NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn attribute(node: &Element, name: &str) -> String {
    node.get_attribute(name).unwrap_or_default()
}

impl Page for WebPage {
    type Node = Element;
    type Control = HtmlButtonElement;
    type Subscription = u32;

    fn is_image(&self, node: &Element) -> bool {
        node.dyn_ref::<HtmlImageElement>().is_some()
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn bounding_rect(&self, node: &Element) -> Rect {
        let rect = node.get_bounding_client_rect();
        Rect::new(rect.left(), rect.top(), rect.width(), rect.height())
    }

    fn natural_size(&self, node: &Element) -> (f64, f64) {
        match node.dyn_ref::<HtmlImageElement>() {
            Some(image) => (image.natural_width().into(), image.natural_height().into()),
            None => (0.0, 0.0),
        }
    }

    fn current_source(&self, node: &Element) -> String {
        match node.dyn_ref::<HtmlImageElement>() {
            Some(image) => {
                let current = image.current_src();
                if current.is_empty() { image.src() } else { current }
            }
            None => String::new(),
        }
    }

    fn source(&self, node: &Element) -> String {
        node.dyn_ref::<HtmlImageElement>()
            .map(HtmlImageElement::src)
            .unwrap_or_default()
    }

    fn alt_text(&self, node: &Element) -> String {
        attribute(node, "alt")
    }

    fn name_attributes(&self, node: &Element) -> NameAttributes {
        NameAttributes {
            id: node.id(),
            class: attribute(node, "class"),
            aria_label: attribute(node, "aria-label"),
        }
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn corner_style(&self, node: &Element) -> CornerStyle {
        match self.window.get_computed_style(node) {
            Ok(Some(style)) => CornerStyle {
                border_radius: style.get_property_value("border-radius").unwrap_or_default(),
                top_left: style
                    .get_property_value("border-top-left-radius")
                    .unwrap_or_default(),
            },
            _ => CornerStyle::default(),
        }
    }

    fn scroll_offset(&self) -> (f64, f64) {
        (
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
        )
    }

    fn origin(&self) -> String {
        let location = self.window.location();
        format!(
            "{}//{}",
            location.protocol().unwrap_or_default(),
            location.hostname().unwrap_or_default()
        )
    }

    fn images_within(&self, node: &Element) -> Vec<Element> {
        match node.query_selector_all("img") {
            Ok(list) => elements(list),
            Err(e) => {
                log::warn!("Image query failed: {:?}", e);
                Vec::new()
            }
        }
    }

    fn document_images(&self) -> Vec<Element> {
        match self.document.query_selector_all("img") {
            Ok(list) => elements(list),
            Err(e) => {
                log::warn!("Image query failed: {:?}", e);
                Vec::new()
            }
        }
    }

    fn binding_key(&self, node: &Element) -> Option<BindingKey> {
        node.get_attribute(BINDING_ATTRIBUTE)?.parse().ok()
    }

    fn mark_bound(&self, node: &Element, key: BindingKey) {
        if let Err(e) = node.set_attribute(BINDING_ATTRIBUTE, &key.to_string()) {
            log::warn!("Failed to mark image #{}: {:?}", key, e);
        }
    }

    fn create_control(&self, label: &str, z_index: i32) -> Result<HtmlButtonElement, LensError> {
        let control: HtmlButtonElement = self
            .document
            .create_element("button")
            .map_err(|e| js_error("create button", e))?
            .dyn_into()
            .map_err(|_| LensError::dom("created element is not a button"))?;
        control.set_type("button");
        control.set_class_name(CONTROL_CLASS);
        control.set_text_content(Some(label));
        self.style(&control, "position", "absolute");
        self.style(&control, "z-index", &z_index.to_string());
        self.style(&control, "display", "none");
        self.body
            .append_child(&control)
            .map_err(|e| js_error("append control", e))?;
        Ok(control)
    }

    fn set_label(&self, control: &HtmlButtonElement, label: &str) {
        control.set_text_content(Some(label));
    }

    fn set_visible(&self, control: &HtmlButtonElement, visible: bool) {
        self.style(control, "display", if visible { "block" } else { "none" });
    }

    fn place(&self, control: &HtmlButtonElement, left: f64, top: f64) {
        self.style(control, "left", &format!("{}px", left));
        self.style(control, "top", &format!("{}px", top));
    }

    fn set_source(&self, node: &Element, url: &str) {
        let Some(image) = node.dyn_ref::<HtmlImageElement>() else {
            return;
        };
        // A srcset would keep winning over the new src.
        if let Err(e) = image.remove_attribute("srcset") {
            log::warn!("Failed to clear srcset: {:?}", e);
        }
        image.set_src(url);
    }

    fn wire(
        &self,
        image: &Element,
        control: &HtmlButtonElement,
        sink: EventSink,
    ) -> Result<(), LensError> {
        self.listen(image, "mouseenter", &sink, BindingEvent::PointerEnter)?;
        self.listen(image, "mouseleave", &sink, BindingEvent::PointerLeave)?;
        self.listen(control, "mouseenter", &sink, BindingEvent::PointerEnter)?;
        self.listen(control, "mouseleave", &sink, BindingEvent::PointerLeave)?;
        self.listen(control, "click", &sink, BindingEvent::Activate)
    }

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerId {
        self.release_fired_timers();

        let id = {
            let mut timers = self.timers.borrow_mut();
            let id = timers.next_id;
            timers.next_id = id.wrapping_add(1);
            id
        };
        let table = Rc::clone(&self.timers);
        let mut task = Some(task);
        let callback = Closure::wrap(Box::new(move || {
            table.borrow_mut().running = Some(id);
            if let Some(task) = task.take() {
                task();
            }
            let mut timers = table.borrow_mut();
            timers.running = None;
            timers.fired.push(id);
        }) as Box<dyn FnMut()>);

        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                millis,
            ) {
            Ok(handle) => {
                self.timers.borrow_mut().slots.insert(
                    id,
                    TimerSlot {
                        handle,
                        _callback: callback,
                    },
                );
            }
            Err(e) => log::warn!("setTimeout failed: {:?}", e),
        }
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        let slot = {
            let mut timers = self.timers.borrow_mut();
            if timers.running == Some(id) {
                None
            } else {
                timers.slots.remove(&id)
            }
        };
        if let Some(slot) = slot {
            self.window.clear_timeout_with_handle(slot.handle);
        }
        self.release_fired_timers();
    }

    fn spawn_local(&self, task: LocalTask) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn observe_insertions(&self, sink: Rc<dyn Fn(Vec<Element>)>) -> Result<u32, LensError> {
        let callback = Closure::wrap(Box::new(
            move |records: js_sys::Array, _observer: MutationObserver| {
                let mut inserted = Vec::new();
                for record in records.iter() {
                    let Ok(record) = record.dyn_into::<MutationRecord>() else {
                        continue;
                    };
                    inserted.extend(elements(record.added_nodes()));
                }
                if !inserted.is_empty() {
                    sink(inserted);
                }
            },
        )
            as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| js_error("create MutationObserver", e))?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer
            .observe_with_options(&self.body, &init)
            .map_err(|e| js_error("observe body", e))?;

        let id = self.next_observer.get();
        self.next_observer.set(id + 1);
        self.observers.borrow_mut().insert(
            id,
            Observer {
                observer,
                _callback: callback,
            },
        );
        Ok(id)
    }

    fn disconnect(&self, subscription: u32) {
        let removed = self.observers.borrow_mut().remove(&subscription);
        if let Some(entry) = removed {
            entry.observer.disconnect();
        }
    }
}
