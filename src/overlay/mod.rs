//! Floating translate controls bound one-to-one to page images.
//!
//! Every image seen on the page gets exactly one binding the first time it
//! is attached: a hidden control appended to the body, plus the control's
//! hover and label timers. The control is shown while the pointer is over the
//! image or the control, and only if the image still classifies as a comic page
//! at that moment.
//!
//! Bindings live in a side table keyed by [`BindingKey`]; the key is also
//! written onto the image as its marker. A marker that does not point back to
//! the same image (for instance copied by `cloneNode`) is treated as absent.

mod binding;
mod request;


use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use lens_service::{TranslateClient, Transport};

use crate::classify::is_translatable;
use crate::config::LensConfig;
use crate::page::{BindingEvent, BindingKey, EventSink, Page};

use binding::Binding;
pub use binding::{Failure, RequestState};
pub use request::Activation;

struct Shared<P: Page, T> {
    page: P,
    client: TranslateClient<T>,
    config: LensConfig,
    bindings: RefCell<HashMap<BindingKey, Binding<P>>>,
    next_key: Cell<BindingKey>,
}

/// Controller owning every binding on one page.
///
/// Cheap to clone; clones share the same bindings.
pub struct Overlay<P: Page, T> {
    shared: Rc<Shared<P, T>>,
}

impl<P: Page, T> Clone for Overlay<P, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

/// Non-owning handle to an [`Overlay`], held by page callbacks.
pub struct WeakOverlay<P: Page, T> {
    shared: Weak<Shared<P, T>>,
}

impl<P: Page, T> Clone for WeakOverlay<P, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<P: Page, T> WeakOverlay<P, T> {
    /// The overlay, if it is still alive.
    pub fn upgrade(&self) -> Option<Overlay<P, T>> {
        self.shared.upgrade().map(|shared| Overlay { shared })
    }
}

impl<P: Page + 'static, T: Transport + 'static> Overlay<P, T> {
    /// Create a controller for `page`, sending translate requests through `transport`.
    pub fn new(page: P, transport: T, config: LensConfig) -> Self {
        let client = TranslateClient::new(transport, config.api_base.clone());
        Self {
            shared: Rc::new(Shared {
                page,
                client,
                config,
                bindings: RefCell::new(HashMap::new()),
                next_key: Cell::new(1),
            }),
        }
    }

    /// The page this overlay works on.
    pub fn page(&self) -> &P {
        &self.shared.page
    }

    /// The active configuration.
    pub fn config(&self) -> &LensConfig {
        &self.shared.config
    }

    /// The translate transport.
    pub fn transport(&self) -> &T {
        self.shared.client.transport()
    }

    /// A non-owning handle.
    pub fn downgrade(&self) -> WeakOverlay<P, T> {
        WeakOverlay {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Bind a control to `image`, once.
    ///
    /// Returns the image's binding key, or `None` when the node is not an image
    /// or the control could not be created. Calling again for a bound image
    /// returns the existing key and changes nothing.
    pub fn attach(&self, image: &P::Node) -> Option<BindingKey> {
        let page = &self.shared.page;
        if !page.is_image(image) {
            return None;
        }
        if let Some(key) = self.bound_key(image) {
            return Some(key);
        }

        let config = &self.shared.config;
        let control = match page.create_control(&config.labels.idle, config.control_z_index) {
            Ok(control) => control,
            Err(e) => {
                log::warn!("Failed to create control: {}", e);
                return None;
            }
        };

        let key = self.shared.next_key.get();
        self.shared.next_key.set(key.wrapping_add(1));
        page.mark_bound(image, key);

        let weak = self.downgrade();
        let sink: EventSink = Rc::new(move |event| {
            if let Some(overlay) = weak.upgrade() {
                overlay.handle_event(key, event);
            }
        });
        if let Err(e) = page.wire(image, &control, sink) {
            log::warn!("Failed to wire events for binding #{}: {}", key, e);
        }

        self.shared
            .bindings
            .borrow_mut()
            .insert(key, Binding::new(image.clone(), control));
        log::debug!(
            "Bound image #{} ({})",
            key,
            page.current_source(image)
        );
        Some(key)
    }

    /// Attach every image currently in the document. Returns the number of new bindings.
    pub fn scan_document(&self) -> usize {
        let before = self.binding_count();
        for image in self.shared.page.document_images() {
            self.attach(&image);
        }
        self.binding_count() - before
    }

    /// Key of the binding that belongs to `image`, if any.
    pub fn bound_key(&self, image: &P::Node) -> Option<BindingKey> {
        let key = self.shared.page.binding_key(image)?;
        let bindings = self.shared.bindings.borrow();
        match bindings.get(&key) {
            Some(binding) if binding.image == *image => Some(key),
            _ => {
                log::debug!("Ignoring foreign binding marker #{}", key);
                None
            }
        }
    }

    /// Number of bindings created so far.
    pub fn binding_count(&self) -> usize {
        self.shared.bindings.borrow().len()
    }

    /// The control of a binding.
    pub fn control(&self, key: BindingKey) -> Option<P::Control> {
        self.with_binding(key, |b| b.control.clone())
    }

    /// Request state of a binding.
    pub fn state(&self, key: BindingKey) -> Option<RequestState> {
        self.with_binding(key, |b| b.state)
    }

    /// Whether a binding's control is currently shown.
    pub fn is_visible(&self, key: BindingKey) -> bool {
        self.with_binding(key, |b| b.visible).unwrap_or(false)
    }

    /// React to an event of a bound image or its control.
    pub fn handle_event(&self, key: BindingKey, event: BindingEvent) {
        match event {
            BindingEvent::PointerEnter => self.reveal(key),
            BindingEvent::PointerLeave => self.schedule_hide(key),
            BindingEvent::Activate => self.dispatch_activation(key),
        }
    }

    /// Show the control over its image, if the image still qualifies.
    ///
    /// Cancels a pending hide. The position is recomputed from the image's
    /// current box plus the page scroll, so it is valid in document coordinates.
    pub fn reveal(&self, key: BindingKey) {
        let Some((image, control)) = self.parts(key) else {
            return;
        };
        self.cancel_hide(key);

        let page = &self.shared.page;
        if !is_translatable(page, &image) {
            page.set_visible(&control, false);
            self.update(key, |b| b.visible = false);
            return;
        }

        let rect = page.bounding_rect(&image);
        let (scroll_x, scroll_y) = page.scroll_offset();
        let offset = self.shared.config.control_offset_px;
        page.place(&control, rect.left + scroll_x + offset, rect.top + scroll_y + offset);
        page.set_visible(&control, true);
        self.update(key, |b| b.visible = true);
    }

    /// Hide the control after the grace period, unless revealed again first.
    pub fn schedule_hide(&self, key: BindingKey) {
        if self.parts(key).is_none() {
            return;
        }
        self.cancel_hide(key);

        let weak = self.downgrade();
        let id = self.shared.page.set_timeout(
            self.shared.config.timings.hide_grace(),
            Box::new(move || {
                if let Some(overlay) = weak.upgrade() {
                    overlay.hide_now(key);
                }
            }),
        );
        self.update(key, |b| b.hide_timer = Some(id));
    }

    fn hide_now(&self, key: BindingKey) {
        let Some((_, control)) = self.parts(key) else {
            return;
        };
        self.update(key, |b| {
            b.hide_timer = None;
            b.visible = false;
        });
        self.shared.page.set_visible(&control, false);
    }

    fn cancel_hide(&self, key: BindingKey) {
        if let Some(Some(id)) = self.update(key, |b| b.hide_timer.take()) {
            self.shared.page.clear_timeout(id);
        }
    }

    /// Move a binding to `state`: update the label, cancel the pending revert,
    /// and schedule a new revert for terminal states.
    fn transition(&self, key: BindingKey, state: RequestState) {
        let Some((_, control)) = self.parts(key) else {
            return;
        };
        let page = &self.shared.page;
        if let Some(Some(id)) = self.update(key, |b| {
            b.state = state;
            b.revert_timer.take()
        }) {
            page.clear_timeout(id);
        }
        page.set_label(&control, state.label(&self.shared.config.labels));

        if !state.is_terminal() {
            return;
        }
        let timings = &self.shared.config.timings;
        let delay = match state {
            RequestState::Failed(Failure::NotComic) => timings.notice_display(),
            _ => timings.result_display(),
        };
        let weak = self.downgrade();
        let id = page.set_timeout(
            delay,
            Box::new(move || {
                if let Some(overlay) = weak.upgrade() {
                    overlay.update(key, |b| b.revert_timer = None);
                    overlay.transition(key, RequestState::Idle);
                }
            }),
        );
        self.update(key, |b| b.revert_timer = Some(id));
    }

    fn parts(&self, key: BindingKey) -> Option<(P::Node, P::Control)> {
        self.with_binding(key, |b| (b.image.clone(), b.control.clone()))
    }

    fn with_binding<R>(&self, key: BindingKey, f: impl FnOnce(&Binding<P>) -> R) -> Option<R> {
        self.shared.bindings.borrow().get(&key).map(f)
    }

    fn update<R>(&self, key: BindingKey, f: impl FnOnce(&mut Binding<P>) -> R) -> Option<R> {
        self.shared.bindings.borrow_mut().get_mut(&key).map(f)
    }
}
