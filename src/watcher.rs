//! Binds images that appear after the initial scan.
//!
//! Reader sites load pages lazily and swap whole chapters in and out of the
//! DOM. [`MutationWatcher`] listens for inserted elements for as long as it
//! lives and hands every image it finds, directly inserted or nested inside an
//! inserted subtree, to [`Overlay::attach`].

use std::rc::Rc;

use lens_service::Transport;

use crate::error::LensError;
use crate::overlay::Overlay;
use crate::page::Page;

/// Running insertion observer. Disconnects when stopped or dropped.
pub struct MutationWatcher<P: Page + 'static, T: Transport + 'static> {
    overlay: Overlay<P, T>,
    subscription: Option<P::Subscription>,
}

impl<P: Page + 'static, T: Transport + 'static> MutationWatcher<P, T> {
    /// Start observing the overlay's page.
    pub fn start(overlay: &Overlay<P, T>) -> Result<Self, LensError> {
        let weak = overlay.downgrade();
        let sink = Rc::new(move |nodes: Vec<P::Node>| {
            if let Some(overlay) = weak.upgrade() {
                handle_inserted(&overlay, &nodes);
            }
        });
        let subscription = overlay.page().observe_insertions(sink)?;
        log::debug!("Watching for inserted images");
        Ok(Self {
            overlay: overlay.clone(),
            subscription: Some(subscription),
        })
    }

    /// Whether the observer is still connected.
    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Stop observing.
    pub fn stop(mut self) {
        self.disconnect();
    }

    fn disconnect(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.overlay.page().disconnect(subscription);
            log::debug!("Stopped watching for inserted images");
        }
    }
}

impl<P: Page + 'static, T: Transport + 'static> Drop for MutationWatcher<P, T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Attach every image among `nodes` and their descendants. Returns the number
/// of new bindings.
pub fn handle_inserted<P: Page + 'static, T: Transport + 'static>(
    overlay: &Overlay<P, T>,
    nodes: &[P::Node],
) -> usize {
    let page = overlay.page();
    let before = overlay.binding_count();
    for node in nodes {
        if page.is_image(node) {
            overlay.attach(node);
        }
        for image in page.images_within(node) {
            overlay.attach(&image);
        }
    }
    let added = overlay.binding_count() - before;
    if added > 0 {
        log::debug!("Bound {} inserted image(s)", added);
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LensConfig;
    use crate::fixture::{FixtureElement, FixturePage};
    use crate::page::Rect;
    use lens_service::ScriptedTransport;

    fn image(name: &str) -> FixtureElement {
        FixtureElement::image(
            &format!("https://cdn.example/manga/{name}.jpg"),
            Rect::new(0.0, 0.0, 400.0, 600.0),
            (800.0, 1200.0),
        )
    }

    fn overlay() -> Overlay<FixturePage, ScriptedTransport> {
        Overlay::new(
            FixturePage::new("https://reader.example"),
            ScriptedTransport::new(),
            LensConfig::default(),
        )
    }

    #[test]
    fn test_binds_inserted_images_and_nested_images() {
        let overlay = overlay();
        let _watcher = MutationWatcher::start(&overlay).unwrap();
        let page = overlay.page();

        page.append(page.body(), image("p1"));
        assert_eq!(overlay.binding_count(), 1);

        page.append(
            page.body(),
            FixtureElement::element("section")
                .with_child(FixtureElement::element("div").with_child(image("p2")))
                .with_child(image("p3")),
        );
        assert_eq!(overlay.binding_count(), 3);
    }

    #[test]
    fn test_batch_with_non_images() {
        let overlay = overlay();
        let _watcher = MutationWatcher::start(&overlay).unwrap();
        let page = overlay.page();

        page.append_all(
            page.body(),
            vec![
                FixtureElement::element("p"),
                image("p1"),
                FixtureElement::element("span"),
            ],
        );
        assert_eq!(overlay.binding_count(), 1);
        assert_eq!(page.control_count(), 1);
    }

    #[test]
    fn test_insertion_into_bound_subtree_does_not_rebind() {
        let overlay = overlay();
        let _watcher = MutationWatcher::start(&overlay).unwrap();
        let page = overlay.page();

        let chapter = page.append(page.body(), FixtureElement::element("div").with_child(image("p1")));
        page.append(chapter, image("p2"));

        assert_eq!(overlay.binding_count(), 2);
        assert_eq!(handle_inserted(&overlay, &[chapter]), 0);
    }

    #[test]
    fn test_detached_insertions_are_not_reported() {
        let overlay = overlay();
        let _watcher = MutationWatcher::start(&overlay).unwrap();
        let page = overlay.page();

        let detached = page.create_detached(FixtureElement::element("div"));
        page.append(detached, image("p1"));
        assert_eq!(overlay.binding_count(), 0);
    }

    #[test]
    fn test_stop_and_drop_disconnect() {
        let overlay = overlay();
        let watcher = MutationWatcher::start(&overlay).unwrap();
        assert!(watcher.is_running());
        assert_eq!(overlay.page().observer_count(), 1);
        watcher.stop();
        assert_eq!(overlay.page().observer_count(), 0);

        let page = overlay.page();
        page.append(page.body(), image("p1"));
        assert_eq!(overlay.binding_count(), 0);

        {
            let _watcher = MutationWatcher::start(&overlay).unwrap();
            assert_eq!(overlay.page().observer_count(), 1);
        }
        assert_eq!(overlay.page().observer_count(), 0);
    }
}
