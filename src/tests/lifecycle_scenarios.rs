//! Hover, activation and replacement across a whole reader page.

use std::rc::Rc;

use lens_service::ScriptedTransport;
use serde_json::json;

use crate::config::LensConfig;
use crate::fixture::{ControlId, FixtureElement, FixturePage, NodeId};
use crate::overlay::{Overlay, RequestState};
use crate::page::{Page, Rect};
use crate::watcher::MutationWatcher;

struct Reader {
    overlay: Overlay<FixturePage, Rc<ScriptedTransport>>,
    transport: Rc<ScriptedTransport>,
    watcher: Option<MutationWatcher<FixturePage, Rc<ScriptedTransport>>>,
}

impl Reader {
    /// A reader page with a header logo and no chapter loaded yet.
    fn open() -> Self {
        let page = FixturePage::new("https://reader.example");
        page.append(
            page.body(),
            FixtureElement::element("header").with_child(
                FixtureElement::image(
                    "https://reader.example/static/logo.png",
                    Rect::new(0.0, 0.0, 180.0, 60.0),
                    (360.0, 120.0),
                )
                .with_class("site-logo"),
            ),
        );
        let transport = Rc::new(ScriptedTransport::new());
        let overlay = Overlay::new(page, Rc::clone(&transport), LensConfig::default());
        overlay.scan_document();
        let watcher = MutationWatcher::start(&overlay).unwrap();
        Self {
            overlay,
            transport,
            watcher: Some(watcher),
        }
    }

    fn page(&self) -> &FixturePage {
        self.overlay.page()
    }

    /// Lazy-load a chapter of `pages` images.
    fn load_chapter(&self, pages: usize) -> Vec<NodeId> {
        let mut chapter = FixtureElement::element("div").with_class("chapter-content");
        for index in 0..pages {
            chapter = chapter.with_child(FixtureElement::image(
                &format!("https://cdn.example/manga/ch7/{:02}.jpg", index + 1),
                Rect::new(100.0, 80.0 + 1300.0 * index as f64, 860.0, 1260.0),
                (1720.0, 2520.0),
            ));
        }
        let root = self.page().append(self.page().body(), chapter);
        self.page().images_within(&root)
    }

    fn control(&self, image: NodeId) -> ControlId {
        let key = self.overlay.bound_key(&image).unwrap();
        self.overlay.control(key).unwrap()
    }

    fn label(&self, image: NodeId) -> String {
        self.page()
            .control_view(self.control(image))
            .unwrap()
            .label
    }

    fn hover_and_click(&self, image: NodeId) {
        self.page().pointer_enter(image);
        self.page().click(self.control(image));
    }
}

#[test]
fn test_lazy_loaded_pages_get_controls() {
    let reader = Reader::open();
    assert_eq!(reader.overlay.binding_count(), 1);

    let pages = reader.load_chapter(3);
    assert_eq!(reader.overlay.binding_count(), 4);
    for image in &pages {
        assert!(reader.overlay.bound_key(image).is_some());
    }

    // The logo is bound but never revealed.
    let logo = reader.page().document_images()[0];
    reader.page().pointer_enter(logo);
    let view = reader.page().control_view(reader.control(logo)).unwrap();
    assert!(!view.visible);
}

#[test]
fn test_scenario_d_notice_then_idle_without_request() {
    let reader = Reader::open();
    let image = reader.load_chapter(1)[0];

    reader.page().pointer_enter(image);
    reader.page().modify(image, |e| {
        e.src = "https://cdn.example/u/avatar_big.jpg".to_string();
    });
    reader.page().click(reader.control(image));

    assert_eq!(reader.label(image), "Comic images only");
    assert_eq!(reader.transport.request_count(), 0);
    reader.page().advance(1200);
    assert_eq!(reader.label(image), "Translate");
}

#[test]
fn test_scenario_e_image_replaced_then_label_reverts() {
    let reader = Reader::open();
    let image = reader.load_chapter(2)[1];
    reader
        .transport
        .push_json(200, &json!({ "status": "success", "res_img": "AAAA" }));

    reader.hover_and_click(image);

    assert_eq!(reader.page().element(image).src, "data:image/png;base64,AAAA");
    assert_eq!(reader.label(image), "Done");
    reader.page().advance(2000);
    assert_eq!(reader.label(image), "Translate");
}

#[test]
fn test_scenario_f_mismatch_status_shows_retry_hint() {
    let reader = Reader::open();
    let image = reader.load_chapter(1)[0];
    reader
        .transport
        .push_json(422, &json!({ "detail": "quantity mismatch in list" }));

    reader.hover_and_click(image);

    assert_eq!(reader.label(image), "Retry / switch mode");
    assert_ne!(reader.label(image), "Failed");
}

#[test]
fn test_payload_becomes_source_unchanged() {
    let reader = Reader::open();
    let pages = reader.load_chapter(3);
    let payloads = ["iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJ", "ab+/cd==", "x"];

    for (image, payload) in pages.iter().zip(payloads) {
        reader
            .transport
            .push_json(200, &json!({ "status": "success", "res_img": payload }));
        reader.page().click(reader.control(*image));
        assert_eq!(
            reader.page().current_source(image),
            format!("data:image/png;base64,{payload}")
        );
    }
}

#[test]
fn test_pages_are_independent() {
    let reader = Reader::open();
    let pages = reader.load_chapter(2);
    reader
        .transport
        .push_json(200, &json!({ "status": "success", "res_img": "AAAA" }));
    reader
        .transport
        .push_json(200, &json!({ "status": "failed", "info": "upstream timeout" }));

    reader.page().click(reader.control(pages[0]));
    reader.page().advance(1000);
    reader.page().click(reader.control(pages[1]));

    assert_eq!(reader.label(pages[0]), "Done");
    assert_eq!(reader.label(pages[1]), "Failed");

    reader.page().advance(1000);
    assert_eq!(reader.label(pages[0]), "Translate");
    assert_eq!(reader.label(pages[1]), "Failed");
    reader.page().advance(1000);
    assert_eq!(reader.label(pages[1]), "Translate");

    let key = reader.overlay.bound_key(&pages[0]).unwrap();
    assert_eq!(reader.overlay.state(key), Some(RequestState::Idle));
}

#[test]
fn test_stopped_watcher_ignores_new_chapters() {
    let mut reader = Reader::open();
    if let Some(watcher) = reader.watcher.take() {
        watcher.stop();
    }
    reader.load_chapter(2);
    assert_eq!(reader.overlay.binding_count(), 1);

    assert_eq!(reader.overlay.scan_document(), 2);
}
