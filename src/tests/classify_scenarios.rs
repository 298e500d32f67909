//! Classification of images placed in a document.

use crate::classify::{KeywordSource, Rejection, Verdict, classify, is_translatable};
use crate::fixture::{FixtureElement, FixturePage, NodeId};
use crate::page::{Page, Rect};

const MANGA_URL: &str = "https://cdn.example/manga/vol3/chapter12/page03.jpg";

fn page_with(element: FixtureElement) -> (FixturePage, NodeId) {
    let page = FixturePage::new("https://reader.example");
    let node = page.append(page.body(), element);
    (page, node)
}

fn square(url: &str, side: f64, natural: f64) -> FixtureElement {
    FixtureElement::image(url, Rect::new(0.0, 0.0, side, side), (natural, natural))
}

#[test]
fn test_scenario_a_chapter_page_is_translatable() {
    let (page, image) = page_with(square(
        "https://cdn.example/series/chapter12/page03.jpg",
        300.0,
        800.0,
    ));
    assert_eq!(classify(&page, &image), Verdict::Translatable);
}

#[test]
fn test_scenario_b_small_avatar_fails_size_gate_first() {
    let (page, image) = page_with(
        square("https://cdn.example/u/42.png", 40.0, 40.0).with_class("user-avatar-icon"),
    );
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::TooSmall)
    );
}

#[test]
fn test_scenario_c_round_image_needs_comic_url() {
    // 210px keeps the rendered area above the minimum so the shape gate decides.
    let round = |url: &str| square(url, 210.0, 500.0).with_radius("50%");

    let (page, plain) = page_with(round("https://cdn.example/media/8812.jpg"));
    assert_eq!(
        classify(&page, &plain),
        Verdict::Rejected(Rejection::RoundAvatar)
    );

    let (page, comic) = page_with(round("https://cdn.example/manhwa/8812.jpg"));
    assert_eq!(classify(&page, &comic), Verdict::Translatable);

    let (page, manga) = page_with(round("https://cdn.example/manga/8812.jpg"));
    assert!(is_translatable(&page, &manga));
}

#[test]
fn test_scenario_c_at_200px_is_too_small_before_shape() {
    let (page, image) = page_with(
        square("https://cdn.example/manhwa/8812.jpg", 200.0, 500.0).with_radius("50%"),
    );
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::TooSmall)
    );
}

#[test]
fn test_small_area_never_translatable() {
    for (width, height) in [
        (160.0, 260.0),
        (200.0, 200.0),
        (180.0, 233.0),
        (100.0, 400.0),
        (400.0, 100.0),
    ] {
        let (page, image) = page_with(FixtureElement::image(
            MANGA_URL,
            Rect::new(0.0, 0.0, width, height),
            (2000.0, 2000.0),
        ));
        assert!(
            !is_translatable(&page, &image),
            "{}x{} should be rejected",
            width,
            height
        );
    }
}

#[test]
fn test_exclusion_keyword_anywhere_rejects() {
    let base = || square(MANGA_URL, 300.0, 800.0);

    let (page, image) = page_with(square(
        "https://cdn.example/manga/avatar/page03.jpg",
        300.0,
        800.0,
    ));
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::ExcludedKeyword(KeywordSource::Url))
    );

    let (page, image) = page_with(base().with_alt("Site Logo"));
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::ExcludedKeyword(KeywordSource::Alt))
    );

    for keyword in ["emoji", "profile", "badge", "sprite", "favicon"] {
        let (page, image) = page_with(base().with_aria_label(keyword));
        assert_eq!(
            classify(&page, &image),
            Verdict::Rejected(Rejection::ExcludedKeyword(KeywordSource::Context)),
            "{}",
            keyword
        );
    }
}

#[test]
fn test_percent_encoded_keyword_in_url_rejects() {
    let (page, image) = page_with(square(
        "https://cdn.example/manga/%61vatar.jpg",
        300.0,
        800.0,
    ));
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::ExcludedKeyword(KeywordSource::Url))
    );
}

#[test]
fn test_ancestor_context_is_limited_to_nearest_three() {
    let nest = |class_at: usize| {
        let mut element = square(MANGA_URL, 300.0, 800.0);
        for level in 1..=4 {
            let mut wrapper = FixtureElement::element("div");
            if level == class_at {
                wrapper = wrapper.with_class("sidebar avatar-list");
            }
            element = wrapper.with_child(element);
        }
        element
    };

    let (page, outer) = page_with(nest(3));
    let image = page.images_within(&outer)[0];
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::ExcludedKeyword(KeywordSource::Context))
    );

    let (page, outer) = page_with(nest(4));
    let image = page.images_within(&outer)[0];
    assert_eq!(classify(&page, &image), Verdict::Translatable);
}

#[test]
fn test_undecoded_image_uses_rendered_size() {
    let (page, image) = page_with(FixtureElement::image(
        MANGA_URL,
        Rect::new(0.0, 0.0, 400.0, 600.0),
        (0.0, 0.0),
    ));
    assert!(is_translatable(&page, &image));
}

#[test]
fn test_detached_image_is_not_eligible() {
    let page = FixturePage::new("https://reader.example");
    let image = page.create_detached(square(MANGA_URL, 300.0, 800.0));
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::NotEligible)
    );
}

#[test]
fn test_current_source_wins_over_src() {
    let mut element = square(MANGA_URL, 300.0, 800.0);
    element.current_src = "https://cdn.example/ui/loading-icon.gif".to_string();
    let (page, image) = page_with(element);
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::ExcludedKeyword(KeywordSource::Url))
    );
}

#[test]
fn test_scrolled_past_image_is_off_screen() {
    let (page, image) = page_with(FixtureElement::image(
        MANGA_URL,
        Rect::new(0.0, -900.0, 600.0, 900.0),
        (1200.0, 1800.0),
    ));
    assert_eq!(
        classify(&page, &image),
        Verdict::Rejected(Rejection::OffScreen)
    );
}
