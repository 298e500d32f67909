//! Offline classifier report
//!
//! Loads a captured page fixture and prints one line per image:
//!
//! ```text
//! <src>\ttranslatable
//! <src>\trejected\t<gate>
//! ```
//!
//! Usage: `lens-classify <fixture.json>`. The default verbosity is the
//! configured `log_level`; `RUST_LOG=trace` shows every gate decision.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use panel_lens::LensConfig;
    use panel_lens::fixture::FixturePage;

    env_logger::Builder::new()
        .filter_level(LensConfig::default().log_level.to_level_filter())
        .parse_default_env()
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: lens-classify <fixture.json>");
        std::process::exit(2);
    };

    let json = match std::fs::read_to_string(&path) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };
    let page = match FixturePage::from_json(&json) {
        Ok(page) => page,
        Err(e) => {
            eprintln!("Invalid fixture {}: {}", path, e);
            std::process::exit(1);
        }
    };

    let lines = page.report();
    let translatable = lines.iter().filter(|l| l.verdict.is_translatable()).count();
    for line in &lines {
        println!("{}", line);
    }
    log::info!("{} of {} image(s) translatable", translatable, lines.len());
}

// The browser build has no use for the report
#[cfg(target_arch = "wasm32")]
fn main() {}
