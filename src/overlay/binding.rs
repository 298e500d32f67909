//! Per-image binding record and request state.

use crate::config::ButtonLabels;
use crate::page::{Page, TimerId};

/// Why a translate attempt ended without a new image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The image stopped looking like a comic page before activation
    NotComic,
    /// The service reported a structural or count mismatch
    Mismatch,
    /// Any other failure, including network errors
    Other,
}

/// Translate request state of one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    /// Ready for activation
    #[default]
    Idle,
    /// Request dispatched, waiting for the service
    InFlight,
    /// Image replaced with the translation
    Succeeded,
    /// Attempt failed
    Failed(Failure),
}

impl RequestState {
    /// Control text for this state.
    pub fn label<'a>(&self, labels: &'a ButtonLabels) -> &'a str {
        match self {
            RequestState::Idle => &labels.idle,
            RequestState::InFlight => &labels.processing,
            RequestState::Succeeded => &labels.done,
            RequestState::Failed(Failure::NotComic) => &labels.comic_only,
            RequestState::Failed(Failure::Mismatch) => &labels.retry_hint,
            RequestState::Failed(Failure::Other) => &labels.failed,
        }
    }

    /// Whether the state reverts to idle after a display window.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Succeeded | RequestState::Failed(_))
    }
}

/// One image, its control, and the control's timers.
pub(crate) struct Binding<P: Page> {
    pub image: P::Node,
    pub control: P::Control,
    pub visible: bool,
    pub hide_timer: Option<TimerId>,
    pub revert_timer: Option<TimerId>,
    pub state: RequestState,
}

impl<P: Page> Binding<P> {
    pub fn new(image: P::Node, control: P::Control) -> Self {
        Self {
            image,
            control,
            visible: false,
            hide_timer: None,
            revert_timer: None,
            state: RequestState::Idle,
        }
    }
}
