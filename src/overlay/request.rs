//! Translate activation: dispatch, decode, apply.
//!
//! An activation is split in a synchronous half ([`Overlay::begin_activation`]),
//! which decides and moves the binding to `InFlight`, and an asynchronous half
//! ([`Overlay::complete_activation`]), which waits for the service. Activations
//! that arrive while a request is in flight are ignored.

use lens_service::{TranslateOutcome, TranslateRequest, Transport, is_structural_mismatch};
use web_time::Instant;

use super::{Failure, Overlay, RequestState};
use crate::classify::is_translatable;
use crate::page::{BindingKey, Page};

/// What an activation turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// Unknown binding, or a request is already in flight
    Ignored,
    /// The image no longer qualifies; the comic-only notice is shown
    Rejected,
    /// A request is ready to send
    Dispatched(TranslateRequest),
}

impl<P: Page + 'static, T: Transport + 'static> Overlay<P, T> {
    /// Decide what to do with an activation and enter the matching state.
    pub fn begin_activation(&self, key: BindingKey) -> Activation {
        let Some((image, _)) = self.parts(key) else {
            return Activation::Ignored;
        };
        if self.state(key) == Some(RequestState::InFlight) {
            log::debug!("Binding #{} already has a request in flight", key);
            return Activation::Ignored;
        }

        let page = &self.shared.page;
        if !is_translatable(page, &image) {
            self.transition(key, RequestState::Failed(Failure::NotComic));
            return Activation::Rejected;
        }

        self.transition(key, RequestState::InFlight);
        Activation::Dispatched(TranslateRequest {
            image_url: page.source(&image),
            referer: page.origin(),
        })
    }

    /// Send a dispatched request and apply its outcome. Returns the new state.
    pub async fn complete_activation(
        &self,
        key: BindingKey,
        request: TranslateRequest,
    ) -> RequestState {
        let started = Instant::now();
        let outcome = self.shared.client.translate(&request).await;
        let elapsed = started.elapsed();

        let state = match outcome {
            TranslateOutcome::Success(image) => {
                log::info!(
                    "Translated {} in {:.1}s (service time {:?}, price {:?})",
                    request.image_url,
                    elapsed.as_secs_f64(),
                    image.duration,
                    image.price
                );
                if let Some(text) = &image.raw_text {
                    log::info!("Source text: {}", text);
                }
                if let Some(text) = &image.cn_text {
                    log::info!("Translation: {}", text);
                }
                if let Some((node, _)) = self.parts(key) {
                    self.shared.page.set_source(&node, &image.data_uri());
                }
                RequestState::Succeeded
            }
            TranslateOutcome::Failure { kind, message } => {
                log::error!(
                    "Translation of {} failed ({:?}): {}",
                    request.image_url,
                    kind,
                    message
                );
                if is_structural_mismatch(&message) {
                    RequestState::Failed(Failure::Mismatch)
                } else {
                    RequestState::Failed(Failure::Other)
                }
            }
        };

        self.transition(key, state);
        state
    }

    /// Run a whole activation and return the resulting state.
    pub async fn activate(&self, key: BindingKey) -> Option<RequestState> {
        match self.begin_activation(key) {
            Activation::Dispatched(request) => Some(self.complete_activation(key, request).await),
            Activation::Rejected | Activation::Ignored => self.state(key),
        }
    }

    /// Start an activation from a click, running the request on the page's event loop.
    pub(super) fn dispatch_activation(&self, key: BindingKey) {
        if let Activation::Dispatched(request) = self.begin_activation(key) {
            let overlay = self.clone();
            self.shared.page.spawn_local(Box::pin(async move {
                overlay.complete_activation(key, request).await;
            }));
        }
    }
}
