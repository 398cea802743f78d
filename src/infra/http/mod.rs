mod hooks;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use crate::application::trigger::SubmissionTrigger;

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HookState {
    pub trigger: SubmissionTrigger,
    pub secret: Option<Arc<str>>,
}

impl HookState {
    pub fn new(trigger: SubmissionTrigger, secret: Option<String>) -> Self {
        Self {
            trigger,
            secret: secret.map(Arc::from),
        }
    }
}

pub fn build_router(state: HookState) -> Router {
    let hook_routes = Router::new()
        .route("/hooks/submissions", post(hooks::receive_submission))
        .route_layer(from_fn_with_state(state.clone(), hooks::require_hook_secret));

    Router::new()
        .merge(hook_routes)
        .route("/healthz", get(hooks::healthz))
        .with_state(state)
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
}
