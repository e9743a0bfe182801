use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};
use axum_template::{Key, RenderHtml};
use serde::Serialize;

use gimbal_trajectory::Config;

use crate::AppEngine;

pub(crate) async fn handle_index(
    State(engine): State<AppEngine>,
    State(config): State<Arc<Config>>,
) -> impl IntoResponse {
    #[derive(Serialize)]
    struct IndexModel {
        step_angle: f64,
        microsteps: u32,
        debounce_ms: u64,
    }

    let model = IndexModel {
        step_angle: config.default_step_angle,
        microsteps: config.default_microsteps,
        debounce_ms: config.debounce_ms,
    };

    RenderHtml(Key("index".to_owned()), engine, model)
}
