use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use gimbal_trajectory::{
    api::{ImageResponse, PlotRequest, ProfileRequest},
    piecewise::NO_VALID_PAIRS,
    render, Config, Piecewise,
};

use super::api_error::{blocking, ApiError};

pub(crate) async fn handle_plot(
    State(config): State<Arc<Config>>,
    payload: Result<Json<PlotRequest>, JsonRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::debug!("plot: {} rows", request.functions.len());

    let img = blocking(move || {
        let piecewise = Piecewise::from_rows(&request.functions, NO_VALID_PAIRS)?;
        let png = render::render_functions(&piecewise, config.plot_options())?;
        Ok(render::to_base64(&png))
    })
    .await?;

    Ok(Json(ImageResponse { img }))
}

pub(crate) async fn handle_profile(
    State(config): State<Arc<Config>>,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let Json(request) = payload?;
    let resolution = request.resolution.resolve(config.default_resolution());
    tracing::debug!(
        "profile: {} rows, {} deg / {}",
        request.functions.len(),
        resolution.step_angle,
        resolution.microsteps
    );

    let img = blocking(move || {
        let piecewise = Piecewise::from_rows(&request.functions, NO_VALID_PAIRS)?;
        let png = render::render_profile(
            &piecewise,
            resolution,
            config.limits(),
            config.plot_options(),
        )?;
        Ok(render::to_base64(&png))
    })
    .await?;

    Ok(Json(ImageResponse { img }))
}
