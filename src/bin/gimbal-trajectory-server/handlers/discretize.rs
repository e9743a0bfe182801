use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use gimbal_trajectory::{
    api::{Axis, DiscretizeAllRequest, DiscretizeAllResponse, DiscretizeRequest, DiscretizeResponse},
    discretize, export,
    piecewise::NO_VALID_SEGMENTS,
    Config, Piecewise,
};

use super::api_error::{blocking, ApiError};

pub(crate) async fn handle_discretize(
    State(config): State<Arc<Config>>,
    payload: Result<Json<DiscretizeRequest>, JsonRejection>,
) -> Result<Json<DiscretizeResponse>, ApiError> {
    let Json(request) = payload?;
    let resolution = request.resolution.resolve(config.default_resolution());

    let segments = blocking(move || {
        let piecewise = Piecewise::from_rows(&request.functions, NO_VALID_SEGMENTS)?;
        discretize::discretize(&piecewise, resolution, config.limits())
    })
    .await?;

    tracing::debug!(
        "discretize: {} segments, {} samples",
        segments.len(),
        segments.iter().map(|s| s.angles.len()).sum::<usize>()
    );

    Ok(Json(DiscretizeResponse { segments }))
}

pub(crate) async fn handle_discretize_all(
    State(config): State<Arc<Config>>,
    payload: Result<Json<DiscretizeAllRequest>, JsonRejection>,
) -> Result<Json<DiscretizeAllResponse>, ApiError> {
    let Json(request) = payload?;
    let resolution = request.resolution.resolve(config.default_resolution());
    let options = config.export_options();
    let output_dir = options.output_dir.clone();

    let axes = blocking(move || {
        export::discretize_all(
            [
                request.rows(Axis::X),
                request.rows(Axis::Y),
                request.rows(Axis::Z),
            ],
            resolution,
            &options,
        )
    })
    .await?;

    tracing::info!("{} trajectories written to {:?}", axes.len(), output_dir);

    Ok(Json(DiscretizeAllResponse {
        success: true,
        axes,
    }))
}
