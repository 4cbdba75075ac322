//! HTTP surface of the distribution server.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use buildcast_core::{BuildListing, BuildcastError, FsBuildCatalog};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Any catalog error becomes a 400 with the error text as body.
struct ApiError(BuildcastError);

impl From<BuildcastError> for ApiError {
    fn from(err: BuildcastError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "request rejected");
        (StatusCode::BAD_REQUEST, self.0.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct BuildQuery {
    #[serde(rename = "buildNumber")]
    build_number: Option<String>,
}

impl BuildQuery {
    fn requested(&self) -> Result<&str, ApiError> {
        self.build_number
            .as_deref()
            .ok_or_else(|| BuildcastError::InvalidBuildNumber(String::new()).into())
    }
}

pub fn router(catalog: FsBuildCatalog) -> Router {
    Router::new()
        .route("/api/builds/getbuilds", get(get_builds))
        .route("/api/builds/getbuild", get(get_build))
        .route("/api/builds/getchangelog", get(get_changelog))
        .route("/api/builds/getlatestbuildnumber", get(get_latest_build_number))
        .with_state(catalog)
}

async fn get_builds(State(catalog): State<FsBuildCatalog>) -> Result<Json<BuildListing>, ApiError> {
    Ok(Json(catalog.list_builds().await?))
}

async fn get_build(
    State(catalog): State<FsBuildCatalog>,
    Query(query): Query<BuildQuery>,
) -> Result<Response, ApiError> {
    let artifact = catalog.build_artifact(query.requested()?).await?;
    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(BuildcastError::from)?;
    debug!(build = %artifact.id, bytes = artifact.size, "streaming build");

    let disposition = format!(
        "attachment; filename=\"{}\"",
        buildcast_core::catalog::image_file_name(&artifact.id)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

async fn get_changelog(
    State(catalog): State<FsBuildCatalog>,
    Query(query): Query<BuildQuery>,
) -> Result<String, ApiError> {
    Ok(catalog.changelog(query.requested()?).await?)
}

async fn get_latest_build_number(
    State(catalog): State<FsBuildCatalog>,
) -> Result<String, ApiError> {
    Ok(catalog.latest_build_number().await?.to_string())
}
