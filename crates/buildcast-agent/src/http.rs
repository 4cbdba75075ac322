//! HTTP surface of the agent, under `/Updates/`.
//!
//! Endpoints that talk to the build server first check that it answers and
//! reply `400 Build server unreachable.` otherwise.

use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use buildcast_core::{
    BuildListing, BuildcastError, PreferenceRecord, PreferenceUpdate, StatusSnapshot, UpdateAgent,
};
use serde::Deserialize;
use tracing::{info, warn};

pub const SERVER_UNREACHABLE: &str = "Build server unreachable.";

type AppState = Arc<UpdateAgent>;

/// Any agent error becomes a 400 with the error text as body.
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

pub fn router(agent: AppState) -> Router {
    let networked = Router::new()
        .route("/Updates/GetBuilds", get(get_builds))
        .route("/Updates/GetChangelog", get(get_changelog))
        .route("/Updates/IsUpdateAvailable", get(is_update_available))
        .route("/Updates/StartUpdate", post(start_update))
        .route_layer(middleware::from_fn_with_state(
            agent.clone(),
            require_build_server,
        ));

    Router::new()
        .route("/Updates/SetUpdatePreferences", post(set_preferences))
        .route("/Updates/GetUpdatePreferences", get(get_preferences))
        .route("/Updates/GetUpdateStatus", get(get_status))
        .merge(networked)
        .with_state(agent)
}

async fn require_build_server(
    State(agent): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match agent.probe().await {
        Ok(()) => next.run(request).await,
        Err(BuildcastError::ServerUnreachable(cause)) => {
            warn!(%cause, path = %request.uri().path(), "build server unreachable");
            (StatusCode::BAD_REQUEST, SERVER_UNREACHABLE).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

async fn set_preferences(
    State(agent): State<AppState>,
    Json(update): Json<PreferenceUpdate>,
) -> Result<&'static str, ApiError> {
    agent.set_preferences(update).await?;
    Ok("Update Preferences Set.")
}

async fn get_preferences(
    State(agent): State<AppState>,
) -> Result<Json<PreferenceRecord>, ApiError> {
    Ok(Json(agent.get_preferences().await?))
}

async fn get_builds(State(agent): State<AppState>) -> Result<Json<BuildListing>, ApiError> {
    Ok(Json(agent.get_builds().await?))
}

async fn get_changelog(
    State(agent): State<AppState>,
    Query(query): Query<BuildQuery>,
) -> Result<String, ApiError> {
    Ok(agent.get_changelog(query.build_number.as_deref()).await?)
}

async fn is_update_available(State(agent): State<AppState>) -> Result<Json<bool>, ApiError> {
    Ok(Json(agent.is_update_available().await?))
}

async fn start_update(
    State(agent): State<AppState>,
    Query(query): Query<BuildQuery>,
) -> Result<&'static str, ApiError> {
    let task = agent.start_update(query.build_number.as_deref()).await?;
    info!(task_id = %task.id, build_target = %task.target, "update requested");
    Ok("Update Started.")
}

async fn get_status(State(agent): State<AppState>) -> Json<StatusSnapshot> {
    Json(agent.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use buildcast_core::{FsBuildCatalog, InstallQueue, LocalCatalogClient, PreferenceService};
    use buildcast_state::fakes::MemoryPreferenceStore;
    use http_body_util::BodyExt;
    use std::path::Path;
    use tower::ServiceExt;

    struct TestApp {
        _dir: tempfile::TempDir,
        catalog: Arc<LocalCatalogClient>,
        queue: Arc<InstallQueue>,
        router: Router,
    }

    fn add_build(root: &Path, id: &str, changelog: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{id}.image")), b"img").unwrap();
        std::fs::write(dir.join("changelog.md"), changelog).unwrap();
    }

    fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        add_build(dir.path(), "14.03.2024.1200", "old notes");
        add_build(dir.path(), "15.03.2024.1200", "new notes");
        let catalog = Arc::new(LocalCatalogClient::new(FsBuildCatalog::new(dir.path()).unwrap()));
        let queue = Arc::new(InstallQueue::new());
        let agent = Arc::new(UpdateAgent::new(
            PreferenceService::new(Arc::new(MemoryPreferenceStore::new())),
            catalog.clone(),
            queue.clone(),
        ));
        TestApp {
            _dir: dir,
            catalog,
            queue,
            router: router(agent),
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, String) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn get(app: &TestApp, uri: &str) -> (StatusCode, String) {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(app: &TestApp, uri: &str) -> (StatusCode, String) {
        send(app, Request::post(uri).body(Body::empty()).unwrap()).await
    }

    async fn set_prefs(app: &TestApp, body: serde_json::Value) -> (StatusCode, String) {
        let request = Request::post("/Updates/SetUpdatePreferences")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    fn default_prefs() -> serde_json::Value {
        serde_json::json!({
            "serverAddress": "http://builds.local/",
            "preferredBuild": "latest",
            "autoUpdate": false
        })
    }

    #[tokio::test]
    async fn preferences_round_trip_with_normalized_address() {
        let app = test_app();
        let (status, body) = set_prefs(&app, default_prefs()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Update Preferences Set.");

        let (status, body) = get(&app, "/Updates/GetUpdatePreferences").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "serverAddress": "http://builds.local",
                "preferredBuild": "latest",
                "autoUpdate": false,
                "actualBuild": ""
            })
        );
    }

    #[tokio::test]
    async fn missing_preferences_is_a_bad_request() {
        let app = test_app();
        let (status, body) = get(&app, "/Updates/GetUpdatePreferences").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Update Preferences Not Found.");
    }

    #[tokio::test]
    async fn invalid_preferences_are_rejected() {
        let app = test_app();
        let (status, body) = set_prefs(
            &app,
            serde_json::json!({
                "serverAddress": "http://x",
                "preferredBuild": "newest",
                "autoUpdate": false
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("preferredBuild"));
    }

    #[tokio::test]
    async fn builds_and_changelogs_are_proxied() {
        let app = test_app();
        set_prefs(&app, default_prefs()).await;

        let (status, body) = get(&app, "/Updates/GetBuilds").await;
        assert_eq!(status, StatusCode::OK);
        let listing: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(listing["14.03.2024.1200"], "old notes");

        let (_, body) = get(&app, "/Updates/GetChangelog").await;
        assert_eq!(body, "new notes");

        let (_, body) = get(&app, "/Updates/GetChangelog?buildNumber=14.03.2024.1200").await;
        assert_eq!(body, "old notes");

        let (_, body) = get(&app, "/Updates/IsUpdateAvailable").await;
        assert_eq!(body, "true");
    }

    #[tokio::test]
    async fn start_update_enqueues_and_records_explicit_build() {
        let app = test_app();
        set_prefs(&app, default_prefs()).await;

        let (status, body) = post(&app, "/Updates/StartUpdate?buildNumber=14.03.2024.1200").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Update Started.");
        assert_eq!(app.queue.len(), 1);

        let (_, body) = get(&app, "/Updates/GetUpdatePreferences").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["actualBuild"], "14.03.2024.1200");

        let (status, _) = post(&app, "/Updates/StartUpdate").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.queue.len(), 2);

        let (status, body) = post(&app, "/Updates/StartUpdate?buildNumber=bogus").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Invalid Build Number"));
        assert_eq!(app.queue.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_server_short_circuits_network_routes() {
        let app = test_app();
        set_prefs(&app, default_prefs()).await;
        app.catalog.set_reachable(false);

        for uri in [
            "/Updates/GetBuilds",
            "/Updates/GetChangelog",
            "/Updates/IsUpdateAvailable",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, SERVER_UNREACHABLE, "{uri}");
        }
        let (status, body) = post(&app, "/Updates/StartUpdate").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, SERVER_UNREACHABLE);
        assert!(app.queue.is_empty());

        // Local routes keep working.
        let (status, _) = get(&app, "/Updates/GetUpdatePreferences").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get(&app, "/Updates/GetUpdateStatus").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn status_starts_idle() {
        let app = test_app();
        let (status, body) = get(&app, "/Updates/GetUpdateStatus").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "Idle", "percent": 0 }));
    }
}
