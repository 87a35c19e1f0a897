//! Router wiring tests

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use quillboard::error::QbResult;
use quillboard::snapshot_adapter::SnapshotAdapter;
use quillboard_core::{AppOpts, AppState};

#[derive(Debug)]
struct NullSnapshotAdapter;

#[async_trait]
impl SnapshotAdapter for NullSnapshotAdapter {
	async fn load_snapshot(&self, _doc_id: &str) -> QbResult<Option<Vec<u8>>> {
		Ok(None)
	}
	async fn save_snapshot(&self, _doc_id: &str, _data: &[u8]) -> QbResult<()> {
		Ok(())
	}
}

fn test_router() -> axum::Router {
	let app = AppState::new(
		AppOpts { listen: "127.0.0.1:0".into(), token_secret: "test-secret".into() },
		Arc::new(NullSnapshotAdapter),
	);
	quillboard::routes::init(app)
}

#[tokio::test]
async fn health_endpoint_responds() {
	let router = test_router();
	let response = router
		.oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let body = response.into_body().collect().await.unwrap().to_bytes();
	assert_eq!(&body[..], b"OK\n");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
	let router = test_router();
	let response = router
		.oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// vim: ts=4
