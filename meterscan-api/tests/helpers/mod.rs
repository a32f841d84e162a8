//! Shared helpers for meterscan-api integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use meterscan_api::services::{VisionClient, VisionError, VisionReading};
use meterscan_api::{build_router, AppState};
use meterscan_common::MeasureType;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Vision client with a scripted outcome
pub struct FakeVision {
    pub value: f64,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeVision {
    pub fn ok(value: f64) -> Arc<Self> {
        Arc::new(Self {
            value,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            value: 0.0,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClient for FakeVision {
    async fn analyze(
        &self,
        _image_base64: &str,
        _measure_type: MeasureType,
    ) -> Result<VisionReading, VisionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VisionError::ApiError(503, "model overloaded".to_string()));
        }
        let measure_uuid = format!("fake-measure-{}", n);
        Ok(VisionReading {
            image_url: format!("http://localhost:3000/temp/{}.jpg", measure_uuid),
            measure_value: self.value,
            measure_uuid,
        })
    }
}

/// State over a fresh in-memory database
pub async fn test_state(vision: Arc<FakeVision>, images_dir: PathBuf) -> AppState {
    let pool = meterscan_common::db::init_memory_database()
        .await
        .expect("in-memory database");
    AppState::new(pool, vision, images_dir)
}

pub async fn test_app(vision: Arc<FakeVision>) -> axum::Router {
    build_router(test_state(vision, std::env::temp_dir()).await)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
