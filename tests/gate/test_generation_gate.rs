// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for the admission -> provider -> history pipeline

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracklist_art::admission::{AdmissionConfig, AdmissionController, ManualClock};
use tracklist_art::{
    ArtifactStore, GeneratedImage, GenerationError, GenerationGate, GenerationOutcome,
    GenerationRequest, ImageProvider, OwnerId, RejectReason, SessionKey,
};

struct MockProvider {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for MockProvider {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedImage> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("provider quota exhausted");
        }
        Ok(GeneratedImage {
            image_url: format!("https://img.test/{}-{}.png", n, prompt.len()),
            model: Some("mock-diffusion".to_string()),
        })
    }
}

fn gate() -> (GenerationGate, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let admission = Arc::new(AdmissionController::with_clock(
        AdmissionConfig::default(),
        clock.clone(),
    ));
    let store = Arc::new(ArtifactStore::in_memory());
    (GenerationGate::new(admission, store), clock)
}

fn request(prompt: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        songs: vec!["Opening".to_string(), "Closing".to_string()],
        metadata: serde_json::Map::new(),
    }
}

#[tokio::test]
async fn test_allowed_request_is_recorded() {
    let (gate, _) = gate();
    let provider = MockProvider::new();
    let session = SessionKey::new("session-1");
    let owner = OwnerId::new("user-1");

    let outcome = gate
        .generate(&session, &owner, &request("city at dusk"), &provider)
        .await
        .unwrap();

    let record = match outcome {
        GenerationOutcome::Created(record) => record,
        GenerationOutcome::Throttled(r) => panic!("unexpected throttle: {}", r),
    };
    assert_eq!(provider.calls(), 1);
    assert_eq!(record.payload.songs.len(), 2);
    assert_eq!(record.payload.prompt, "city at dusk");
    assert_eq!(
        record.payload.metadata.get("model"),
        Some(&Value::String("mock-diffusion".to_string()))
    );
    assert!(record.payload.metadata.contains_key("processingTimeMs"));

    assert_eq!(gate.store().list(&owner).await, vec![record]);
}

#[tokio::test]
async fn test_throttled_request_skips_provider() {
    let (gate, _) = gate();
    let provider = MockProvider::new();
    let session = SessionKey::new("session-2");
    let owner = OwnerId::new("user-2");

    gate.generate(&session, &owner, &request("first"), &provider)
        .await
        .unwrap();
    let outcome = gate
        .generate(&session, &owner, &request("second"), &provider)
        .await
        .unwrap();

    let rejection = match outcome {
        GenerationOutcome::Throttled(rejection) => rejection,
        GenerationOutcome::Created(_) => panic!("second request should be throttled"),
    };
    assert_eq!(rejection.reason, RejectReason::Cooldown);
    assert_eq!(provider.calls(), 1);
    assert_eq!(gate.store().list(&owner).await.len(), 1);

    let response = rejection.into_response();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "30");
}

#[tokio::test]
async fn test_invalid_request_does_not_consume_quota() {
    let (gate, _) = gate();
    let provider = MockProvider::new();
    let session = SessionKey::new("session-3");
    let owner = OwnerId::new("user-3");

    let err = gate
        .generate(&session, &owner, &request("   "), &provider)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::InvalidRequest(_)));
    assert_eq!(provider.calls(), 0);
    assert!(gate.admission().snapshot(&session).is_none());

    let outcome = gate
        .generate(&session, &owner, &request("valid"), &provider)
        .await
        .unwrap();
    assert!(matches!(outcome, GenerationOutcome::Created(_)));
}

#[tokio::test]
async fn test_provider_failure_stores_nothing() {
    let (gate, clock) = gate();
    let provider = MockProvider::new();
    provider.fail.store(true, Ordering::SeqCst);
    let session = SessionKey::new("session-4");
    let owner = OwnerId::new("user-4");

    let err = gate
        .generate(&session, &owner, &request("stormy sea"), &provider)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Provider(_)));
    assert!(gate.store().list(&owner).await.is_empty());

    // The attempt still counted against the session
    assert_eq!(gate.admission().snapshot(&session).unwrap().total_requests, 1);

    provider.fail.store(false, Ordering::SeqCst);
    clock.advance(Duration::from_secs(30));
    let outcome = gate
        .generate(&session, &owner, &request("stormy sea"), &provider)
        .await
        .unwrap();
    assert!(matches!(outcome, GenerationOutcome::Created(_)));
}

#[tokio::test]
async fn test_session_limit_across_owners() {
    let (gate, clock) = gate();
    let provider = MockProvider::new();
    let session = SessionKey::from_client("198.51.100.4", Some("Mozilla/5.0"));

    for i in 0..10 {
        let owner = OwnerId::new(format!("user-{}", i % 2));
        let outcome = gate
            .generate(&session, &owner, &request("loop"), &provider)
            .await
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::Created(_)));
        clock.advance(Duration::from_secs(30));
    }

    let outcome = gate
        .generate(&session, &OwnerId::anonymous(), &request("loop"), &provider)
        .await
        .unwrap();
    match outcome {
        GenerationOutcome::Throttled(r) => assert_eq!(r.reason, RejectReason::SessionLimit),
        GenerationOutcome::Created(_) => panic!("session cap should apply"),
    }
    assert_eq!(provider.calls(), 10);
    assert_eq!(gate.store().stats(&OwnerId::new("user-0")).await.count, 5);
}
