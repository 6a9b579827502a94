//! Retry queue integration tests: enqueue on total failure, bounded
//! redrives, drops for missing bills, and successful redelivery.

mod common;

use billdesk::services::retry_tick;
use common::TestApp;
use serde_json::json;

/// "12345" fails the WhatsApp pattern and is too short for SMS, so every
/// dispatch attempt for it fails hard.
async fn create_undeliverable_bill(app: &TestApp) -> u64 {
    let bill = app
        .create_bill("Asha", "12345", TestApp::tea_items())
        .await;
    bill["id"].as_u64().expect("bill id")
}

#[tokio::test]
async fn total_failure_enqueues_exactly_one_entry() {
    let app = TestApp::spawn().await;
    let bill_id = create_undeliverable_bill(&app).await;

    let response = app
        .client
        .post(app.url("/bills/1/notify"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 422);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Invalid phone number");

    let entries = app.state.retries.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].bill_id, bill_id);
    assert_eq!(entries[0].attempts, 1);
    assert_eq!(entries[0].phone, "12345");
}

#[tokio::test]
async fn three_failed_redrives_drop_the_entry_and_flag_the_bill() {
    let app = TestApp::spawn().await;
    create_undeliverable_bill(&app).await;
    app.client
        .post(app.url("/bills/1/notify"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");

    // First two sweeps requeue with a bumped attempt count.
    for expected_attempts in [2, 3] {
        let processed = retry_tick(&app.state.dispatcher, &app.state.retries, &app.state.store)
            .await
            .expect("sweep should not error");
        assert!(processed);
        let entries = app.state.retries.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attempts, expected_attempts);
    }

    // Third failed redrive exhausts the bound: dropped, not requeued.
    let processed = retry_tick(&app.state.dispatcher, &app.state.retries, &app.state.store)
        .await
        .expect("sweep should not error");
    assert!(processed);
    assert_eq!(app.state.retries.len().await, 0);

    let bill: serde_json::Value = app
        .client
        .get(app.url("/bills/1"))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(bill["notification_failed"], true);

    // Nothing left to sweep.
    let processed = retry_tick(&app.state.dispatcher, &app.state.retries, &app.state.store)
        .await
        .expect("sweep should not error");
    assert!(!processed);
}

#[tokio::test]
async fn retry_for_a_deleted_bill_is_dropped() {
    let app = TestApp::spawn().await;
    create_undeliverable_bill(&app).await;
    app.client
        .post(app.url("/bills/1/notify"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(app.state.retries.len().await, 1);

    app.client
        .delete(app.url("/bills/1"))
        .send()
        .await
        .expect("Failed to execute request");

    let processed = retry_tick(&app.state.dispatcher, &app.state.retries, &app.state.store)
        .await
        .expect("sweep should not error");
    assert!(processed);
    assert_eq!(app.state.retries.len().await, 0);
}

#[tokio::test]
async fn successful_redrive_removes_the_entry() {
    let app = TestApp::spawn().await;
    create_undeliverable_bill(&app).await;
    app.client
        .post(app.url("/bills/1/notify"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(app.state.retries.len().await, 1);

    // Disabling the SMS channel turns its sends into synthetic successes,
    // so the next sweep delivers.
    app.client
        .put(app.url("/settings/sms"))
        .json(&json!({ "enabled": false }))
        .send()
        .await
        .expect("Failed to execute request");

    let processed = retry_tick(&app.state.dispatcher, &app.state.retries, &app.state.store)
        .await
        .expect("sweep should not error");
    assert!(processed);
    assert_eq!(app.state.retries.len().await, 0);

    let bill: serde_json::Value = app
        .client
        .get(app.url("/bills/1"))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(bill["sms_sent"], true);
    assert!(bill["provider_sid"]
        .as_str()
        .expect("sid stored")
        .starts_with("DISABLED_"));
    assert_eq!(bill["notification_failed"], false);
}

#[tokio::test]
async fn pending_retries_survive_a_restart() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    let app = TestApp::spawn_on(dir.path()).await;
    create_undeliverable_bill(&app).await;
    app.client
        .post(app.url("/bills/1/notify"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(app.state.retries.len().await, 1);

    let app = TestApp::spawn_on(dir.path()).await;
    let entries = app.state.retries.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].phone, "12345");
}
