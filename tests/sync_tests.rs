use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mailmirror::config::SyncConfig;
use mailmirror::store::{AccountStore, MessageUpdate, MirrorStore};
use mailmirror::{SyncError, SyncMode, SyncOptions};
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

mod test_utils;
use test_utils::{ACCESS_TOKEN, insert_account, sync_harness, test_sync_config, token_manager};

fn encode(text: &str) -> String {
    URL_SAFE_NO_PAD.encode(text.as_bytes())
}

fn full_message(id: &str, labels: &[&str], plain: &str) -> Value {
    json!({
        "id": id,
        "threadId": format!("t-{}", id),
        "historyId": "400",
        "labelIds": labels,
        "snippet": format!("snippet {}", id),
        "sizeEstimate": 1024,
        "internalDate": "1700000000000",
        "payload": {
            "mimeType": "multipart/alternative",
            "headers": [
                { "name": "Subject", "value": format!("Subject {}", id) },
                { "name": "From", "value": "alice@example.com" },
                { "name": "To", "value": "me@example.com" }
            ],
            "parts": [
                { "mimeType": "text/plain", "body": { "data": encode(plain) } },
                { "mimeType": "text/html", "body": { "data": encode(&format!("<p>{}</p>", plain)) } }
            ]
        }
    })
}

fn metadata_message(id: &str, labels: &[&str]) -> Value {
    json!({
        "id": id,
        "threadId": format!("t-{}", id),
        "historyId": "510",
        "labelIds": labels,
        "payload": {
            "mimeType": "multipart/alternative",
            "headers": [
                { "name": "Subject", "value": format!("Subject {}", id) }
            ]
        }
    })
}

async fn mount_full_sync(server: &MockServer, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "emailAddress": "me@example.com",
            "historyId": "500",
            "messagesTotal": ids.len()
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "labels": [
                { "id": "INBOX", "name": "INBOX", "type": "system" },
                { "id": "UNREAD", "name": "UNREAD", "type": "system" },
                {
                    "id": "Label_1",
                    "name": "Receipts",
                    "type": "user",
                    "color": { "textColor": "#000000", "backgroundColor": "#ffffff" }
                }
            ]
        })))
        .mount(server)
        .await;

    let refs: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "threadId": format!("t-{}", id) }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/messages"))
        .and(query_param("labelIds", "INBOX"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "messages": refs, "resultSizeEstimate": ids.len() })),
        )
        .mount(server)
        .await;

    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/messages/{}", id)))
            .and(query_param("format", "full"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(full_message(
                    id,
                    &["INBOX", "UNREAD"],
                    &format!("body {}", id),
                )),
            )
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn full_sync_without_cursor_mirrors_mailbox_and_stores_cursor() {
    let server = MockServer::start().await;
    mount_full_sync(&server, &["m1", "m2", "m3"]).await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, None).await.unwrap();

    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.mode, SyncMode::Full);
    assert_eq!(summary.upserted_count, 3);
    assert_eq!(summary.deleted_count, 0);
    assert!(!summary.fell_back);

    let stored = harness.accounts.load(account.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("500"));
    assert!(stored.last_full_sync_at.is_some());

    assert_eq!(harness.mirror.count_messages(account.id).await.unwrap(), 3);
    let m1 = harness
        .mirror
        .find_message(account.id, "m1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(m1.subject.as_deref(), Some("Subject m1"));
    assert_eq!(m1.from_address.as_deref(), Some("alice@example.com"));
    assert_eq!(m1.plain_body.as_deref(), Some("body m1"));
    assert_eq!(m1.html_body.as_deref(), Some("<p>body m1</p>"));
    assert_eq!(m1.label_set(), vec!["INBOX".to_string(), "UNREAD".to_string()]);
    assert_eq!(m1.size_estimate, Some(1024));
    assert!(m1.sent_at.is_some());

    let labels = harness.mirror.list_labels(account.id).await.unwrap();
    assert_eq!(labels.len(), 3);
    let receipts = labels
        .iter()
        .find(|label| label.remote_label_id == "Label_1")
        .unwrap();
    assert_eq!(receipts.name, "Receipts");
    assert_eq!(receipts.background_color.as_deref(), Some("#ffffff"));
}

#[tokio::test]
async fn delta_with_empty_history_changes_nothing() {
    let server = MockServer::start().await;
    mount_full_sync(&server, &["m1", "m2", "m3"]).await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .and(query_param("startHistoryId", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "historyId": "500" })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, None).await.unwrap();

    harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();
    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.mode, SyncMode::Delta);
    assert_eq!(summary.upserted_count, 0);
    assert_eq!(summary.deleted_count, 0);

    let stored = harness.accounts.load(account.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("500"));
    assert_eq!(harness.mirror.count_messages(account.id).await.unwrap(), 3);
}

#[tokio::test]
async fn expired_cursor_falls_back_to_full_sync() {
    let server = MockServer::start().await;
    mount_full_sync(&server, &["m1", "m2"]).await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Requested entity was not found." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, Some("12")).await.unwrap();

    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();

    assert!(summary.fell_back);
    assert_eq!(summary.mode, SyncMode::Full);
    assert_eq!(summary.upserted_count, 2);

    let stored = harness.accounts.load(account.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("500"));
}

#[tokio::test]
async fn forced_full_sync_ignores_stored_cursor() {
    let server = MockServer::start().await;
    mount_full_sync(&server, &["m1"]).await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, Some("42")).await.unwrap();

    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions { force_full: true })
        .await
        .unwrap();

    assert_eq!(summary.mode, SyncMode::Full);
    assert!(!summary.fell_back);
    let stored = harness.accounts.load(account.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("500"));
}

#[tokio::test]
async fn repeated_full_sync_is_idempotent() {
    let server = MockServer::start().await;
    mount_full_sync(&server, &["m1", "m2", "m3"]).await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, None).await.unwrap();

    for _ in 0..2 {
        harness
            .sync
            .sync_mailbox(account.id, SyncOptions { force_full: true })
            .await
            .unwrap();
    }

    assert_eq!(harness.mirror.count_messages(account.id).await.unwrap(), 3);
    assert_eq!(harness.mirror.list_labels(account.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn full_sync_stops_at_message_cap() {
    let server = MockServer::start().await;
    mount_full_sync(&server, &["m1", "m2", "m3"]).await;

    let config = SyncConfig {
        max_full_sync_messages: 2,
        ..test_sync_config()
    };
    let harness = sync_harness(&server.uri(), config).await.unwrap();
    let account = insert_account(&harness.accounts, None).await.unwrap();

    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.upserted_count, 2);
    assert_eq!(harness.mirror.count_messages(account.id).await.unwrap(), 2);

    let requests = server.received_requests().await.unwrap();
    let listing = requests
        .iter()
        .find(|request| request.url.path() == "/messages")
        .unwrap();
    assert!(
        listing
            .url
            .query_pairs()
            .any(|(key, value)| key == "maxResults" && value == "2")
    );
}

async fn seed_message(
    harness: &test_utils::SyncHarness,
    account_id: Uuid,
    id: &str,
    labels: &[&str],
    plain: Option<&str>,
) {
    let update = MessageUpdate {
        remote_message_id: id.to_string(),
        label_ids: labels.iter().map(|l| l.to_string()).collect(),
        subject: Some(format!("Subject {}", id)),
        plain_body: plain.map(str::to_string),
        ..Default::default()
    };
    harness.mirror.upsert_message(account_id, &update).await.unwrap();
}

#[tokio::test]
async fn delta_applies_classified_history_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .and(query_param("startHistoryId", "500"))
        .and(query_param("historyTypes", "messageAdded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [
                { "id": "501", "messagesAdded": [{ "message": { "id": "m4" } }] },
                { "id": "503", "labelsRemoved": [{ "message": { "id": "m4" }, "labelIds": ["UNREAD"] }] },
                { "id": "502", "labelsAdded": [{ "message": { "id": "m1" }, "labelIds": ["STARRED"] }] },
                { "id": "502", "messagesDeleted": [{ "message": { "id": "m2" } }] },
                { "id": "502", "labelsAdded": [{ "message": { "id": "m2" }, "labelIds": ["STARRED"] }] }
            ],
            "historyId": "503"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages/m4"))
        .and(query_param("format", "full"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(full_message("m4", &["INBOX"], "new one")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages/m1"))
        .and(query_param("format", "metadata"))
        .and(query_param("metadataHeaders", "Subject"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(metadata_message("m1", &["INBOX", "STARRED"])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages/m2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_message("m2", &[], "x")))
        .expect(0)
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, Some("500")).await.unwrap();
    seed_message(&harness, account.id, "m1", &["INBOX"], Some("kept body")).await;
    seed_message(&harness, account.id, "m2", &["INBOX"], None).await;

    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.mode, SyncMode::Delta);
    assert_eq!(summary.upserted_count, 2);
    assert_eq!(summary.deleted_count, 1);

    let m1 = harness
        .mirror
        .find_message(account.id, "m1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(m1.label_set(), vec!["INBOX".to_string(), "STARRED".to_string()]);
    assert_eq!(m1.plain_body.as_deref(), Some("kept body"));

    let m4 = harness
        .mirror
        .find_message(account.id, "m4")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(m4.plain_body.as_deref(), Some("new one"));

    assert!(
        harness
            .mirror
            .find_message(account.id, "m2")
            .await
            .unwrap()
            .is_none()
    );

    let stored = harness.accounts.load(account.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("503"));
}

#[tokio::test]
async fn delta_commits_cursor_per_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [{ "id": "520", "messagesAdded": [{ "message": { "id": "m6" } }] }]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [{ "id": "510", "messagesAdded": [{ "message": { "id": "m5" } }] }],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages/m5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_message("m5", &["INBOX"], "5")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages/m6"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, Some("500")).await.unwrap();

    let err = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RemoteApi { status: 500, .. }));

    // First page completed, second did not.
    let stored = harness.accounts.load(account.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("510"));
    assert!(
        harness
            .mirror
            .find_message(account.id, "m5")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn overlapping_pass_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "historyId": "500" }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, Some("500")).await.unwrap();

    let (first, second) = tokio::join!(
        harness.sync.sync_mailbox(account.id, SyncOptions::default()),
        harness.sync.sync_mailbox(account.id, SyncOptions::default()),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(SyncError::SyncInProgress(id)) if id == account.id));

    // The lock is released once the first pass finishes.
    harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_account_is_reported() {
    let server = MockServer::start().await;
    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();

    let missing = Uuid::new_v4();
    let err = harness
        .sync
        .sync_mailbox(missing, SyncOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::AccountNotFound(id) if id == missing));
}

#[tokio::test]
async fn token_refresh_on_older_copy_keeps_committed_cursor() {
    let server = MockServer::start().await;
    mount_full_sync(&server, &["m1"]).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "refreshed-access",
            "expires_in": 3600,
            "refresh_token": "refresh-2"
        })))
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), test_sync_config()).await.unwrap();
    let account = insert_account(&harness.accounts, None).await.unwrap();

    // Copy taken before the pass, as a concurrent label operation would hold it.
    let mut older = harness.accounts.load(account.id).await.unwrap().unwrap();
    older.token_expiry = Some((chrono::Utc::now() - chrono::Duration::seconds(10)).into());

    harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();

    let tokens = token_manager(&format!("{}/token", server.uri()), harness.accounts.clone());
    let token = tokens.ensure_access_token(&mut older).await.unwrap();
    assert_eq!(token, "refreshed-access");

    let stored = harness.accounts.load(account.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("500"));
    assert!(stored.last_full_sync_at.is_some());
    assert_eq!(stored.access_token.as_deref(), Some("refreshed-access"));
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
}

const PAUSE_MS: u64 = 250;

fn paced_config() -> SyncConfig {
    SyncConfig {
        rate_limit_delay_ms: PAUSE_MS,
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn full_sync_pauses_before_each_message_fetch_only() {
    let server = MockServer::start().await;
    mount_full_sync(&server, &["m1", "m2", "m3"]).await;

    let harness = sync_harness(&server.uri(), paced_config()).await.unwrap();
    let account = insert_account(&harness.accounts, None).await.unwrap();

    let started = std::time::Instant::now();
    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.upserted_count, 3);
    // Three fetches pause three times; profile, labels and listing do not pause.
    assert!(elapsed >= Duration::from_millis(3 * PAUSE_MS), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(5 * PAUSE_MS), "{elapsed:?}");
}

#[tokio::test]
async fn delta_pauses_once_per_fetched_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [
                { "id": "501", "messagesAdded": [{ "message": { "id": "m4" } }] },
                { "id": "502", "labelsAdded": [{ "message": { "id": "m1" }, "labelIds": ["STARRED"] }] }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages/m4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_message("m4", &["INBOX"], "x")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_message("m1", &["STARRED"])))
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), paced_config()).await.unwrap();
    let account = insert_account(&harness.accounts, Some("500")).await.unwrap();

    let started = std::time::Instant::now();
    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.upserted_count, 2);
    assert!(elapsed >= Duration::from_millis(2 * PAUSE_MS), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(3 * PAUSE_MS), "{elapsed:?}");
}

#[tokio::test]
async fn delta_without_changes_does_not_pause() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "historyId": "500" })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = sync_harness(&server.uri(), paced_config()).await.unwrap();
    let account = insert_account(&harness.accounts, Some("500")).await.unwrap();

    let started = std::time::Instant::now();
    let summary = harness
        .sync
        .sync_mailbox(account.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.upserted_count, 0);
    assert!(started.elapsed() < Duration::from_millis(PAUSE_MS));
}
