//! Wire-level tests for the GitHub object store.
//!
//! A `wiremock` server stands in for the GitHub git data API, so these tests
//! check request shapes and the mapping of HTTP statuses to `StoreError`.

use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stagepush::core::changeset::ChangeSet;
use stagepush::core::staging::StagingArea;
use stagepush::core::types::{BranchName, Oid, StagePath};
use stagepush::engine::{PublishCycle, PublishOutcome};
use stagepush::store::github::GitHubStore;
use stagepush::store::{
    BlobContent, CreateTreeRequest, FileMode, ObjectKind, ObjectStore, StoreError, TreeEntry,
    UpdateRefRequest,
};

const BASE: &str = "/repos/octo/site/git";

fn sha(c: char) -> String {
    std::iter::repeat(c).take(40).collect()
}

fn oid(c: char) -> Oid {
    Oid::new(sha(c)).unwrap()
}

fn main_branch() -> BranchName {
    BranchName::new("main").unwrap()
}

fn store_for(server: &MockServer) -> GitHubStore {
    GitHubStore::with_api_base(
        Some("ghp_test".to_string()),
        "octo",
        "site",
        server.uri(),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn error_body(message: &str) -> serde_json::Value {
    json!({ "message": message })
}

// =============================================================================
// Reads
// =============================================================================

mod reads {
    use super::*;

    #[tokio::test]
    async fn get_ref_returns_head() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/ref/heads/main", BASE)))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ref": "refs/heads/main",
                "object": { "sha": sha('a'), "type": "commit" }
            })))
            .mount(&server)
            .await;

        let head = store_for(&server).get_ref(&main_branch()).await.unwrap();
        assert_eq!(head, Some(oid('a')));
    }

    #[tokio::test]
    async fn get_ref_missing_branch_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/ref/heads/main", BASE)))
            .respond_with(ResponseTemplate::new(404).set_body_json(error_body("Not Found")))
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).get_ref(&main_branch()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_ref_empty_repository_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/ref/heads/main", BASE)))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(error_body("Git Repository is empty.")),
            )
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).get_ref(&main_branch()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_commit_reads_tree_and_parents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/commits/{}", BASE, sha('c'))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": sha('c'),
                "tree": { "sha": sha('t') },
                "parents": [{ "sha": sha('p') }],
                "message": "C1"
            })))
            .mount(&server)
            .await;

        let commit = store_for(&server).get_commit(&oid('c')).await.unwrap();
        assert_eq!(commit.tree, oid('t'));
        assert_eq!(commit.parents, vec![oid('p')]);
        assert_eq!(commit.message, "C1");
    }

    #[tokio::test]
    async fn get_tree_is_recursive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/trees/{}", BASE, sha('t'))))
            .and(query_param("recursive", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": sha('t'),
                "tree": [
                    { "path": "css", "mode": "040000", "type": "tree", "sha": sha('d') },
                    { "path": "css/site.css", "mode": "100644", "type": "blob", "sha": sha('b') }
                ],
                "truncated": false
            })))
            .mount(&server)
            .await;

        let entries = store_for(&server).get_tree(&oid('t')).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, ObjectKind::Tree);
        assert_eq!(
            entries[1],
            TreeEntry {
                path: "css/site.css".to_string(),
                mode: FileMode::Regular,
                kind: ObjectKind::Blob,
                oid: oid('b'),
            }
        );
    }

    #[tokio::test]
    async fn get_blob_decodes_wrapped_base64() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/blobs/{}", BASE, sha('b'))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": sha('b'),
                "size": 11,
                "content": "PGgxPmhp\nPC9oMT4=\n",
                "encoding": "base64"
            })))
            .mount(&server)
            .await;

        let bytes = store_for(&server).get_blob(&oid('b')).await.unwrap();
        assert_eq!(bytes, b"<h1>hi</h1>");
    }

    #[tokio::test]
    async fn get_blob_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/blobs/{}", BASE, sha('b'))))
            .respond_with(ResponseTemplate::new(404).set_body_json(error_body("Not Found")))
            .mount(&server)
            .await;

        let err = store_for(&server).get_blob(&oid('b')).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn truncated_tree_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/trees/{}", BASE, sha('t'))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": sha('t'),
                "tree": [],
                "truncated": true
            })))
            .mount(&server)
            .await;

        let err = store_for(&server).get_tree(&oid('t')).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidResponse(_)));
    }
}

// =============================================================================
// Writes
// =============================================================================

mod writes {
    use super::*;

    #[tokio::test]
    async fn text_blob_is_sent_as_utf8() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/blobs", BASE)))
            .and(body_json(json!({ "content": "hello", "encoding": "utf-8" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": sha('b') })))
            .expect(1)
            .mount(&server)
            .await;

        let blob = store_for(&server)
            .create_blob(BlobContent::new(b"hello".to_vec()))
            .await
            .unwrap();
        assert_eq!(blob, oid('b'));
    }

    #[tokio::test]
    async fn binary_blob_is_sent_as_base64() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/blobs", BASE)))
            .and(body_json(json!({ "content": "AP8K", "encoding": "base64" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": sha('b') })))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .create_blob(BlobContent::new(vec![0x00, 0xff, 0x0a]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tree_is_layered_on_base() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/trees", BASE)))
            .and(body_json(json!({
                "base_tree": sha('t'),
                "tree": [{ "path": "a.txt", "mode": "100644", "type": "blob", "sha": sha('b') }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": sha('n') })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CreateTreeRequest {
            base_tree: Some(oid('t')),
            entries: vec![TreeEntry::file(&StagePath::new("a.txt").unwrap(), oid('b'))],
        };
        assert_eq!(
            store_for(&server).create_tree(request).await.unwrap(),
            oid('n')
        );
    }

    #[tokio::test]
    async fn update_ref_never_forces() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/refs/heads/main", BASE)))
            .and(body_json(json!({ "sha": sha('n'), "force": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ref": "refs/heads/main",
                "object": { "sha": sha('n'), "type": "commit" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = UpdateRefRequest {
            new: oid('n'),
            expected: oid('a'),
        };
        store_for(&server)
            .update_ref(&main_branch(), request)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_ref_sends_full_ref() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/refs", BASE)))
            .and(body_json(json!({ "ref": "refs/heads/main", "sha": sha('n') })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "ref": "refs/heads/main",
                "object": { "sha": sha('n'), "type": "commit" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .create_ref(&main_branch(), &oid('n'))
            .await
            .unwrap();
    }
}

// =============================================================================
// Error mapping
// =============================================================================

mod errors {
    use super::*;

    async fn update_ref_with(status: u16, message: &str) -> StoreError {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/refs/heads/main", BASE)))
            .respond_with(ResponseTemplate::new(status).set_body_json(error_body(message)))
            .mount(&server)
            .await;

        let request = UpdateRefRequest {
            new: oid('n'),
            expected: oid('a'),
        };
        store_for(&server)
            .update_ref(&main_branch(), request)
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn non_fast_forward_is_conflict() {
        let err = update_ref_with(422, "Update is not a fast forward").await;
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_ref_on_update_is_not_found() {
        let err = update_ref_with(422, "Reference does not exist").await;
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn existing_ref_on_create_is_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/refs", BASE)))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(error_body("Reference already exists")),
            )
            .mount(&server)
            .await;

        let err = store_for(&server)
            .create_ref(&main_branch(), &oid('n'))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn unauthorized_is_auth_failed() {
        let err = update_ref_with(401, "Bad credentials").await;
        assert!(matches!(err, StoreError::AuthFailed(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn exhausted_quota_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/commits/{}", BASE, sha('c'))))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("X-RateLimit-Remaining", "0")
                    .set_body_json(error_body("API rate limit exceeded")),
            )
            .mount(&server)
            .await;

        let err = store_for(&server).get_commit(&oid('c')).await.unwrap_err();
        assert!(matches!(err, StoreError::RateLimited));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let err = update_ref_with(429, "slow down").await;
        assert!(matches!(err, StoreError::RateLimited));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let err = update_ref_with(502, "Bad Gateway").await;
        assert!(matches!(err, StoreError::ApiError { status: 502, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn missing_token_fails_before_sending() {
        let server = MockServer::start().await;
        let store = GitHubStore::with_api_base(
            None,
            "octo",
            "site",
            server.uri(),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = store.get_ref(&main_branch()).await.unwrap_err();
        assert!(matches!(err, StoreError::AuthRequired));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}

// =============================================================================
// Full cycle over HTTP
// =============================================================================

#[tokio::test]
async fn genesis_cycle_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/ref/heads/main", BASE)))
        .respond_with(ResponseTemplate::new(404).set_body_json(error_body("Not Found")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/blobs", BASE)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": sha('b') })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/trees", BASE)))
        .and(body_json(json!({
            "tree": [{ "path": "index.html", "mode": "100644", "type": "blob", "sha": sha('b') }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": sha('t') })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/commits", BASE)))
        .and(body_json(json!({ "message": "init", "tree": sha('t'), "parents": [] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": sha('c') })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/refs", BASE)))
        .and(body_json(json!({ "ref": "refs/heads/main", "sha": sha('c') })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ref": "refs/heads/main",
            "object": { "sha": sha('c'), "type": "commit" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let tracker = ChangeSet::new();
    let staging = StagingArea::new(dir.path().to_path_buf(), tracker.clone());
    staging
        .write(&StagePath::new("index.html").unwrap(), b"<h1>hi</h1>")
        .unwrap();

    let store = store_for(&server);
    let outcome = PublishCycle::new(&store, &staging, main_branch())
        .with_timeout(Duration::from_secs(5))
        .run(&tracker, "init")
        .await
        .unwrap();

    let PublishOutcome::Published(report) = outcome else {
        panic!("expected a publish, got {:?}", outcome);
    };
    assert_eq!(report.commit, oid('c'));
    assert_eq!(report.tree, oid('t'));
    assert!(tracker.is_empty());
}
