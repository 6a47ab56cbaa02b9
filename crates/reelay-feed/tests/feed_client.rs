//! Integration tests for `FeedClient` using wiremock HTTP mocks.

use chrono::DateTime;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reelay_feed::{
    DownloadOptions, FeedClient, FeedError, FeedQuery, FeedSource, MediaKind, Post,
};

fn test_client(base_url: &str) -> FeedClient {
    FeedClient::new(base_url, 5, "reelay-test/0.1", 0).expect("failed to build test FeedClient")
}

fn query(after: i64) -> FeedQuery {
    FeedQuery {
        resume_after: DateTime::from_timestamp(after, 0).unwrap(),
    }
}

fn post_json(id: &str, create_time: i64) -> serde_json::Value {
    json!({
        "id": id,
        "create_time": create_time,
        "author": "alice",
        "kind": "video",
        "assets": []
    })
}

#[tokio::test]
async fn resolve_identity_returns_gateway_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "6800001"})))
        .mount(&server)
        .await;

    let identity = test_client(&server.uri())
        .resolve_identity("alice")
        .await
        .expect("identity should resolve");
    assert_eq!(identity.id, "6800001");
}

#[tokio::test]
async fn resolve_identity_maps_404_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .resolve_identity("ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::NotFound { .. }), "got: {err:?}");
}

#[tokio::test]
async fn stream_feed_follows_cursor_across_pages_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/alice/posts"))
        .and(query_param("after", "1000"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "posts": [post_json("a", 1001), post_json("b", 1002)],
            "next_cursor": "page2"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/alice/posts"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "posts": [post_json("c", 1003)],
            "next_cursor": null
        })))
        .mount(&server)
        .await;

    let feed = test_client(&server.uri())
        .stream_feed("alice", query(1000))
        .await
        .expect("feed should open");
    assert_eq!(feed.expected, 3);

    let ids: Vec<String> = feed
        .posts
        .map(|item| item.expect("no item errors expected").id)
        .collect()
        .await;
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn stream_feed_reports_bad_items_without_stopping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "posts": [post_json("a", 11), {"id": 5}, post_json("c", 13)]
        })))
        .mount(&server)
        .await;

    let feed = test_client(&server.uri())
        .stream_feed("alice", query(10))
        .await
        .unwrap();
    let items: Vec<Result<Post, FeedError>> = feed.posts.collect().await;

    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(FeedError::Deserialize { .. })));
    assert_eq!(items[2].as_ref().unwrap().id, "c");
}

#[tokio::test]
async fn stream_feed_with_no_updates_reports_zero_expected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "posts": []})))
        .mount(&server)
        .await;

    let feed = test_client(&server.uri())
        .stream_feed("alice", query(0))
        .await
        .unwrap();
    assert_eq!(feed.expected, 0);
    assert_eq!(feed.posts.count().await, 0);
}

#[tokio::test]
async fn stream_feed_surfaces_failing_second_page_as_item_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice/posts"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "posts": [post_json("a", 1)],
            "next_cursor": "broken"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/alice/posts"))
        .and(query_param("cursor", "broken"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let feed = test_client(&server.uri())
        .stream_feed("alice", query(0))
        .await
        .unwrap();
    let items: Vec<Result<Post, FeedError>> = feed.posts.collect().await;
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(
        items[1],
        Err(FeedError::UnexpectedStatus { status: 403, .. })
    ));
}

#[tokio::test]
async fn download_writes_assets_with_template_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdn/1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"first".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/2.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second!".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let post = Post {
        id: "p1".to_owned(),
        create_time: 1_700_000_000,
        author: "alice".to_owned(),
        kind: MediaKind::ImageSet,
        hd_size: 12,
        assets: vec![
            format!("{}/cdn/1.jpg", server.uri()),
            format!("{}/cdn/2.jpg", server.uri()),
        ],
    };
    let options = DownloadOptions {
        target_dir: dir.path().to_path_buf(),
        attempts: 4,
        filename: Some(|post, i| format!("{}-{i}.jpg", post.author)),
    };

    let downloaded = test_client(&server.uri())
        .download(&post, &options)
        .await
        .expect("download should succeed");

    assert_eq!(downloaded.total_bytes, 12);
    assert_eq!(downloaded.files().len(), 2);
    assert_eq!(downloaded.files()[0], dir.path().join("alice-0.jpg"));
    assert_eq!(
        std::fs::read(&downloaded.files()[1]).unwrap(),
        b"second!".to_vec()
    );

    let paths = downloaded.files().to_vec();
    drop(downloaded);
    assert!(paths.iter().all(|p| !p.exists()), "files removed on drop");
}

#[tokio::test]
async fn download_exhausts_attempt_budget_on_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdn/clip.mp4"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let post = Post {
        id: "v1".to_owned(),
        create_time: 1,
        author: "alice".to_owned(),
        kind: MediaKind::Video,
        hd_size: 0,
        assets: vec![format!("{}/cdn/clip.mp4", server.uri())],
    };
    let options = DownloadOptions {
        target_dir: dir.path().to_path_buf(),
        attempts: 4,
        filename: None,
    };

    let err = test_client(&server.uri())
        .download(&post, &options)
        .await
        .unwrap_err();
    assert!(
        matches!(err, FeedError::UnexpectedStatus { status: 502, .. }),
        "got: {err:?}"
    );
    // MockServer verifies `.expect(4)` on drop.
}

#[tokio::test]
async fn download_without_assets_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let post = Post {
        id: "empty".to_owned(),
        create_time: 1,
        author: String::new(),
        kind: MediaKind::Video,
        hd_size: 0,
        assets: vec![],
    };
    let options = DownloadOptions {
        target_dir: dir.path().to_path_buf(),
        attempts: 4,
        filename: None,
    };
    let err = test_client("http://127.0.0.1:9")
        .download(&post, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::NoAssets { ref post_id } if post_id == "empty"));
}
