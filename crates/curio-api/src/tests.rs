use std::{path::PathBuf, sync::Arc};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use curio_engage::{
  EngageConfig,
  Engagement,
  bus::LifecycleBus,
  fingerprint::FingerprintResolver,
  fs_objects::FsObjectStore,
  memory::MemoryCache,
};
use curio_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use super::*;

struct TestApp {
  state:      AppState<SqliteStore, MemoryCache>,
  object_dir: PathBuf,
}

async fn make_app() -> TestApp {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let object_dir = std::env::temp_dir().join(format!("curio-api-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&object_dir).unwrap();
  let objects = Arc::new(FsObjectStore::new(object_dir.clone()));
  let bus = Arc::new(LifecycleBus::spawn(store.clone(), objects));
  let engine = Engagement::new(
    store,
    Arc::new(MemoryCache::new()),
    bus,
    EngageConfig::default(),
  );
  TestApp {
    state: AppState {
      engine,
      fingerprints: Arc::new(FingerprintResolver::default()),
    },
    object_dir,
  }
}

async fn send(
  app: &TestApp,
  method: &str,
  uri: &str,
  headers: &[(&str, &str)],
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(*k, *v);
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = router(app.state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn create_subject(app: &TestApp, kind: &str, body: &str) -> i64 {
  let (status, subject) = send(
    app,
    "POST",
    "/subjects",
    &[],
    Some(json!({ "kind": kind, "title": "hello", "body": body })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  subject["subject_id"].as_i64().unwrap()
}

async fn create_actor(app: &TestApp, handle: &str) -> i64 {
  let (status, actor) = send(app, "POST", "/actors", &[], Some(json!({ "handle": handle }))).await;
  assert_eq!(status, StatusCode::CREATED);
  actor["actor_id"].as_i64().unwrap()
}

// ─── Subjects ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_get_returns_zeroed_counters() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "").await;

  let (status, subject) = send(&app, "GET", &format!("/subjects/{id}"), &[], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(subject["kind"], "post");
  assert_eq!(subject["view_count"], 0);
  assert_eq!(subject["like_count"], 0);
  assert_eq!(subject["click_count"], 0);
}

#[tokio::test]
async fn empty_title_is_rejected() {
  let app = make_app().await;
  let (status, body) = send(
    &app,
    "POST",
    "/subjects",
    &[],
    Some(json!({ "kind": "post", "title": "  " })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("title"));
}

#[tokio::test]
async fn missing_subject_returns_404_everywhere() {
  let app = make_app().await;
  let actor = create_actor(&app, "ana").await;

  for (method, uri, body) in [
    ("GET", "/subjects/999", None),
    ("DELETE", "/subjects/999", None),
    ("PUT", "/subjects/999", Some(json!({ "body": "x" }))),
    ("POST", "/subjects/999/views", None),
    ("POST", "/subjects/999/clicks", None),
    ("POST", "/subjects/999/likes", Some(json!({ "actor_id": actor }))),
    ("POST", "/subjects/999/images", Some(json!({ "name": "a.png" }))),
  ] {
    let (status, resp) =
      send(&app, method, uri, &[("x-forwarded-for", "1.2.3.4")], body).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
    assert!(resp["error"].is_string());
  }
}

#[tokio::test]
async fn delete_returns_204_then_404() {
  let app = make_app().await;
  let id = create_subject(&app, "playlist", "").await;

  let (status, _) = send(&app, "DELETE", &format!("/subjects/{id}"), &[], None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, _) = send(&app, "GET", &format!("/subjects/{id}"), &[], None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Views and clicks ─────────────────────────────────────────────────────────

#[tokio::test]
async fn repeat_view_from_same_visitor_counts_once() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "").await;
  let uri = format!("/subjects/{id}/views");

  let (status, first) = send(&app, "POST", &uri, &[("x-forwarded-for", "1.2.3.4")], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(first["counted"], true);
  assert_eq!(first["view_count"], 1);

  let (_, second) = send(
    &app,
    "POST",
    &uri,
    &[("x-forwarded-for", "1.2.3.4, 10.0.0.1")],
    None,
  )
  .await;
  assert_eq!(second["counted"], false);
  assert_eq!(second["view_count"], 1);

  let (_, other) = send(&app, "POST", &uri, &[("x-real-ip", "5.6.7.8")], None).await;
  assert_eq!(other["counted"], true);
  assert_eq!(other["view_count"], 2);
}

#[tokio::test]
async fn unknown_visitor_is_not_counted_but_succeeds() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "").await;

  let (status, counts) = send(&app, "POST", &format!("/subjects/{id}/views"), &[], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(counts["counted"], false);
  assert_eq!(counts["view_count"], 0);
}

#[tokio::test]
async fn clicks_are_counted_apart_from_views() {
  let app = make_app().await;
  let id = create_subject(&app, "link", "").await;
  let visitor = [("x-forwarded-for", "9.9.9.9")];

  send(&app, "POST", &format!("/subjects/{id}/views"), &visitor, None).await;
  let (_, counts) = send(&app, "POST", &format!("/subjects/{id}/clicks"), &visitor, None).await;
  assert_eq!(counts["counted"], true);
  assert_eq!(counts["view_count"], 1);
  assert_eq!(counts["click_count"], 1);
}

// ─── Likes ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn like_toggles_on_and_off() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "").await;
  let actor = create_actor(&app, "ana").await;
  let uri = format!("/subjects/{id}/likes");

  let (status, liked) = send(&app, "POST", &uri, &[], Some(json!({ "actor_id": actor }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(liked["liked"], true);
  assert_eq!(liked["like_count"], 1);

  let (_, unliked) = send(&app, "POST", &uri, &[], Some(json!({ "actor_id": actor }))).await;
  assert_eq!(unliked["liked"], false);
  assert_eq!(unliked["like_count"], 0);

  let (_, subject) = send(&app, "GET", &format!("/subjects/{id}"), &[], None).await;
  assert_eq!(subject["like_count"], 0);
}

#[tokio::test]
async fn like_by_missing_actor_returns_404() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "").await;

  let (status, body) = send(
    &app,
    "POST",
    &format!("/subjects/{id}/likes"),
    &[],
    Some(json!({ "actor_id": 42 })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("actor 42"));
}

#[tokio::test]
async fn resync_reports_live_edge_count() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "").await;
  for handle in ["a", "b", "c"] {
    let actor = create_actor(&app, handle).await;
    send(
      &app,
      "POST",
      &format!("/subjects/{id}/likes"),
      &[],
      Some(json!({ "actor_id": actor })),
    )
    .await;
  }

  let (status, resync) = send(&app, "POST", &format!("/subjects/{id}/likes/resync"), &[], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(resync["subject_id"], id);
  assert_eq!(resync["like_count"], 3);
}

// ─── Image cleanup ────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_removes_unreferenced_image_after_commit() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "![a](old.png) ![b](keep.png)").await;

  for name in ["old.png", "keep.png"] {
    std::fs::write(app.object_dir.join(name), b"img").unwrap();
    let (status, image) = send(
      &app,
      "POST",
      &format!("/subjects/{id}/images"),
      &[],
      Some(json!({ "name": format!("https://cdn.example/{name}") })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(image["name"], name);
  }

  let (status, subject) = send(
    &app,
    "PUT",
    &format!("/subjects/{id}"),
    &[],
    Some(json!({ "body": "only ![b](keep.png) now" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(subject["body"], "only ![b](keep.png) now");

  app.state.engine.bus().close().await;

  assert!(!app.object_dir.join("old.png").exists());
  assert!(app.object_dir.join("keep.png").exists());
  let remaining = app.state.engine.store().images_for_subject(id).await.unwrap();
  let names: Vec<_> = remaining.iter().map(|i| i.name.as_str()).collect();
  assert_eq!(names, ["keep.png"]);
}

#[tokio::test]
async fn delete_removes_every_image_after_commit() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "![a](a.png)").await;
  std::fs::write(app.object_dir.join("a.png"), b"img").unwrap();
  send(
    &app,
    "POST",
    &format!("/subjects/{id}/images"),
    &[],
    Some(json!({ "name": "a.png" })),
  )
  .await;

  let (status, _) = send(&app, "DELETE", &format!("/subjects/{id}"), &[], None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  app.state.engine.bus().close().await;
  assert!(!app.object_dir.join("a.png").exists());
  assert!(app.state.engine.store().images_for_subject(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn registering_an_indexed_image_twice_conflicts() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "").await;
  let uri = format!("/subjects/{id}/images");

  let (status, _) = send(&app, "POST", &uri, &[], Some(json!({ "name": "dup.png" }))).await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, body) = send(&app, "POST", &uri, &[], Some(json!({ "name": "dup.png" }))).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].as_str().unwrap().contains("dup.png"));
}

#[tokio::test]
async fn update_with_blank_title_is_rejected() {
  let app = make_app().await;
  let id = create_subject(&app, "post", "").await;

  let (status, _) = send(
    &app,
    "PUT",
    &format!("/subjects/{id}"),
    &[],
    Some(json!({ "title": "" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Configuration ────────────────────────────────────────────────────────────

#[test]
fn server_config_fills_defaults() {
  let cfg: ServerConfig = serde_json::from_value(json!({
    "store_path": "/tmp/curio.db",
    "object_dir": "/tmp/objects",
  }))
  .unwrap();
  assert_eq!(cfg.host, "127.0.0.1");
  assert_eq!(cfg.port, 8080);
  assert_eq!(cfg.dedup_window_secs, 600);
  assert!(cfg.like_resync_interval_secs.is_none());

  let resolver = cfg.fingerprint_resolver(None);
  assert_eq!(resolver.sources().len(), curio_engage::fingerprint::DEFAULT_HEADERS.len() + 1);
}
