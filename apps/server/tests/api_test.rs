//! # API 統合テスト
//!
//! `build_app` で組み立てたルーター全体（グローバルミドルウェア込み）に
//! `oneshot` でリクエストを送り、エンベロープとヘッダーを検証する。

use std::path::{Path, PathBuf};

use axum::{
    Router,
    body::{Body, to_bytes},
};
use http::{Method, Request, StatusCode, header};
use pretty_assertions::assert_eq;
use repairhub_dispatch::{
    BindRequest,
    Context,
    FieldSpec,
    FieldViolation,
    Handler,
    Validate,
    violations_of,
};
use repairhub_server::{
    ServerConfig,
    build_app,
    middleware::{GLOBAL_MIDDLEWARE, apply_global},
    router::RouteTable,
};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("repairhub-api-{}", uuid::Uuid::new_v4()))
}

fn config(source_path: &Path) -> ServerConfig {
    let yaml = format!(
        "transfer:\n  source_path: \"{}\"\n  rate_bytes_per_sec: 1048576\n  burst_bytes: 1048576\n  chunk_bytes: 1024\n",
        source_path.display()
    );
    ServerConfig::from_yaml(&yaml).unwrap()
}

fn app_with_source(source_path: &Path) -> Router {
    build_app(&config(source_path), CancellationToken::new())
        .unwrap()
        .router
}

fn app() -> Router {
    app_with_source(Path::new("does-not-exist.dat"))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, http::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn valid_user() -> Value {
    json!({
        "name": "山田太郎",
        "email": "taro@example.com",
        "age": 30,
        "phone": "09012345678",
        "username": "taro01"
    })
}

// ===== /health テスト =====

#[tokio::test]
async fn test_healthはバインドしたリクエストをそのまま返す() {
    let (status, body) = send_json(app(), get("/health?message=hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": 0, "message": "OK", "data": { "message": "hello" } })
    );
}

#[tokio::test]
async fn test_healthはjsonボディのmessageも受け付ける() {
    let request = Request::builder()
        .uri("/health")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"message": "from body"}"#))
        .unwrap();

    let (status, body) = send_json(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "from body");
}

#[rstest]
#[case::欠落("/health", "required")]
#[case::短すぎる("/health?message=hi", "length(max=100, min=3)")]
#[tokio::test]
async fn test_healthのmessageが不正ならパラメータエラーになる(
    #[case] uri: &str,
    #[case] rule: &str,
) {
    let (status, body) = send_json(app(), get(uri)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["data"]["field"], "message");
    assert_eq!(body["data"]["rule"], rule);
}

// ===== /register テスト =====

#[tokio::test]
async fn test_registerは登録内容を返す() {
    let (status, body) = send_json(app(), post_json("/register", &valid_user())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 0);
    assert_eq!(body["data"]["message"], "ユーザー登録に成功しました");
    assert_eq!(body["data"]["user"], valid_user());
}

#[tokio::test]
async fn test_registerはフォームボディも受け付ける() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "name=Taro&email=taro%40example.com&age=30&phone=09012345678&username=taro01",
        ))
        .unwrap();

    let (status, body) = send_json(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["age"], 30);
    assert_eq!(body["data"]["user"]["email"], "taro@example.com");
}

#[rstest]
#[case::年齢("age", json!(17))]
#[case::電話番号("phone", json!("0901234567a"))]
#[case::ユーザー名("username", json!("taro_01"))]
#[case::メール("email", json!("not-an-email"))]
#[tokio::test]
async fn test_registerの検証違反はフィールド名付きで返る(#[case] field: &str, #[case] value: Value) {
    let mut user = valid_user();
    user[field] = value;

    let (status, body) = send_json(app(), post_json("/register", &user)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "パラメータエラー");
    assert_eq!(body["data"]["field"], field);
}

#[tokio::test]
async fn test_数字でない電話番号は長さよりnumeric違反が先に報告される() {
    let mut user = valid_user();
    user["phone"] = json!("abc");

    let (status, body) = send_json(app(), post_json("/register", &user)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["field"], "phone");
    assert_eq!(body["data"]["rule"], "numeric");
}

#[rstest]
#[case::空のオブジェクト(json!({}), "name")]
#[case::nullは未指定扱い(json!({ "name": "Taro", "email": null }), "email")]
#[tokio::test]
async fn test_未指定の項目はrequired違反になる(#[case] user: Value, #[case] field: &str) {
    let (status, body) = send_json(app(), post_json("/register", &user)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["field"], field);
    assert_eq!(body["data"]["rule"], "required");
}

#[tokio::test]
async fn test_不正なjsonはバインドエラーになりルール名を持たない() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let (status, body) = send_json(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["rule"], Value::Null);
}

#[tokio::test]
async fn test_年齢が数値でなければ型不一致になる() {
    let mut user = valid_user();
    user["age"] = json!("thirty");

    let (status, body) = send_json(app(), post_json("/register", &user)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["field"], "age");
}

// ===== メソッド別ディスパッチ テスト =====

#[tokio::test]
async fn test_登録していないメソッドは405になる() {
    let (status, _, _) = send(app(), get("/register")).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_同じパスのgetとpostは別のハンドラーになる() {
    async fn list(ctx: Context<()>) -> anyhow::Result<()> {
        ctx.success("list")?;
        Ok(())
    }
    async fn create(ctx: Context<()>) -> anyhow::Result<()> {
        ctx.success("create")?;
        Ok(())
    }

    let (router, registry) = RouteTable::new(8080, GLOBAL_MIDDLEWARE, CancellationToken::new())
        .route(Method::GET, "/items", Handler::bare(list), &[])
        .unwrap()
        .route(Method::POST, "/items", Handler::bare(create), &[])
        .unwrap()
        .into_parts();
    let app = apply_global(router, &config(Path::new("unused")).http);

    let (_, listed) = send_json(app.clone(), get("/items")).await;
    let (_, created) = send_json(app, post_json("/items", &json!({}))).await;

    assert_eq!(listed["data"], "list");
    assert_eq!(created["data"], "create");
    assert_eq!(registry.len(), 2);
}

// ===== パスパラメータ テスト =====

/// フィールド名 `user_id` をパスパラメータ `id` から読む
#[derive(Debug, Default, Serialize, Deserialize, validator::Validate)]
struct LookupRequest {
    #[validate(required, length(min = 3))]
    user_id: Option<String>,
}

impl BindRequest for LookupRequest {
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::text("user_id")
        .path("id")
        .rules(&["required", "length"])];
}

impl Validate for LookupRequest {
    fn violations(&self) -> Vec<FieldViolation> {
        violations_of(self)
    }
}

fn lookup_app() -> Router {
    async fn lookup(ctx: Context<()>, request: LookupRequest) -> anyhow::Result<()> {
        ctx.success(request.user_id)?;
        Ok(())
    }

    let (router, _) = RouteTable::new(8080, GLOBAL_MIDDLEWARE, CancellationToken::new())
        .route(Method::GET, "/users/{id}", Handler::bound(lookup), &[])
        .unwrap()
        .into_parts();
    apply_global(router, &config(Path::new("unused")).http)
}

#[tokio::test]
async fn test_パスパラメータがバインドされる() {
    let (status, body) = send_json(lookup_app(), get("/users/taro01")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "taro01");
}

#[tokio::test]
async fn test_検証エラーはフィールド名ではなくワイヤー名で報告される() {
    let (status, body) = send_json(lookup_app(), get("/users/ab")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["field"], "id");
    assert_eq!(body["data"]["rule"], "length(min=3)");
}

#[tokio::test]
async fn test_utf8でないパスパラメータはパラメータエラーになる() {
    let (status, body) = send_json(lookup_app(), get("/users/%FF")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["data"]["rule"], Value::Null);
}

// ===== /test テスト =====

#[tokio::test]
async fn test_testはno_storeを付けて固定メッセージを返す() {
    let (status, headers, body) = send(app(), get("/test")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"], json!({ "message": "テスト成功" }));
}

// ===== /test-network-traffic テスト =====

#[tokio::test]
async fn test_network_trafficはファイル内容をダウンロードさせる() {
    let dir = temp_dir();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let source = dir.join("source.dat");
    let content: Vec<u8> = (0..5000_u32).map(|i| (i % 251) as u8).collect();
    tokio::fs::write(&source, &content).await.unwrap();

    let (status, headers, body) = send(app_with_source(&source), get("/test-network-traffic")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_LENGTH], "5000");
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"test-file.dat\""
    );
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(body, content);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_配信元ファイルがなければ内部エラーになる() {
    let (status, body) = send_json(app(), get("/test-network-traffic")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);
    assert_eq!(body["data"], Value::Null);
}

// ===== グローバルミドルウェア テスト =====

#[tokio::test]
async fn test_レスポンスにx_request_idとセキュリティヘッダーが含まれる() {
    let (_, headers, _) = send(app(), get("/test")).await;

    assert!(
        headers.contains_key("x-request-id"),
        "レスポンスに x-request-id ヘッダーが含まれること"
    );
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn test_登録されたルートが一覧表に並ぶ() {
    let registry = build_app(&config(Path::new("unused")), CancellationToken::new())
        .unwrap()
        .registry;

    let routes: Vec<_> = registry
        .snapshot()
        .iter()
        .map(|entry| (entry.method.to_string(), entry.path.clone()))
        .collect();
    assert_eq!(
        routes,
        vec![
            ("GET".to_string(), "/health".to_string()),
            ("POST".to_string(), "/register".to_string()),
            ("GET".to_string(), "/test".to_string()),
            ("GET".to_string(), "/test-network-traffic".to_string()),
        ]
    );
    let test_route = &registry.snapshot()[2];
    assert_eq!(test_route.middleware.last().map(String::as_str), Some("no_cache"));
    assert!(registry.render_table().contains("bound(HealthRequest)"));
}
