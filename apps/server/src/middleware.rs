//! # ミドルウェア
//!
//! 全ルート共通のミドルウェアチェーンとルート固有ミドルウェアを提供する。
//!
//! グローバルチェーンは外側から次の順に並ぶ（名前はルート一覧表に表示される）。
//!
//! ```text
//! request_id → trace → canonical_log → catch_panic → cors → body_limit → secure_headers → handler
//! ```

mod cache_control;

use std::any::Any;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
pub use cache_control::{no_cache, no_cache_layer};
use repairhub_shared::{
    Envelope,
    ErrorCode,
    canonical_log::CanonicalLogLineLayer,
    observability::{MakeRequestUuidV7, make_request_span},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{config::HttpSection, router::json_response};

/// グローバルミドルウェアの名前（外側から順）
pub const GLOBAL_MIDDLEWARE: [&str; 7] = [
    "request_id",
    "trace",
    "canonical_log",
    "catch_panic",
    "cors",
    "body_limit",
    "secure_headers",
];

/// グローバルミドルウェアを適用する
///
/// `Router::layer` は後に書いたものが外側になるため、内側から順に重ねる。
pub fn apply_global(router: Router, http: &HttpSection) -> Router {
    router
        // secure_headers: ハンドラーが設定していない場合だけ付与する
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(RequestBodyLimitLayer::new(http.body_limit_bytes))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CanonicalLogLineLayer::new().skip_prefix("/health"))
        // 1. SetRequestIdLayer（最外）: UUID v7 を生成（またはクライアント提供値を使用）
        // 2. TraceLayer: スパンに request_id を含める
        // 3. PropagateRequestIdLayer: レスポンスヘッダーに X-Request-Id をコピー
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}

/// パニックしたハンドラーの代わりに返す内部エラー
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("-");
    tracing::error!(panic = detail, "ハンドラーがパニックしました");

    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &Envelope::error(ErrorCode::Internal, ()),
    )
}
