//! # キャッシュ制御ミドルウェア
//!
//! 毎回内容が変わる応答がブラウザや中間プロキシにキャッシュされないよう、
//! `Cache-Control: no-store` を設定する。

use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::{Next, from_fn},
    response::Response,
};

use crate::router::RouteLayer;

/// レスポンスに `Cache-Control: no-store` を付与する
pub async fn no_cache(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// [`no_cache`] をルート固有ミドルウェアとして登録する
pub fn no_cache_layer<S>() -> RouteLayer<S>
where
    S: Clone + Send + Sync + 'static,
{
    RouteLayer::new("no_cache", |route| route.layer(from_fn(no_cache)))
}
