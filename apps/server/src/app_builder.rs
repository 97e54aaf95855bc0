//! # アプリケーション構築
//!
//! State の初期化とルーター構築を担当する。
//! `main.rs` は設定読み込み・サンプルファイルの用意・サーバー起動に集中する。

use axum::{Router, http::Method};
use repairhub_dispatch::{ConfigurationError, Handler, RouteRegistry};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ServerConfig,
    handler::{health, network_traffic, register, test},
    middleware::{GLOBAL_MIDDLEWARE, apply_global, no_cache_layer},
    router::RouteTable,
    state::{AppState, TransferSettings},
};

/// 構築済みのアプリケーション
pub struct App {
    pub router:   Router,
    pub registry: RouteRegistry,
}

/// ルートを登録し、グローバルミドルウェアを適用したルーターを作る
///
/// `shutdown` をキャンセルすると、処理中のリクエストのコンテキストもキャンセルされる。
pub fn build_app(config: &ServerConfig, shutdown: CancellationToken) -> Result<App, ConfigurationError> {
    let state = AppState::new(TransferSettings::from(&config.transfer));

    let (router, registry) = RouteTable::new(config.app.port, GLOBAL_MIDDLEWARE, shutdown)
        .route(Method::GET, "/health", Handler::bound(health), &[])?
        .route(Method::POST, "/register", Handler::bound(register), &[])?
        .route(Method::GET, "/test", Handler::bare(test), &[no_cache_layer()])?
        .route(
            Method::GET,
            "/test-network-traffic",
            Handler::bare(network_traffic),
            &[],
        )?
        .into_parts();

    let router = apply_global(router.with_state(state), &config.http);

    Ok(App { router, registry })
}
