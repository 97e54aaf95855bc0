//! # RepairHub サーバー
//!
//! ディスパッチ層のハンドラーを axum に載せて公開する HTTP サーバー。
//!
//! ## モジュール構成
//!
//! - `app_builder`: State の初期化とルーター構築
//! - `config`: 設定の読み込み（既定値 → 設定ファイル → 環境変数）
//! - `handler`: HTTP ハンドラー
//! - `middleware`: グローバルミドルウェアチェーンとルート固有ミドルウェア
//! - `router`: ハンドラーを axum のルートとして登録するルートテーブル
//! - `state`: ハンドラー間で共有する状態

pub mod app_builder;
pub mod config;
pub mod handler;
pub mod middleware;
pub mod router;
pub mod state;

pub use app_builder::{App, build_app};
pub use config::{ConfigError, ServerConfig};
