//! # HTTP ハンドラー
//!
//! すべて [`Context`](repairhub_dispatch::Context) を第 1 引数に取り、
//! レスポンスはコンテキスト経由で書き込む。
//!
//! - `health`: 疎通確認（リクエスト値の検証を含む）
//! - `user`: ユーザー登録フォームの検証
//! - `transfer`: 帯域制限付きファイル配信と簡易応答

pub mod health;
pub mod transfer;
pub mod user;

pub use health::{HealthRequest, health};
pub use transfer::{network_traffic, test};
pub use user::{UserRequest, register};
