//! # RepairHub 共有ユーティリティ
//!
//! このクレートは、RepairHub のワークスペース全体で使用される共通ユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - 他のすべてのクレート（dispatch, infra, server）から依存される
//! - HTTP フレームワーク（axum）には依存しない
//! - トレーシング関連は `observability` feature の背後に置き、
//!   レスポンス型だけが必要なクレートに余計な依存を持ち込まない

#[cfg(feature = "observability")]
pub mod canonical_log;
pub mod envelope;
pub mod error_code;
pub mod observability;

pub use envelope::Envelope;
pub use error_code::ErrorCode;
