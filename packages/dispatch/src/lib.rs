//! # RepairHub リクエストディスパッチ層
//!
//! 型付きハンドラーを登録し、リクエストごとにバインド・検証・呼び出しを行う中核モジュール群。
//!
//! ## モジュール構成
//!
//! - `handler`: ハンドラーの直和型（Bare / Bound）と登録時の記述子解決
//! - `schema`: リクエスト型のフィールド定義（ワイヤー上の名前と型）
//! - `bind`: 受信メッセージからリクエスト値を組み立て、検証する
//! - `validate`: 検証ケイパビリティ（`Validate` トレイト）と共通ルール
//! - `context`: リクエストごとの実行コンテキストと一度だけ書き込めるレスポンス枠
//! - `invoker`: ハンドラーの呼び出しと結果の正規化
//! - `registry`: 登録済みルートの記録と起動時の一覧表示
//!
//! ## 処理の流れ
//!
//! ```text
//! 登録時: Handler ──resolve──▶ HandlerDescriptor ──▶ RouteRegistry
//! 実行時: RawMessage ──invoke──▶ bind_and_validate ──▶ ユーザーハンドラー ──▶ Reply
//! ```
//!
//! HTTP フレームワークには依存しない。axum との接続は `repairhub-server` 側の責務。

pub mod bind;
pub mod context;
pub mod error;
pub mod handler;
pub mod invoker;
pub mod message;
pub mod registry;
pub mod schema;
pub mod validate;

pub use bind::bind_and_validate;
pub use context::{BoxError, ByteStream, Context, Reply};
pub use error::{
    BindError,
    ConfigurationError,
    ParamErrorDetail,
    ReplyError,
    RequestError,
    ValidationError,
};
pub use handler::{
    BoxFuture,
    CallingShape,
    Handler,
    HandlerDescriptor,
    HandlerResult,
    resolve,
};
pub use invoker::invoke;
pub use message::{RawMessage, RequestHead};
pub use registry::{RouteEntry, RouteRegistry};
pub use schema::{BindRequest, FieldKind, FieldSpec, RequestType, WireSource};
pub use validate::{FieldViolation, Validate, rules, violations_of};
