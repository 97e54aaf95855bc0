//! # ディスパッチ層のエラー型
//!
//! 発生タイミングで型を分ける。
//!
//! - [`ConfigurationError`]: 起動時（ルート登録時）に検出される設定ミス。サーバーは起動しない
//! - [`RequestError`]: リクエストごとのバインド・検証失敗。パラメータエラーとしてクライアントに返す
//! - [`ReplyError`]: レスポンス書き込みの失敗

use http::Method;
use serde::Serialize;
use thiserror::Error;

use crate::schema::{FieldKind, WireSource};

/// ルート登録時に検出される設定エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("リクエスト型 {request_type} に名前が空のフィールドがあります")]
    EmptyFieldName { request_type: &'static str },

    #[error("リクエスト型 {request_type} でフィールド {field} が重複しています")]
    DuplicateField {
        request_type: &'static str,
        field:        &'static str,
    },

    #[error("リクエスト型 {request_type} で {wire_source} キー `{key}` が重複しています")]
    DuplicateWireKey {
        request_type: &'static str,
        wire_source:  WireSource,
        key:          &'static str,
    },

    #[error("パス `{path}` は `/` で始まる必要があります")]
    InvalidPath { path: String },

    #[error("ルート {method} {path} は既に登録されています")]
    DuplicateRoute { method: Method, path: String },

    #[error("メソッド {method} のルートは登録できません")]
    UnsupportedMethod { method: Method },
}

/// 受信メッセージからリクエスト値を組み立てられなかった
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("リクエストボディの JSON が不正です: {0}")]
    MalformedJson(String),

    #[error("リクエストボディは JSON オブジェクトである必要があります")]
    NotAnObject,

    #[error("サポートされていない Content-Type です: {0}")]
    UnsupportedMediaType(String),

    #[error("パラメータ {field} を {expected} として解釈できません")]
    TypeMismatch {
        field:    String,
        expected: FieldKind,
    },

    #[error("リクエストの変換に失敗しました: {0}")]
    Decode(String),

    #[error("リクエストボディを読み込めませんでした: {0}")]
    Body(String),

    #[error("パスパラメータを読み込めませんでした: {0}")]
    PathParams(String),
}

impl BindError {
    /// 問題のあったパラメータのワイヤー名（特定できる場合）
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::TypeMismatch { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// 検証ルールに違反した
///
/// `field` はクライアントが送ったワイヤー上の名前、`rule` は違反したルール名。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("パラメータ {field} が {rule} ルールの検証に失敗しました")]
pub struct ValidationError {
    pub field: String,
    pub rule:  String,
}

/// リクエストのバインド・検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl RequestError {
    /// ログ用の分類名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bind(_) => "bind",
            Self::Validation(_) => "validation",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Bind(err) => err.field(),
            Self::Validation(err) => Some(&err.field),
        }
    }

    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::Bind(_) => None,
            Self::Validation(err) => Some(&err.rule),
        }
    }
}

/// パラメータエラー時にエンベロープの `data` に載せる詳細
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamErrorDetail {
    pub field:  Option<String>,
    pub rule:   Option<String>,
    pub reason: String,
}

impl From<&RequestError> for ParamErrorDetail {
    fn from(err: &RequestError) -> Self {
        Self {
            field:  err.field().map(str::to_owned),
            rule:   err.rule().map(str::to_owned),
            reason: err.to_string(),
        }
    }
}

/// レスポンス書き込みエラー
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("レスポンスは既に書き込まれています")]
    AlreadyCommitted,

    #[error("レスポンスのシリアライズに失敗しました: {0}")]
    Serialize(#[from] serde_json::Error),
}
