//! # レスポンスエンベロープ
//!
//! 全エンドポイント共通のレスポンス形式 `{ "status": u16, "message": String, "data": T }` を提供する。
//!
//! - `status == 0` は成功を表すセンチネル値
//! - それ以外は [`ErrorCode`] にマッピングされたエラーコード

use serde::{Deserialize, Serialize};

use crate::ErrorCode;

/// 成功時の `status` 値
pub const SUCCESS_STATUS: u16 = 0;

/// 成功時の `message` 値
pub const SUCCESS_MESSAGE: &str = "OK";

/// 統一レスポンス型
///
/// 1 リクエストにつき 1 インスタンスだけ生成され、レスポンスとして一度だけ書き込まれる。
///
/// ## 使用例
///
/// ```
/// use repairhub_shared::{Envelope, ErrorCode};
///
/// let ok = Envelope::success("hello");
/// assert_eq!(ok.status, 0);
/// assert!(ok.is_success());
///
/// let err = Envelope::error(ErrorCode::ParamError, "message が必要です");
/// assert_eq!(err.status, 400);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status:  u16,
    pub message: String,
    pub data:    T,
}

impl<T> Envelope<T> {
    /// 成功レスポンスを作成する
    pub fn success(data: T) -> Self {
        Self {
            status: SUCCESS_STATUS,
            message: SUCCESS_MESSAGE.to_string(),
            data,
        }
    }

    /// エラーレスポンスを作成する
    ///
    /// `status` と `message` は [`ErrorCode`] から決まる。`data` にはエラーの詳細を載せる。
    pub fn error(code: ErrorCode, data: T) -> Self {
        Self {
            status: code.code(),
            message: code.message().to_string(),
            data,
        }
    }

    /// 成功レスポンスかどうか
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }
}

impl Envelope<()> {
    /// データを持たない成功レスポンス（`"data": null`）
    pub fn no_content() -> Self {
        Self::success(())
    }
}
