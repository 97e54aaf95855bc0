//! # エラーコード表
//!
//! レスポンスエンベロープの `status` に載せるエラーコードと、
//! クライアントに返す固定メッセージを定義する。
//!
//! ## 設計
//!
//! - メッセージは固定値（内部情報をクライアントに漏らさないため）
//! - 詳細はエンベロープの `data` 側に載せる

use std::fmt;

/// アプリケーション共通のエラー種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// 権限がない
    NoPermission,
    /// パラメータの形式・値が不正
    ParamError,
    /// ユーザーが存在しない
    UserNotFound,
    /// トークンが無効
    InvalidToken,
    /// 内部エラー
    Internal,
}

impl ErrorCode {
    /// エンベロープの `status` に載せる数値コード
    ///
    /// HTTP ステータスコードと同じ値を使う。
    pub const fn code(self) -> u16 {
        match self {
            Self::NoPermission | Self::InvalidToken => 401,
            Self::ParamError => 400,
            Self::UserNotFound => 404,
            Self::Internal => 500,
        }
    }

    /// クライアント向けの固定メッセージ
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoPermission => "権限がありません",
            Self::ParamError => "パラメータエラー",
            Self::UserNotFound => "ユーザーが存在しません",
            Self::InvalidToken => "無効なトークンです",
            Self::Internal => "内部エラーが発生しました",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
