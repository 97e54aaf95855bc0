//! # リクエストコンテキスト
//!
//! ハンドラーに渡される実行コンテキスト。アプリケーション状態、リクエストのメタ情報、
//! キャンセルトークン、そしてレスポンスを一度だけ書き込める枠を持つ。
//!
//! ## レスポンスの書き込み
//!
//! 最初に書き込まれたレスポンスだけが有効で、2 回目以降は
//! [`ReplyError::AlreadyCommitted`] になる。
//! 書き込まれたレスポンスは [`invoke`](crate::invoke) がハンドラー完了後に取り出す。

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use bytes::Bytes;
use futures::stream::BoxStream;
use http::{HeaderMap, Method, StatusCode};
use repairhub_shared::{Envelope, ErrorCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{error::ReplyError, message::RequestHead};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// ストリーミングレスポンスのボディ
pub type ByteStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// ハンドラーが書き込んだレスポンス
pub enum Reply {
    /// エンベロープを JSON にシリアライズしたもの
    Json { status: StatusCode, body: Bytes },
    /// 200 OK で送るバイト列ストリーム
    Stream { headers: HeaderMap, body: ByteStream },
    /// ハンドラーが何も書かずに正常終了した
    Empty,
}

impl Reply {
    pub fn envelope<T: Serialize>(
        status: StatusCode,
        envelope: &Envelope<T>,
    ) -> Result<Self, ReplyError> {
        let body = serde_json::to_vec(envelope)?;
        Ok(Self::Json {
            status,
            body: Bytes::from(body),
        })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json { status, .. } => *status,
            Self::Stream { .. } | Self::Empty => StatusCode::OK,
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json { status, body } => f
                .debug_struct("Json")
                .field("status", status)
                .field("body", body)
                .finish(),
            Self::Stream { headers, .. } => f
                .debug_struct("Stream")
                .field("headers", headers)
                .finish_non_exhaustive(),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

/// エラーコードに対応する HTTP ステータス
pub fn status_for(code: ErrorCode) -> StatusCode {
    StatusCode::from_u16(code.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Open,
    Committed(Reply),
    Taken,
}

/// 一度だけ書き込めるレスポンス枠
#[derive(Debug, Clone, Default)]
pub(crate) struct ReplySlot(Arc<Mutex<Slot>>);

impl ReplySlot {
    pub(crate) fn commit(&self, reply: Reply) -> Result<(), ReplyError> {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Slot::Open => {
                *slot = Slot::Committed(reply);
                Ok(())
            }
            Slot::Committed(_) | Slot::Taken => Err(ReplyError::AlreadyCommitted),
        }
    }

    pub(crate) fn is_committed(&self) -> bool {
        let slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        !matches!(*slot, Slot::Open)
    }

    /// 書き込まれたレスポンスを取り出す。以降の書き込みは拒否される
    pub(crate) fn take(&self) -> Option<Reply> {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Committed(reply) => Some(reply),
            Slot::Open | Slot::Taken => None,
        }
    }
}

/// ハンドラーの実行コンテキスト
///
/// 複製しても同じレスポンス枠を共有する。
pub struct Context<S> {
    state:  S,
    head:   Arc<RequestHead>,
    cancel: CancellationToken,
    slot:   ReplySlot,
}

impl<S: Clone> Clone for Context<S> {
    fn clone(&self) -> Self {
        Self {
            state:  self.state.clone(),
            head:   Arc::clone(&self.head),
            cancel: self.cancel.clone(),
            slot:   self.slot.clone(),
        }
    }
}

impl<S> Context<S> {
    pub fn new(state: S, head: Arc<RequestHead>, cancel: CancellationToken) -> Self {
        Self {
            state,
            head,
            cancel,
            slot: ReplySlot::default(),
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// クライアント切断やサーバー停止で発火するトークン
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 成功エンベロープ（200 OK）を書き込む
    pub fn success<T: Serialize>(&self, data: T) -> Result<(), ReplyError> {
        self.respond(StatusCode::OK, &Envelope::success(data))
    }

    /// データなしの成功エンベロープを書き込む
    pub fn no_content(&self) -> Result<(), ReplyError> {
        self.respond(StatusCode::OK, &Envelope::no_content())
    }

    /// エラーエンベロープを書き込む。HTTP ステータスはエラーコードと同じ値
    pub fn fail<T: Serialize>(&self, code: ErrorCode, detail: T) -> Result<(), ReplyError> {
        self.respond(status_for(code), &Envelope::error(code, detail))
    }

    pub fn respond<T: Serialize>(
        &self,
        status: StatusCode,
        envelope: &Envelope<T>,
    ) -> Result<(), ReplyError> {
        if self.slot.is_committed() {
            return Err(ReplyError::AlreadyCommitted);
        }
        self.slot.commit(Reply::envelope(status, envelope)?)
    }

    /// バイト列ストリームをそのままレスポンスにする
    pub fn stream(&self, headers: HeaderMap, body: ByteStream) -> Result<(), ReplyError> {
        self.slot.commit(Reply::Stream { headers, body })
    }

    pub fn is_committed(&self) -> bool {
        self.slot.is_committed()
    }

    pub(crate) fn slot(&self) -> &ReplySlot {
        &self.slot
    }
}
