//! # 読み込み・転送エラー
//!
//! どのエラーも、失敗までに読み込めた（転送できた）バイト数を保持する。
//! 送信済みのバイトは取り消せないため、呼び出し側はこの値でどこまで届いたかを判断する。

use std::io;

use thiserror::Error;

/// [`PacedReader::read`](crate::PacedReader::read) のエラー
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("レート制限を超えました（要求 {requested} バイト、バースト {burst} バイト）")]
    RateLimited {
        read:      usize,
        requested: usize,
        burst:     u64,
    },

    #[error("転送元の読み込みに失敗しました: {source}")]
    Io {
        read:   usize,
        #[source]
        source: io::Error,
    },

    #[error("転送がキャンセルされました")]
    Cancelled { read: usize },
}

impl ReadError {
    /// エラーまでに読み込めたバイト数
    pub fn bytes_read(&self) -> usize {
        match self {
            Self::RateLimited { read, .. } | Self::Io { read, .. } | Self::Cancelled { read } => {
                *read
            }
        }
    }
}

/// [`PacedReader::transfer`](crate::PacedReader::transfer) のエラー
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("転送元を先頭に戻せませんでした: {0}")]
    Rewind(#[source] io::Error),

    #[error("{transferred} バイト転送後に読み込みが失敗しました: {source}")]
    Read {
        transferred: u64,
        #[source]
        source:      ReadError,
    },

    #[error("{transferred} バイト転送後に書き込みが失敗しました: {source}")]
    Write {
        transferred: u64,
        #[source]
        source:      io::Error,
    },
}

impl TransferError {
    /// 失敗までに書き込めたバイト数
    pub fn transferred(&self) -> u64 {
        match self {
            Self::Rewind(_) => 0,
            Self::Read { transferred, .. } | Self::Write { transferred, .. } => *transferred,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Read {
                source: ReadError::Cancelled { .. },
                ..
            }
        )
    }
}
