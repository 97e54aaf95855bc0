//! # 帯域制限付きリーダー
//!
//! シーク可能な転送元を包み、読み込みをトークンバケットで律速する。
//!
//! ## 1 回の `read` の流れ
//!
//! 1. バッファをバースト以下のチャンクに分ける
//! 2. チャンクごとにトークンを予約し、必要なら待つ（キャンセル可能）
//! 3. 転送元から読む。短い読み込みはそこで打ち切って返し、0 バイトは終端とみなす

use std::{io::SeekFrom, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ReadError, TransferError},
    token_bucket::{Reservation, TokenBucket, TrafficLimit},
};

/// 1 回の読み込み結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` バイト読めた。要求より少ないこともある
    Filled(usize),
    /// 終端に達した。それまでに `n` バイト読めた
    Eof(usize),
}

impl ReadOutcome {
    pub fn bytes(self) -> usize {
        match self {
            Self::Filled(n) | Self::Eof(n) => n,
        }
    }
}

pub struct PacedReader<R> {
    source: R,
    bucket: TokenBucket,
    cancel: CancellationToken,
}

impl<R> PacedReader<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
{
    pub fn new(source: R, limit: TrafficLimit) -> Self {
        Self {
            source,
            bucket: TokenBucket::new(limit, Instant::now()),
            cancel: CancellationToken::new(),
        }
    }

    /// 待機中にこのトークンが発火すると読み込みを中断する
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn limit(&self) -> TrafficLimit {
        self.bucket.limit()
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// レート制限に従ってバッファに読み込む
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, ReadError> {
        let burst = self.bucket.limit().burst_bytes;
        let chunk_limit = usize::try_from(burst).unwrap_or(usize::MAX).max(1);
        let mut read = 0;

        while read < buf.len() {
            let chunk = (buf.len() - read).min(chunk_limit);

            match self.bucket.reserve(chunk as u64, Instant::now()) {
                Reservation::Ready => {}
                Reservation::Delayed(delay) => self.wait(delay, chunk, read).await?,
                Reservation::Denied => {
                    return Err(ReadError::RateLimited {
                        read,
                        requested: chunk,
                        burst,
                    });
                }
            }

            let n = self
                .source
                .read(&mut buf[read..read + chunk])
                .await
                .map_err(|source| ReadError::Io { read, source })?;

            if n == 0 {
                return Ok(ReadOutcome::Eof(read));
            }
            read += n;
            if n < chunk {
                tracing::trace!(chunk_bytes = chunk, read_bytes = n, "短い読み込みのため打ち切ります");
                break;
            }
        }

        Ok(ReadOutcome::Filled(read))
    }

    async fn wait(&self, delay: Duration, chunk: usize, read: usize) -> Result<(), ReadError> {
        if self.cancel.is_cancelled() {
            return Err(ReadError::Cancelled { read });
        }

        tracing::trace!(
            chunk_bytes = chunk,
            delay_ms = delay.as_millis() as u64,
            "レート制限により待機します"
        );

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ReadError::Cancelled { read }),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// 転送元を先頭に戻し、終端まで `dst` に書き込む
    ///
    /// `chunk_size` は 1 回の `read` に渡すバッファの大きさ。
    /// 失敗時も先頭には戻さない。
    pub async fn transfer<W>(&mut self, dst: &mut W, chunk_size: usize) -> Result<u64, TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        self.source
            .seek(SeekFrom::Start(0))
            .await
            .map_err(TransferError::Rewind)?;

        let started = Instant::now();
        let mut buf = vec![0u8; chunk_size.max(1)];
        let mut transferred = 0u64;

        loop {
            let (n, done) = match self.read(&mut buf).await {
                Ok(ReadOutcome::Filled(n)) => (n, n == 0),
                Ok(ReadOutcome::Eof(n)) => (n, true),
                Err(source) => {
                    // エラー前に読めた分は書き込んでから報告する
                    let n = source.bytes_read();
                    if n > 0 {
                        dst.write_all(&buf[..n])
                            .await
                            .map_err(|source| TransferError::Write {
                                transferred,
                                source,
                            })?;
                        transferred += n as u64;
                    }
                    return Err(TransferError::Read {
                        transferred,
                        source,
                    });
                }
            };

            if n > 0 {
                dst.write_all(&buf[..n])
                    .await
                    .map_err(|source| TransferError::Write {
                        transferred,
                        source,
                    })?;
                transferred += n as u64;
            }
            if done {
                break;
            }
        }

        dst.flush().await.map_err(|source| TransferError::Write {
            transferred,
            source,
        })?;

        tracing::debug!(
            transferred_bytes = transferred,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "転送が完了しました"
        );

        Ok(transferred)
    }
}
