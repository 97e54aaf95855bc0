//! # 配信ハンドラー
//!
//! - `/test`: 固定メッセージを返す
//! - `/test-network-traffic`: サンプルファイルを帯域制限付きでダウンロードさせる
//!
//! 帯域制限付きの配信は、リクエストごとに新しい [`PacedReader`] を作り、
//! 別タスクで duplex パイプに書き込む。レスポンスボディはパイプの読み口をストリームにしたもの。
//! ボディは転送用トークンの DropGuard を持つ。クライアントが切断してボディが破棄されると
//! トークンが発火し、レート制限の待機中でも転送タスクはすぐに終わる。

use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderValue, header},
};
use futures::{Stream, TryStreamExt};
use repairhub_dispatch::{BoxError, Context};
use repairhub_infra::{PacedReader, TransferError};
use serde::Serialize;
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncSeek},
    task::JoinHandle,
};
use tokio_util::{io::ReaderStream, sync::CancellationToken};

use crate::state::{AppState, TransferSettings};

#[derive(Debug, Serialize)]
struct Message {
    message: &'static str,
}

pub async fn test(ctx: Context<AppState>) -> anyhow::Result<()> {
    ctx.success(Message {
        message: "テスト成功",
    })?;
    Ok(())
}

/// サンプルファイルを帯域制限付きで配信する
#[tracing::instrument(skip_all)]
pub async fn network_traffic(ctx: Context<AppState>) -> anyhow::Result<()> {
    let settings = Arc::clone(&ctx.state().transfer);

    let file = File::open(&settings.source_path)
        .await
        .with_context(|| format!("{} を開けませんでした", settings.source_path.display()))?;
    let size = file
        .metadata()
        .await
        .context("配信元ファイルのサイズを取得できませんでした")?
        .len();

    let headers = download_headers(&settings, size)?;

    let cancel = ctx.cancellation().child_token();
    let paced = PacedReader::new(file, settings.limit).with_cancellation(cancel.clone());
    let (body, _pump) = paced_body(paced, settings.chunk_bytes, cancel);

    ctx.stream(headers, Box::pin(body))?;
    Ok(())
}

/// 転送タスクを起動し、その出力をレスポンスボディ用のストリームとして返す
///
/// ストリームを破棄すると `cancel` が発火する。
fn paced_body<R>(
    paced: PacedReader<R>,
    chunk_bytes: usize,
    cancel: CancellationToken,
) -> (
    impl Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    JoinHandle<Result<u64, TransferError>>,
)
where
    R: AsyncRead + AsyncSeek + Unpin + Send + Sync + 'static,
{
    let (mut writer, reader) = tokio::io::duplex(chunk_bytes.max(1));

    let pump_cancel = cancel.clone();
    let pump = tokio::spawn(async move {
        let mut paced = paced;
        let result = paced.transfer(&mut writer, chunk_bytes).await;
        log_outcome(&result, pump_cancel.is_cancelled());
        result
    });

    let guard = cancel.drop_guard();
    let body = ReaderStream::with_capacity(reader, chunk_bytes.max(1)).map_err(move |err| -> BoxError {
        let _alive = &guard;
        Box::new(err)
    });

    (body, pump)
}

fn download_headers(settings: &TransferSettings, size: u64) -> anyhow::Result<HeaderMap> {
    let disposition = format!("attachment; filename=\"{}\"", settings.download_name);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).context("ダウンロード名をヘッダーにできません")?,
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(headers)
}

/// 切断後の書き込み失敗もキャンセルとして扱う
fn log_outcome(result: &Result<u64, TransferError>, cancelled: bool) {
    match result {
        Ok(sent) => tracing::debug!(bytes = sent, "配信が完了しました"),
        Err(err) if err.is_cancelled() || cancelled => {
            tracing::info!(bytes = err.transferred(), "配信がキャンセルされました");
        }
        Err(err) => {
            tracing::warn!(bytes = err.transferred(), error = %err, "配信が中断しました");
        }
    }
}
