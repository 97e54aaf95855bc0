//! # Canonical Log Line ミドルウェア
//!
//! リクエスト 1 件につき 1 行のサマリログ（Canonical Log Line）を出力する tower Layer。
//!
//! | フィールド | 内容 |
//! |-----------|------|
//! | `log.type` | 常に `"canonical"`（集計用のマーカー） |
//! | `http.method` / `http.path` | リクエスト行 |
//! | `http.status_code` | レスポンスステータス |
//! | `http.response_bytes` | `Content-Length`（ストリーミング配信のサイズ確認用。無ければ出力しない） |
//! | `http.latency_ms` | ヘッダーを返すまでの時間 |
//!
//! ストリーミングの場合、`http.latency_ms` はボディ送信完了ではなくヘッダー送信までの時間になる。
//!
//! TraceLayer のスパン内に置くので、request_id はスパン経由で付与される。
//!
//! ```text
//! SetRequestId → TraceLayer → CanonicalLogLineLayer → [他のミドルウェア] → handler
//! ```

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};

use http::{Method, Request, Response, header};
use tower::{Layer, Service};

/// Canonical Log Line を出力する Layer
///
/// 5xx は WARN、それ以外は INFO で出力する。
/// 内側のサービス自体がエラーを返した場合は ERROR。
#[derive(Clone, Debug, Default)]
pub struct CanonicalLogLineLayer {
    skipped: Arc<Vec<&'static str>>,
}

impl CanonicalLogLineLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定したプレフィックスで始まるパスをログ対象から外す（死活監視など）
    pub fn skip_prefix(mut self, prefix: &'static str) -> Self {
        Arc::make_mut(&mut self.skipped).push(prefix);
        self
    }
}

impl<S> Layer<S> for CanonicalLogLineLayer {
    type Service = CanonicalLogLineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CanonicalLogLineService {
            inner,
            skipped: Arc::clone(&self.skipped),
        }
    }
}

/// [`CanonicalLogLineLayer`] が生成する Service 実装
#[derive(Clone, Debug)]
pub struct CanonicalLogLineService<S> {
    inner:   S,
    skipped: Arc<Vec<&'static str>>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CanonicalLogLineService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: fmt::Display + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // poll_ready 済みの inner を取り出し、代わりに複製を残す
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let path = req.uri().path();
        if self.skipped.iter().any(|prefix| path.starts_with(prefix)) {
            return Box::pin(inner.call(req));
        }

        let line = LineStart {
            method:  req.method().clone(),
            path:    path.to_owned(),
            started: Instant::now(),
        };

        Box::pin(async move {
            let result = inner.call(req).await;
            line.finish(&result);
            result
        })
    }
}

/// リクエスト受信時に控えておく情報
struct LineStart {
    method:  Method,
    path:    String,
    started: Instant,
}

impl LineStart {
    fn finish<B, E: fmt::Display>(&self, result: &Result<Response<B>, E>) {
        let latency_ms = self.started.elapsed().as_millis() as u64;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    log.r#type = "canonical",
                    http.method = %self.method,
                    http.path = %self.path,
                    http.latency_ms = latency_ms,
                    error.message = %err,
                    "リクエスト処理エラー"
                );
                return;
            }
        };

        let status = response.status().as_u16();
        let response_bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if response.status().is_server_error() {
            tracing::warn!(
                log.r#type = "canonical",
                http.method = %self.method,
                http.path = %self.path,
                http.status_code = status,
                http.response_bytes = response_bytes,
                http.latency_ms = latency_ms,
                "リクエスト完了"
            );
        } else {
            tracing::info!(
                log.r#type = "canonical",
                http.method = %self.method,
                http.path = %self.path,
                http.status_code = status,
                http.response_bytes = response_bytes,
                http.latency_ms = latency_ms,
                "リクエスト完了"
            );
        }
    }
}
