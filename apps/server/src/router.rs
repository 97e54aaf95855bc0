//! # ルートテーブル
//!
//! [`Handler`] を axum のルーターに載せる。
//!
//! 登録時に [`resolve`] で記述子を作り、[`RouteRegistry`] に記録してから axum にルートを追加する。
//! どちらかで失敗した場合は [`ConfigurationError`] を返し、サーバーは起動しない。
//!
//! 実行時はリクエストを [`RawMessage`] に変換し、[`invoke`] の結果をそのままレスポンスにする。
//! 同じパスでもメソッドごとに別のハンドラーとして扱う。

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{RawPathParams, Request, State, rejection::RawPathParamsRejection},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter, on},
};
use repairhub_dispatch::{
    BindError,
    ConfigurationError,
    Context,
    Handler,
    ParamErrorDetail,
    RawMessage,
    Reply,
    RequestError,
    RouteRegistry,
    context::status_for,
    invoke,
    resolve,
};
use repairhub_shared::{Envelope, ErrorCode};
use tokio_util::sync::CancellationToken;

type ApplyLayer<S> = dyn Fn(MethodRouter<S>) -> MethodRouter<S> + Send + Sync;

/// ルート固有のミドルウェア
///
/// 名前はルート一覧表に表示される。
pub struct RouteLayer<S> {
    name:  &'static str,
    apply: Arc<ApplyLayer<S>>,
}

impl<S> RouteLayer<S> {
    pub fn new<F>(name: &'static str, apply: F) -> Self
    where
        F: Fn(MethodRouter<S>) -> MethodRouter<S> + Send + Sync + 'static,
    {
        Self {
            name,
            apply: Arc::new(apply),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S> Clone for RouteLayer<S> {
    fn clone(&self) -> Self {
        Self {
            name:  self.name,
            apply: Arc::clone(&self.apply),
        }
    }
}

/// ルートテーブル
pub struct RouteTable<S> {
    router:   Router<S>,
    registry: RouteRegistry,
    shutdown: CancellationToken,
}

impl<S> RouteTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// `global_middleware` は一覧表示用の名前（実際のレイヤーは呼び出し側が適用する）
    pub fn new<I, N>(port: u16, global_middleware: I, shutdown: CancellationToken) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            router: Router::new(),
            registry: RouteRegistry::new(port, global_middleware),
            shutdown,
        }
    }

    /// ルートを追加する
    pub fn route(
        mut self,
        method: Method,
        path: &str,
        handler: Handler<S>,
        layers: &[RouteLayer<S>],
    ) -> Result<Self, ConfigurationError> {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| ConfigurationError::UnsupportedMethod {
                method: method.clone(),
            })?;

        let descriptor = resolve(&handler)?;
        let names: Vec<&str> = layers.iter().map(RouteLayer::name).collect();
        let entry = self.registry.register(method, path, descriptor, &names)?;
        tracing::debug!(
            method = %entry.method,
            path = %entry.path,
            handler = entry.descriptor.handler_name,
            "ルートを登録しました"
        );

        let shutdown = self.shutdown.clone();
        let endpoint = move |State(state): State<S>,
                             params: Result<RawPathParams, RawPathParamsRejection>,
                             request: Request| {
            let handler = handler.clone();
            let cancel = shutdown.child_token();
            async move { dispatch(&handler, state, params, request, cancel).await }
        };

        let method_router = layers
            .iter()
            .fold(on(filter, endpoint), |route, layer| (layer.apply)(route));

        self.router = self.router.route(path, method_router);
        Ok(self)
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn into_parts(self) -> (Router<S>, RouteRegistry) {
        (self.router, self.registry)
    }
}

async fn dispatch<S>(
    handler: &Handler<S>,
    state: S,
    params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request,
    cancel: CancellationToken,
) -> Response
where
    S: Send + Sync + 'static,
{
    // パスパラメータのないルートでは MissingPathParams になる
    let params = match params {
        Ok(params) => Some(params),
        Err(RawPathParamsRejection::MissingPathParams(_)) => None,
        Err(rejection) => return param_error(BindError::PathParams(rejection.body_text())),
    };

    let (parts, body) = request.into_parts();

    // 上限は body_limit ミドルウェアが課す
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => return param_error(BindError::Body(err.to_string())),
    };

    let mut raw = RawMessage::new(parts.method, &parts.uri, parts.headers).with_body(body);
    if let Some(params) = params {
        raw = raw.with_path_params(params.iter());
    }

    let ctx = Context::new(state, Arc::clone(raw.head()), cancel);
    into_response(invoke(handler, raw, ctx).await)
}

/// ハンドラーに渡す前に失敗したリクエストをパラメータエラーにする
fn param_error(err: BindError) -> Response {
    let err = RequestError::from(err);
    tracing::warn!(error.kind = err.kind(), error = %err, "リクエストを読み込めませんでした");

    let code = ErrorCode::ParamError;
    json_response(status_for(code), &Envelope::error(code, ParamErrorDetail::from(&err)))
}

/// [`Reply`] を axum のレスポンスに変換する
pub fn into_response(reply: Reply) -> Response {
    match reply {
        Reply::Json { status, body } => (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Reply::Stream { headers, body } => (headers, Body::from_stream(body)).into_response(),
        Reply::Empty => StatusCode::OK.into_response(),
    }
}

/// エンベロープを JSON レスポンスにする
///
/// シリアライズに失敗した場合はボディなしの 500 を返す。
pub fn json_response<T: serde::Serialize>(status: StatusCode, envelope: &Envelope<T>) -> Response {
    match Reply::envelope(status, envelope) {
        Ok(reply) => into_response(reply),
        Err(err) => {
            tracing::error!(error = %err, "エンベロープのシリアライズに失敗しました");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
