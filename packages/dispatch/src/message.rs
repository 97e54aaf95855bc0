//! # 受信メッセージ
//!
//! HTTP フレームワークから切り離したリクエストの表現。
//! バインド処理はこの型だけを入力とする。

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, header::CONTENT_TYPE};

/// リクエストのメタ情報
///
/// ハンドラーの [`Context`](crate::Context) からも参照される。
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method:  Method,
    pub path:    String,
    pub headers: HeaderMap,
}

/// 受信メッセージ
#[derive(Debug, Clone)]
pub struct RawMessage {
    head:        Arc<RequestHead>,
    path_params: Vec<(String, String)>,
    query:       Vec<(String, String)>,
    body:        Bytes,
}

impl RawMessage {
    /// URI のクエリ文字列はここでデコードされる
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap) -> Self {
        let query = uri
            .query()
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            head: Arc::new(RequestHead {
                method,
                path: uri.path().to_owned(),
                headers,
            }),
            path_params: Vec::new(),
            query,
            body: Bytes::new(),
        }
    }

    pub fn with_path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.path_params = params
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn head(&self) -> &Arc<RequestHead> {
        &self.head
    }

    pub fn path_param(&self, key: &str) -> Option<&str> {
        lookup(&self.path_params, key)
    }

    /// 同じキーが複数あれば最初の値を返す
    pub fn query_param(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    /// UTF-8 として読めないヘッダー値は `Some(Err(_))` を返す
    pub fn header(&self, key: &str) -> Option<Result<&str, http::header::ToStrError>> {
        self.head.headers.get(key).map(|value| value.to_str())
    }

    /// パラメータ（`;` 以降）を除き小文字化した Content-Type
    pub fn media_type(&self) -> Option<String> {
        let value = self.head.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let media_type = value.split(';').next().unwrap_or_default().trim();
        Some(media_type.to_ascii_lowercase())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}
