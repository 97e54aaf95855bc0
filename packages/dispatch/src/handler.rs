//! # ハンドラー
//!
//! ハンドラーは呼び出し形式ごとの直和型 [`Handler`] として登録する。
//!
//! - [`Handler::bare`]: `async fn(Context<S>) -> Result<(), E>`
//! - [`Handler::bound`]: `async fn(Context<S>, T) -> Result<(), E>`（`T: BindRequest`）
//!
//! 呼び出し形式はコンパイル時に決まるため、第 1 引数がコンテキストでないものや
//! `Result` を返さないものは登録できない。
//!
//! ```compile_fail
//! use repairhub_dispatch::{Context, Handler};
//!
//! // 戻り値が Result ではない
//! async fn no_result(_ctx: Context<()>) {}
//!
//! let _ = Handler::bare(no_result);
//! ```
//!
//! ```compile_fail
//! use repairhub_dispatch::Handler;
//!
//! // 第 1 引数がコンテキストではない
//! async fn wrong_first(_id: u64) -> anyhow::Result<()> {
//!     Ok(())
//! }
//!
//! let _: Handler<()> = Handler::bare(wrong_first);
//! ```
//!
//! 実行時に残る検査（リクエスト型のフィールド宣言の整合性）は [`resolve`] が行う。

use std::{any::type_name, fmt, future::Future, pin::Pin, sync::Arc};

use crate::{
    bind::bind_and_validate,
    context::Context,
    error::{ConfigurationError, RequestError},
    message::RawMessage,
    schema::{BindRequest, RequestType},
};

/// ハンドラーの戻り値
pub type HandlerResult = anyhow::Result<()>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type BareFn<S> = dyn Fn(Context<S>) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// バインド・検証に失敗した場合はユーザーハンドラーを呼ばずにエラーを返す
type BoundFn<S> = dyn Fn(Context<S>, &RawMessage) -> Result<BoxFuture<'static, HandlerResult>, RequestError>
    + Send
    + Sync;

/// コンテキストだけを受け取るハンドラー
pub struct BareHandler<S> {
    name: &'static str,
    call: Arc<BareFn<S>>,
}

/// コンテキストとリクエスト値を受け取るハンドラー
pub struct BoundHandler<S> {
    name:         &'static str,
    request_type: RequestType,
    call:         Arc<BoundFn<S>>,
}

/// 登録されるハンドラー
pub enum Handler<S> {
    Bare(BareHandler<S>),
    Bound(BoundHandler<S>),
}

impl<S> Handler<S>
where
    S: Send + Sync + 'static,
{
    pub fn bare<F, Fut, E>(handler: F) -> Self
    where
        F: Fn(Context<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        let call: Arc<BareFn<S>> =
            Arc::new(move |ctx: Context<S>| -> BoxFuture<'static, HandlerResult> {
                let fut = handler(ctx);
                Box::pin(async move { fut.await.map_err(Into::into) })
            });

        Self::Bare(BareHandler {
            name: type_name::<F>(),
            call,
        })
    }

    pub fn bound<T, F, Fut, E>(handler: F) -> Self
    where
        T: BindRequest,
        F: Fn(Context<S>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        let call: Arc<BoundFn<S>> = Arc::new(
            move |ctx: Context<S>,
                  raw: &RawMessage|
                  -> Result<BoxFuture<'static, HandlerResult>, RequestError> {
                let request = bind_and_validate::<T>(raw)?;
                let fut = handler(ctx, request);
                Ok(Box::pin(async move { fut.await.map_err(Into::into) }))
            },
        );

        Self::Bound(BoundHandler {
            name: type_name::<F>(),
            request_type: RequestType::of::<T>(),
            call,
        })
    }
}

impl<S> Handler<S> {
    /// 関数のパス（診断用）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bare(bare) => bare.name,
            Self::Bound(bound) => bound.name,
        }
    }
}

impl<S> Clone for Handler<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Bare(bare) => Self::Bare(BareHandler {
                name: bare.name,
                call: Arc::clone(&bare.call),
            }),
            Self::Bound(bound) => Self::Bound(BoundHandler {
                name:         bound.name,
                request_type: bound.request_type,
                call:         Arc::clone(&bound.call),
            }),
        }
    }
}

impl<S> fmt::Debug for Handler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare(bare) => f.debug_tuple("Bare").field(&bare.name).finish(),
            Self::Bound(bound) => f
                .debug_tuple("Bound")
                .field(&bound.name)
                .field(&bound.request_type.name)
                .finish(),
        }
    }
}

impl<S> BareHandler<S> {
    pub(crate) fn call(&self, ctx: Context<S>) -> BoxFuture<'static, HandlerResult> {
        (self.call)(ctx)
    }
}

impl<S> BoundHandler<S> {
    pub(crate) fn call(
        &self,
        ctx: Context<S>,
        raw: &RawMessage,
    ) -> Result<BoxFuture<'static, HandlerResult>, RequestError> {
        (self.call)(ctx, raw)
    }
}

/// 呼び出し形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingShape {
    Bare,
    RequestBound(RequestType),
}

impl fmt::Display for CallingShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare => f.write_str("bare"),
            Self::RequestBound(request_type) => write!(f, "bound({})", request_type.short_name()),
        }
    }
}

/// 登録時に一度だけ作られる不変のハンドラー記述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerDescriptor {
    pub handler_name: &'static str,
    pub shape:        CallingShape,
}

/// ハンドラーの記述子を作る
///
/// リクエスト型のフィールド宣言に矛盾があれば [`ConfigurationError`] を返す。
/// 起動時にだけ呼ばれ、エラーは起動失敗として扱う。
pub fn resolve<S>(handler: &Handler<S>) -> Result<HandlerDescriptor, ConfigurationError> {
    let shape = match handler {
        Handler::Bare(_) => CallingShape::Bare,
        Handler::Bound(bound) => {
            bound.request_type.check()?;
            CallingShape::RequestBound(bound.request_type)
        }
    };

    Ok(HandlerDescriptor {
        handler_name: handler.name(),
        shape,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{
        schema::FieldSpec,
        validate::{FieldViolation, Validate},
    };

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Ping {
        message: String,
    }

    impl BindRequest for Ping {
        const FIELDS: &'static [FieldSpec] = &[FieldSpec::text("message").query("msg")];
    }

    impl Validate for Ping {
        fn violations(&self) -> Vec<FieldViolation> {
            Vec::new()
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Broken {
        a: String,
    }

    impl BindRequest for Broken {
        const FIELDS: &'static [FieldSpec] = &[
            FieldSpec::text("a").query("key"),
            FieldSpec::text("b").query("key"),
        ];
    }

    impl Validate for Broken {
        fn violations(&self) -> Vec<FieldViolation> {
            Vec::new()
        }
    }

    async fn health(_ctx: Context<()>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn ping(_ctx: Context<()>, _req: Ping) -> anyhow::Result<()> {
        Ok(())
    }

    async fn broken(_ctx: Context<()>, _req: Broken) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_bareハンドラーはbare形式に解決される() {
        let descriptor = resolve(&Handler::bare(health)).unwrap();

        assert_eq!(descriptor.shape, CallingShape::Bare);
        assert!(descriptor.handler_name.ends_with("health"));
    }

    #[test]
    fn test_boundハンドラーはリクエスト型付きで解決される() {
        let descriptor = resolve(&Handler::bound(ping)).unwrap();

        assert_eq!(descriptor.shape, CallingShape::RequestBound(RequestType::of::<Ping>()));
        assert_eq!(descriptor.shape.to_string(), "bound(Ping)");
    }

    #[test]
    fn test_フィールド宣言が矛盾するリクエスト型は解決に失敗する() {
        let result = resolve(&Handler::bound(broken));

        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateWireKey { key: "key", .. })
        ));
    }

    #[test]
    fn test_クロージャも登録できる() {
        let handler: Handler<()> = Handler::bare(|ctx: Context<()>| async move {
            ctx.no_content()?;
            Ok::<_, anyhow::Error>(())
        });

        assert!(resolve(&handler).is_ok());
    }
}
