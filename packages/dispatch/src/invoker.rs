//! # ディスパッチ
//!
//! 1 リクエスト分のハンドラー呼び出しを行い、結果を [`Reply`] に正規化する。
//!
//! | 状況 | レスポンス |
//! |------|-----------|
//! | バインド・検証の失敗 | パラメータエラーのエンベロープ（ハンドラーは呼ばれない） |
//! | ハンドラーが書き込んで終了 | 書き込まれたレスポンス |
//! | ハンドラーが `Ok` で終了し何も書いていない | 空の 200 |
//! | ハンドラーが `Err` で終了し何も書いていない | 内部エラーのエンベロープ |
//!
//! ハンドラーの `Err` はログに記録するだけで、内容はクライアントに返さない。

use http::StatusCode;
use repairhub_shared::{Envelope, ErrorCode};

use crate::{
    context::{Context, Reply, ReplySlot, status_for},
    error::{ParamErrorDetail, RequestError},
    handler::Handler,
    message::RawMessage,
};

/// ハンドラーを呼び出してレスポンスを得る
pub async fn invoke<S>(handler: &Handler<S>, raw: RawMessage, ctx: Context<S>) -> Reply
where
    S: Send + Sync + 'static,
{
    let slot = ctx.slot().clone();
    let handler_name = handler.name();

    let outcome = match handler {
        Handler::Bare(bare) => bare.call(ctx).await,
        Handler::Bound(bound) => match bound.call(ctx, &raw) {
            Ok(future) => future.await,
            Err(err) => {
                reject(&slot, handler_name, &err);
                return slot.take().unwrap_or(Reply::Empty);
            }
        },
    };

    if let Err(err) = outcome {
        let committed = slot.is_committed();
        let message = format!("{err:#}");
        tracing::error!(
            handler = handler_name,
            response.committed = committed,
            error = %message,
            "ハンドラーがエラーを返しました"
        );
        if !committed {
            commit_or_log(&slot, internal_error_reply());
        }
    }

    slot.take().unwrap_or(Reply::Empty)
}

/// パラメータエラーを書き込む
///
/// 値は記録せず、フィールド名とルール名だけをログに残す。
fn reject(slot: &ReplySlot, handler_name: &str, err: &RequestError) {
    tracing::warn!(
        handler = handler_name,
        error.kind = err.kind(),
        field = err.field().unwrap_or("-"),
        rule = err.rule().unwrap_or("-"),
        "リクエストパラメータが不正です"
    );

    let code = ErrorCode::ParamError;
    let envelope = Envelope::error(code, ParamErrorDetail::from(err));
    match Reply::envelope(status_for(code), &envelope) {
        Ok(reply) => commit_or_log(slot, reply),
        Err(serialize_err) => {
            tracing::error!(error = %serialize_err, "パラメータエラーのシリアライズに失敗しました");
            commit_or_log(slot, internal_error_reply());
        }
    }
}

fn internal_error_reply() -> Reply {
    let envelope = Envelope::error(ErrorCode::Internal, ());
    Reply::envelope(StatusCode::INTERNAL_SERVER_ERROR, &envelope).unwrap_or(Reply::Json {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body:   bytes::Bytes::new(),
    })
}

fn commit_or_log(slot: &ReplySlot, reply: Reply) {
    if let Err(err) = slot.commit(reply) {
        tracing::warn!(error = %err, "レスポンスを書き込めませんでした");
    }
}
