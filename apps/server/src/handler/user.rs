//! # ユーザー登録ハンドラー
//!
//! 登録フォームの各項目を検証して返す。保存はしない。

use repairhub_dispatch::{
    BindRequest,
    Context,
    FieldSpec,
    FieldViolation,
    Validate,
    rules::{alphanumeric, numeric},
    violations_of,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// ユーザー登録リクエスト
///
/// JSON ボディとフォームボディのどちらでも受け付ける。
/// 全項目必須。未指定の項目は `required` 違反になる。
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, validator::Validate)]
pub struct UserRequest {
    #[validate(required, length(min = 2, max = 50))]
    pub name:     Option<String>,
    #[validate(required, email)]
    pub email:    Option<String>,
    #[validate(required, range(min = 18, max = 120))]
    pub age:      Option<i64>,
    #[validate(required, custom(function = "numeric"), length(equal = 11))]
    pub phone:    Option<String>,
    #[validate(required, custom(function = "alphanumeric"), length(min = 3, max = 20))]
    pub username: Option<String>,
}

impl BindRequest for UserRequest {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("name")
            .json("name")
            .form("name")
            .rules(&["required", "length"]),
        FieldSpec::text("email")
            .json("email")
            .form("email")
            .rules(&["required", "email"]),
        FieldSpec::integer("age")
            .json("age")
            .form("age")
            .rules(&["required", "range"]),
        FieldSpec::text("phone")
            .json("phone")
            .form("phone")
            .rules(&["required", "numeric", "length"]),
        FieldSpec::text("username")
            .json("username")
            .form("username")
            .rules(&["required", "alphanum", "length"]),
    ];
}

impl Validate for UserRequest {
    fn violations(&self) -> Vec<FieldViolation> {
        violations_of(self)
    }
}

#[derive(Debug, Serialize)]
struct Registered {
    message: &'static str,
    user:    UserRequest,
}

#[tracing::instrument(skip_all)]
pub async fn register(ctx: Context<AppState>, request: UserRequest) -> anyhow::Result<()> {
    tracing::info!("ユーザー登録リクエストを受け付けました");

    ctx.success(Registered {
        message: "ユーザー登録に成功しました",
        user:    request,
    })?;
    Ok(())
}
