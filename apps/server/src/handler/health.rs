//! # ヘルスチェックハンドラー
//!
//! 受け取った `message` をそのまま返す。`message` がない、または長さが範囲外なら
//! ハンドラーは呼ばれずにパラメータエラーになる。

use repairhub_dispatch::{BindRequest, Context, FieldSpec, FieldViolation, Validate, violations_of};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, validator::Validate)]
pub struct HealthRequest {
    #[validate(required, length(min = 3, max = 100))]
    pub message: Option<String>,
}

impl BindRequest for HealthRequest {
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::text("message")
        .query("message")
        .json("message")
        .rules(&["required", "length"])];
}

impl Validate for HealthRequest {
    fn violations(&self) -> Vec<FieldViolation> {
        violations_of(self)
    }
}

#[tracing::instrument(skip_all)]
pub async fn health(ctx: Context<AppState>, request: HealthRequest) -> anyhow::Result<()> {
    ctx.success(request)?;
    Ok(())
}
