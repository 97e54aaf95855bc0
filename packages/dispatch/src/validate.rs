//! # 検証ケイパビリティ
//!
//! バインド後のリクエスト値は [`Validate`] で検証される。
//! 違反は宣言順（[`BindRequest::FIELDS`] の順）に並び、最初の 1 件がクライアントに報告される。
//!
//! `validator` クレートの derive を使う型は [`violations_of`] に委譲するだけでよい。

use validator::ValidationErrors;

use crate::schema::{BindRequest, FieldSpec};

/// 1 件の検証違反
///
/// `field` は Rust 側のフィールド名。ワイヤー名への変換はバインド層が行う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub rule:  String,
}

/// 検証可能な型
pub trait Validate {
    /// 違反を決まった順序で返す。空なら検証成功
    fn violations(&self) -> Vec<FieldViolation>;
}

/// `validator::Validate` の結果を [`FieldViolation`] の列に変換する
///
/// フィールドは `T::FIELDS` の宣言順に並べ、同じフィールド内は [`FieldSpec::rules`] の順に並べる。
/// 宣言外のフィールドの違反は名前順で末尾に付く。
pub fn violations_of<T>(value: &T) -> Vec<FieldViolation>
where
    T: validator::Validate + BindRequest,
{
    match validator::Validate::validate(value) {
        Ok(()) => Vec::new(),
        Err(errors) => ordered_violations(&errors, T::FIELDS),
    }
}

fn ordered_violations(errors: &ValidationErrors, declared: &[FieldSpec]) -> Vec<FieldViolation> {
    let field_errors = errors.field_errors();
    let mut violations = Vec::new();

    for spec in declared {
        let Some(errs) = field_errors.get(spec.name) else {
            continue;
        };
        // derive の内部順ではなく宣言したルール順にする
        let mut errs: Vec<_> = errs.iter().collect();
        errs.sort_by_key(|err| spec.rule_position(&err.code));
        violations.extend(errs.into_iter().map(|err| FieldViolation {
            field: spec.name.to_owned(),
            rule:  rule_name(err),
        }));
    }

    let mut undeclared: Vec<_> = field_errors
        .iter()
        .map(|(name, errs)| (name.to_string(), errs))
        .filter(|(name, _)| !declared.iter().any(|spec| spec.name == name.as_str()))
        .collect();
    undeclared.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, errs) in undeclared {
        violations.extend(errs.iter().map(|err| FieldViolation {
            field: name.clone(),
            rule:  rule_name(err),
        }));
    }

    violations
}

/// `length(max=100, min=3)` のようにパラメータ付きのルール名を組み立てる
///
/// 実際の値（`value` パラメータ）は含めない。
fn rule_name(err: &validator::ValidationError) -> String {
    let mut params: Vec<String> = err
        .params
        .iter()
        .filter(|&(key, _)| key != "value")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    params.sort();

    if params.is_empty() {
        err.code.to_string()
    } else {
        format!("{}({})", err.code, params.join(", "))
    }
}

/// `#[validate(custom(function = ...))]` で使う共通ルール
pub mod rules {
    use validator::ValidationError;

    /// 符号付きの整数または小数の表記か
    pub fn numeric(value: &str) -> Result<(), ValidationError> {
        let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
        let (int, frac) = match unsigned.split_once('.') {
            Some((int, frac)) => (int, Some(frac)),
            None => (unsigned, None),
        };
        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

        if all_digits(int) && frac.is_none_or(all_digits) {
            Ok(())
        } else {
            Err(ValidationError::new("numeric"))
        }
    }

    /// ASCII の英数字のみか
    pub fn alphanumeric(value: &str) -> Result<(), ValidationError> {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(())
        } else {
            Err(ValidationError::new("alphanum"))
        }
    }
}
