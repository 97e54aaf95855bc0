//! # リクエストのバインドと検証
//!
//! [`RawMessage`] からリクエスト型の値を組み立て、検証まで行う。
//!
//! ## ソースの優先順位
//!
//! 1 フィールドにつき、path → query → header → body の順で最初に見つかった値を使う。
//! ボディは Content-Type に応じて JSON オブジェクトまたはフォームとして読む。
//! どのソースにも無いフィールドは `Default` の値のまま残る。
//!
//! ## エラー報告
//!
//! 失敗したフィールドはワイヤー上の名前で報告する（[`FieldSpec::wire_name`]）。
//! 受け取った値そのものはエラーに含めない。

use serde_json::{Map, Number, Value};

use crate::{
    error::{BindError, RequestError, ValidationError},
    message::RawMessage,
    schema::{BindRequest, FieldKind, FieldSpec, WireSource},
};

/// リクエスト値を組み立てて検証する
///
/// 検証違反が複数あっても、報告するのは最初の 1 件だけ。
pub fn bind_and_validate<T: BindRequest>(raw: &RawMessage) -> Result<T, RequestError> {
    let request: T = bind(raw)?;

    if let Some(violation) = request.violations().into_iter().next() {
        let field = T::FIELDS
            .iter()
            .find(|spec| spec.name == violation.field)
            .map_or(violation.field.clone(), |spec| spec.wire_name().to_owned());

        return Err(ValidationError {
            field,
            rule: violation.rule,
        }
        .into());
    }

    Ok(request)
}

/// リクエスト値を組み立てる（検証はしない）
pub fn bind<T: BindRequest>(raw: &RawMessage) -> Result<T, BindError> {
    let body = Body::parse(raw)?;

    let mut object = match serde_json::to_value(T::default()) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(err) => return Err(BindError::Decode(err.to_string())),
    };

    for spec in T::FIELDS {
        if let Some(value) = lookup(spec, raw, &body)? {
            object.insert(spec.name.to_owned(), value);
        }
    }

    serde_json::from_value(Value::Object(object)).map_err(|err| BindError::Decode(err.to_string()))
}

/// デコード済みのボディ
enum Body {
    Empty,
    Json(Map<String, Value>),
    Form(Vec<(String, String)>),
}

impl Body {
    fn parse(raw: &RawMessage) -> Result<Self, BindError> {
        if raw.body().is_empty() {
            return Ok(Self::Empty);
        }

        let media_type = raw.media_type().unwrap_or_default();
        if media_type == "application/json" || media_type.ends_with("+json") {
            return match serde_json::from_slice(raw.body()) {
                Ok(Value::Object(map)) => Ok(Self::Json(map)),
                Ok(_) => Err(BindError::NotAnObject),
                Err(err) => Err(BindError::MalformedJson(err.to_string())),
            };
        }
        if media_type == "application/x-www-form-urlencoded" {
            let pairs = url::form_urlencoded::parse(raw.body()).into_owned().collect();
            return Ok(Self::Form(pairs));
        }

        Err(BindError::UnsupportedMediaType(media_type))
    }
}

fn lookup(spec: &FieldSpec, raw: &RawMessage, body: &Body) -> Result<Option<Value>, BindError> {
    if let Some((key, text)) = spec.path.and_then(|key| raw.path_param(key).map(|v| (key, v))) {
        return coerce(spec.kind, key, text);
    }

    if let Some((key, text)) = spec.query.and_then(|key| raw.query_param(key).map(|v| (key, v))) {
        return coerce(spec.kind, key, text);
    }

    if let Some((key, header)) = spec.header.and_then(|key| raw.header(key).map(|v| (key, v))) {
        let text = header.map_err(|_| BindError::TypeMismatch {
            field:    key.to_owned(),
            expected: FieldKind::Text,
        })?;
        return coerce(spec.kind, key, text);
    }

    match body {
        Body::Empty => Ok(None),
        Body::Json(map) => {
            let key = spec.body_key(WireSource::Json);
            match map.get(key) {
                Some(value) => check_json(spec.kind, key, value),
                None => Ok(None),
            }
        }
        Body::Form(pairs) => {
            let key = spec.body_key(WireSource::Form);
            match pairs.iter().find(|(name, _)| name == key) {
                Some((_, text)) => coerce(spec.kind, key, text),
                None => Ok(None),
            }
        }
    }
}

/// 文字列で届いた値をフィールドの種類に合わせて変換する
///
/// 数値・真偽値の空文字列は「値なし」として扱う。
fn coerce(kind: FieldKind, key: &str, text: &str) -> Result<Option<Value>, BindError> {
    let mismatch = || BindError::TypeMismatch {
        field:    key.to_owned(),
        expected: kind,
    };

    if kind != FieldKind::Text && text.trim().is_empty() {
        return Ok(None);
    }

    let value = match kind {
        FieldKind::Text => Value::String(text.to_owned()),
        FieldKind::Integer => {
            let n: i64 = text.trim().parse().map_err(|_| mismatch())?;
            Value::from(n)
        }
        FieldKind::Float => {
            let n: f64 = text.trim().parse().map_err(|_| mismatch())?;
            Value::Number(Number::from_f64(n).ok_or_else(mismatch)?)
        }
        FieldKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Value::Bool(true),
            "0" | "f" | "false" => Value::Bool(false),
            _ => return Err(mismatch()),
        },
    };

    Ok(Some(value))
}

/// JSON で届いた値がフィールドの種類と合っているか確かめる
///
/// `null` は「値なし」として扱う。
fn check_json(kind: FieldKind, key: &str, value: &Value) -> Result<Option<Value>, BindError> {
    let matches = match (kind, value) {
        (_, Value::Null) => return Ok(None),
        (FieldKind::Text, Value::String(_)) | (FieldKind::Bool, Value::Bool(_)) => true,
        (FieldKind::Integer, Value::Number(n)) => n.is_i64(),
        (FieldKind::Float, Value::Number(_)) => true,
        _ => false,
    };

    if !matches {
        return Err(BindError::TypeMismatch {
            field:    key.to_owned(),
            expected: kind,
        });
    }
    Ok(Some(value.clone()))
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, HeaderValue, Method, Uri, header::CONTENT_TYPE};
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::validate::{Validate, rules::numeric, violations_of};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize, validator::Validate)]
    struct SampleRequest {
        #[validate(length(min = 2, max = 50))]
        name:    String,
        #[validate(range(min = 18, max = 120))]
        age:     i64,
        #[validate(custom(function = "numeric"), length(equal = 11))]
        phone:   String,
        id:      i64,
        token:   String,
        verbose: bool,
    }

    impl BindRequest for SampleRequest {
        const FIELDS: &'static [FieldSpec] = &[
            FieldSpec::text("name").json("user_name").form("user_name").query("name"),
            FieldSpec::integer("age").json("age").form("age"),
            FieldSpec::text("phone").json("phone").form("phone"),
            FieldSpec::integer("id").path("id"),
            FieldSpec::text("token").header("x-token"),
            FieldSpec::boolean("verbose").query("verbose"),
        ];
    }

    impl Validate for SampleRequest {
        fn violations(&self) -> Vec<crate::validate::FieldViolation> {
            violations_of(self)
        }
    }

    fn message(method: Method, uri: &str, content_type: Option<&'static str>, body: &str) -> RawMessage {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        let uri: Uri = uri.parse().unwrap();
        RawMessage::new(method, &uri, headers).with_body(body.to_owned())
    }

    fn valid_json() -> &'static str {
        r#"{"user_name": "山田太郎", "age": 30, "phone": "09012345678"}"#
    }

    // ===== bind テスト =====

    #[test]
    fn test_jsonボディからワイヤー名でバインドする() {
        let raw = message(Method::POST, "/register", Some("application/json"), valid_json());

        let request: SampleRequest = bind(&raw).unwrap();

        assert_eq!(request.name, "山田太郎");
        assert_eq!(request.age, 30);
        assert_eq!(request.phone, "09012345678");
    }

    #[test]
    fn test_どこにも無いフィールドはデフォルト値のまま() {
        let raw = message(Method::POST, "/register", Some("application/json"), r#"{"age": 20}"#);

        let request: SampleRequest = bind(&raw).unwrap();

        assert_eq!(request.name, "");
        assert_eq!(request.id, 0);
        assert!(!request.verbose);
    }

    #[test]
    fn test_クエリがボディより優先される() {
        let raw = message(
            Method::POST,
            "/register?name=query-name",
            Some("application/json"),
            valid_json(),
        );

        let request: SampleRequest = bind(&raw).unwrap();

        assert_eq!(request.name, "query-name");
    }

    #[test]
    fn test_パスとヘッダーと真偽値のクエリをバインドする() {
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("secret"));
        let raw = RawMessage::new(Method::GET, &Uri::from_static("/users/7?verbose=true"), headers)
            .with_path_params([("id", "7")]);

        let request: SampleRequest = bind(&raw).unwrap();

        assert_eq!(request.id, 7);
        assert_eq!(request.token, "secret");
        assert!(request.verbose);
    }

    #[test]
    fn test_フォームボディの数値を変換する() {
        let raw = message(
            Method::POST,
            "/register",
            Some("application/x-www-form-urlencoded"),
            "user_name=hanako&age=25&phone=09012345678",
        );

        let request: SampleRequest = bind(&raw).unwrap();

        assert_eq!(request.name, "hanako");
        assert_eq!(request.age, 25);
    }

    #[test]
    fn test_数値に変換できない値はワイヤー名で報告する() {
        let raw = message(
            Method::POST,
            "/register",
            Some("application/x-www-form-urlencoded"),
            "user_name=hanako&age=twenty",
        );

        let err = bind::<SampleRequest>(&raw).unwrap_err();

        assert_eq!(
            err,
            BindError::TypeMismatch {
                field:    "age".to_string(),
                expected: FieldKind::Integer,
            }
        );
    }

    #[test]
    fn test_jsonの型がフィールドと合わなければワイヤー名で報告する() {
        let raw = message(
            Method::POST,
            "/register",
            Some("application/json"),
            r#"{"user_name": "hanako", "age": "twenty"}"#,
        );

        assert_eq!(
            bind::<SampleRequest>(&raw).unwrap_err(),
            BindError::TypeMismatch {
                field:    "age".to_string(),
                expected: FieldKind::Integer,
            }
        );
    }

    #[test]
    fn test_jsonのnullは値なしとして扱う() {
        let raw = message(
            Method::POST,
            "/register",
            Some("application/json"),
            r#"{"user_name": null, "age": 40}"#,
        );

        let request: SampleRequest = bind(&raw).unwrap();

        assert_eq!(request.name, "");
        assert_eq!(request.age, 40);
    }

    #[test]
    fn test_不正なボディはbindエラーになる() {
        let malformed = message(Method::POST, "/register", Some("application/json"), "{");
        let array = message(Method::POST, "/register", Some("application/json"), "[1]");
        let xml = message(Method::POST, "/register", Some("text/xml"), "<a/>");

        assert!(matches!(
            bind::<SampleRequest>(&malformed),
            Err(BindError::MalformedJson(_))
        ));
        assert_eq!(bind::<SampleRequest>(&array), Err(BindError::NotAnObject));
        assert_eq!(
            bind::<SampleRequest>(&xml),
            Err(BindError::UnsupportedMediaType("text/xml".to_string()))
        );
    }

    #[test]
    fn test_空ボディはcontent_typeに関係なく受け付ける() {
        let raw = message(Method::POST, "/register", Some("text/plain"), "");

        assert!(bind::<SampleRequest>(&raw).is_ok());
    }

    // ===== bind_and_validate テスト =====

    #[test]
    fn test_検証違反はワイヤー名とルール名で報告する() {
        let raw = message(
            Method::POST,
            "/register",
            Some("application/json"),
            r#"{"user_name": "a", "age": 30, "phone": "09012345678"}"#,
        );

        let err = bind_and_validate::<SampleRequest>(&raw).unwrap_err();

        assert_eq!(
            err,
            RequestError::Validation(ValidationError {
                field: "name".to_string(),
                rule:  "length(max=50, min=2)".to_string(),
            })
        );
    }

    #[test]
    fn test_複数の違反があれば宣言順で最初のものを報告する() {
        let raw = message(
            Method::POST,
            "/register",
            Some("application/json"),
            r#"{"user_name": "山田太郎", "age": 10, "phone": "abc"}"#,
        );

        let err = bind_and_validate::<SampleRequest>(&raw).unwrap_err();

        assert_eq!(err.field(), Some("age"));
        assert!(err.rule().is_some_and(|rule| rule.starts_with("range(")));
    }

    #[test]
    fn test_エラーメッセージに受け取った値を含めない() {
        let raw = message(
            Method::POST,
            "/register",
            Some("application/json"),
            r#"{"user_name": "山田太郎", "age": 30, "phone": "0901234567X"}"#,
        );

        let err = bind_and_validate::<SampleRequest>(&raw).unwrap_err();

        assert_eq!(err.field(), Some("phone"));
        assert!(!err.to_string().contains("0901234567X"));
    }

    #[test]
    fn test_全て正しければ値を返す() {
        let raw = message(Method::POST, "/register", Some("application/json"), valid_json());

        let request = bind_and_validate::<SampleRequest>(&raw).unwrap();

        assert_eq!(request.age, 30);
    }
}
