//! # リクエスト型のフィールド定義
//!
//! リクエスト型は [`BindRequest::FIELDS`] で各フィールドの型と、
//! どのソース（パス・クエリ・ヘッダー・ボディ）からどの名前で読むかを宣言する。
//! 宣言は起動時に [`RequestType::check`] で検査され、矛盾があればルート登録が失敗する。
//!
//! ```
//! use repairhub_dispatch::{FieldKind, FieldSpec};
//!
//! const MESSAGE: FieldSpec = FieldSpec::text("message").query("message").json("message");
//!
//! assert_eq!(MESSAGE.kind, FieldKind::Text);
//! assert_eq!(MESSAGE.wire_name(), "message");
//! ```

use std::{any::type_name, collections::HashSet, fmt};

use serde::{Serialize, de::DeserializeOwned};

use crate::{error::ConfigurationError, validate::Validate};

/// フィールドの値の種類
///
/// 文字列で届くソース（パス・クエリ・ヘッダー・フォーム）の値はこの種類に従って変換される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Bool,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// 値の取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireSource {
    Path,
    Query,
    Header,
    Json,
    Form,
}

impl WireSource {
    /// 全ソース
    pub const ALL: [Self; 5] = [Self::Path, Self::Query, Self::Header, Self::Json, Self::Form];
}

impl fmt::Display for WireSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Json => "json",
            Self::Form => "form",
        };
        f.write_str(name)
    }
}

/// エラー報告でワイヤー名を決める際の優先順
const WIRE_NAME_PRECEDENCE: [WireSource; 5] = [
    WireSource::Path,
    WireSource::Query,
    WireSource::Json,
    WireSource::Form,
    WireSource::Header,
];

/// 1 フィールド分の宣言
///
/// `name` は Rust 側（serde 上）のフィールド名。
/// ソースごとのキーは const なビルダーメソッドで付与する。
/// `rules` は検証ルールのコードを書いた順に並べたもの。違反の報告順に使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name:   &'static str,
    pub kind:   FieldKind,
    pub path:   Option<&'static str>,
    pub query:  Option<&'static str>,
    pub header: Option<&'static str>,
    pub json:   Option<&'static str>,
    pub form:   Option<&'static str>,
    pub rules:  &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            path: None,
            query: None,
            header: None,
            json: None,
            form: None,
            rules: &[],
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub const fn float(name: &'static str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub const fn path(mut self, key: &'static str) -> Self {
        self.path = Some(key);
        self
    }

    pub const fn query(mut self, key: &'static str) -> Self {
        self.query = Some(key);
        self
    }

    pub const fn header(mut self, key: &'static str) -> Self {
        self.header = Some(key);
        self
    }

    pub const fn json(mut self, key: &'static str) -> Self {
        self.json = Some(key);
        self
    }

    pub const fn form(mut self, key: &'static str) -> Self {
        self.form = Some(key);
        self
    }

    /// 検証ルールの順序を宣言する
    ///
    /// 1 つのフィールドが複数のルールに違反した場合、ここで先に書いたルールが先に報告される。
    pub const fn rules(mut self, rules: &'static [&'static str]) -> Self {
        self.rules = rules;
        self
    }

    /// ルールコードの宣言位置。宣言されていなければ末尾扱い
    pub fn rule_position(&self, code: &str) -> usize {
        self.rules
            .iter()
            .position(|rule| *rule == code)
            .unwrap_or(self.rules.len())
    }

    /// 指定ソースに宣言されたキー
    pub const fn key(&self, source: WireSource) -> Option<&'static str> {
        match source {
            WireSource::Path => self.path,
            WireSource::Query => self.query,
            WireSource::Header => self.header,
            WireSource::Json => self.json,
            WireSource::Form => self.form,
        }
    }

    /// ボディ（JSON / フォーム）を読む際のキー
    ///
    /// キーの宣言がなければフィールド名で読む。
    pub fn body_key(&self, source: WireSource) -> &'static str {
        self.key(source).unwrap_or(self.name)
    }

    /// エラー報告に使うワイヤー上の名前
    ///
    /// path → query → json → form → header の順で最初に宣言されたキー。
    /// どれも宣言されていなければフィールド名を返す。
    pub fn wire_name(&self) -> &'static str {
        WIRE_NAME_PRECEDENCE
            .iter()
            .find_map(|source| self.key(*source))
            .unwrap_or(self.name)
    }
}

/// リクエストとしてバインドできる型
///
/// `Default` の値を出発点に、宣言されたフィールドだけを受信メッセージの値で上書きする。
/// どのソースにも現れなかったフィールドは `Default` の値のまま残る。
pub trait BindRequest: Default + Serialize + DeserializeOwned + Validate + Send + 'static {
    const FIELDS: &'static [FieldSpec];
}

/// ハンドラーが受け取るリクエスト型の記述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestType {
    pub name:   &'static str,
    pub fields: &'static [FieldSpec],
}

impl RequestType {
    pub fn of<T: BindRequest>() -> Self {
        Self {
            name:   type_name::<T>(),
            fields: T::FIELDS,
        }
    }

    /// モジュールパスを除いた型名
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    /// フィールド宣言の整合性を検査する
    pub fn check(&self) -> Result<(), ConfigurationError> {
        let mut names = HashSet::new();
        let mut keys = HashSet::new();

        for field in self.fields {
            if field.name.is_empty() {
                return Err(ConfigurationError::EmptyFieldName {
                    request_type: self.name,
                });
            }
            if !names.insert(field.name) {
                return Err(ConfigurationError::DuplicateField {
                    request_type: self.name,
                    field:        field.name,
                });
            }
            for source in WireSource::ALL {
                let Some(key) = field.key(source) else {
                    continue;
                };
                if !keys.insert((source, key)) {
                    return Err(ConfigurationError::DuplicateWireKey {
                        request_type: self.name,
                        wire_source: source,
                        key,
                    });
                }
            }
        }

        Ok(())
    }
}
