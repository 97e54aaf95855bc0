//! # サーバー設定
//!
//! 既定値 → `config/config.yaml`（任意）→ 環境変数の順に重ねて読み込む。
//!
//! 環境変数は `REPAIRHUB` プレフィックスと `__` 区切りでセクションを指定する。
//!
//! ```text
//! REPAIRHUB__APP__PORT=9000
//! REPAIRHUB__TRANSFER__RATE_BYTES_PER_SEC=1048576
//! ```

use std::{net::SocketAddr, path::PathBuf};

use ::config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use repairhub_infra::{MIB, TrafficLimit};
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "REPAIRHUB";
const CONFIG_FILE: &str = "config/config";

/// 設定の読み込みエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("設定の読み込みに失敗しました: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("設定値 {key} が不正です: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

/// サーバー全体の設定
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub app:      AppSection,
    pub http:     HttpSection,
    pub transfer: TransferSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// バインドアドレス
    pub host:      String,
    /// ポート番号
    pub port:      u16,
    /// `RUST_LOG` 未設定時のログレベル
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    /// リクエストボディの上限
    pub body_limit_bytes: usize,
}

/// 帯域制限付き配信の設定
#[derive(Debug, Clone, Deserialize)]
pub struct TransferSection {
    pub source_path:        PathBuf,
    pub source_size_bytes:  u64,
    pub rate_bytes_per_sec: u64,
    pub burst_bytes:        u64,
    /// 1 回の読み込み・書き込みの単位
    pub chunk_bytes:        usize,
    /// `Content-Disposition` に載せるファイル名
    pub download_name:      String,
}

impl TransferSection {
    pub fn limit(&self) -> TrafficLimit {
        TrafficLimit::new(self.rate_bytes_per_sec, self.burst_bytes)
    }
}

impl ServerConfig {
    /// 既定値・設定ファイル・環境変数から読み込む
    pub fn load() -> Result<Self, ConfigError> {
        let config = defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    /// YAML 文字列を既定値に重ねて読み込む
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config = defaults()?
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;

        Self::from_config(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.addr().parse()?)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.chunk_bytes == 0 {
            return Err(ConfigError::Invalid {
                key:    "transfer.chunk_bytes",
                reason: "1 以上である必要があります",
            });
        }
        if self.transfer.burst_bytes == 0 {
            return Err(ConfigError::Invalid {
                key:    "transfer.burst_bytes",
                reason: "0 ではすべての読み込みが拒否されます",
            });
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ::config::ConfigError> {
    let mib = MIB as i64;

    Config::builder()
        .set_default("app.host", "0.0.0.0")?
        .set_default("app.port", 8080)?
        .set_default("app.log_level", "info")?
        .set_default("http.body_limit_bytes", 5 * mib)?
        .set_default("transfer.source_path", "test-network-traffic")?
        .set_default("transfer.source_size_bytes", 100 * mib)?
        .set_default("transfer.rate_bytes_per_sec", 10 * mib)?
        .set_default("transfer.burst_bytes", 10 * mib)?
        .set_default("transfer.chunk_bytes", mib)?
        .set_default("transfer.download_name", "test-file.dat")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_空の設定では既定値が使われる() {
        let config = ServerConfig::from_yaml("").unwrap();

        assert_eq!(config.addr(), "0.0.0.0:8080");
        assert_eq!(config.app.log_level, "info");
        assert_eq!(config.http.body_limit_bytes, 5 * 1024 * 1024);
        assert_eq!(config.transfer.limit(), TrafficLimit::new(10 * MIB, 10 * MIB));
        assert_eq!(config.transfer.chunk_bytes, 1024 * 1024);
        assert_eq!(config.transfer.download_name, "test-file.dat");
    }

    #[test]
    fn test_yamlの値が既定値を上書きする() {
        let config = ServerConfig::from_yaml(
            "app:\n  port: 9000\n  log_level: debug\ntransfer:\n  rate_bytes_per_sec: 2048\n",
        )
        .unwrap();

        assert_eq!(config.app.port, 9000);
        assert_eq!(config.app.log_level, "debug");
        assert_eq!(config.transfer.rate_bytes_per_sec, 2048);
        assert_eq!(config.transfer.burst_bytes, 10 * MIB);
    }

    #[test]
    fn test_チャンクサイズ0は拒否される() {
        let result = ServerConfig::from_yaml("transfer:\n  chunk_bytes: 0\n");

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "transfer.chunk_bytes",
                ..
            })
        ));
    }

    #[test]
    fn test_バースト0は拒否される() {
        let result = ServerConfig::from_yaml("transfer:\n  burst_bytes: 0\n");

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "transfer.burst_bytes",
                ..
            })
        ));
    }

    #[test]
    fn test_数値として解釈できない値は読み込みエラーになる() {
        let result = ServerConfig::from_yaml("app:\n  port: not-a-port\n");

        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
