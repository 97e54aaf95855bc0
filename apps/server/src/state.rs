//! # アプリケーション状態
//!
//! 全ハンドラーが [`Context::state`](repairhub_dispatch::Context::state) から参照する共有状態。

use std::{path::PathBuf, sync::Arc};

use repairhub_infra::TrafficLimit;

use crate::config::TransferSection;

#[derive(Debug, Clone)]
pub struct AppState {
    pub transfer: Arc<TransferSettings>,
}

/// 帯域制限付き配信の設定（リクエストごとに新しいリーダーを作るための元値）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub source_path:   PathBuf,
    pub limit:         TrafficLimit,
    pub chunk_bytes:   usize,
    pub download_name: String,
}

impl AppState {
    pub fn new(transfer: TransferSettings) -> Self {
        Self {
            transfer: Arc::new(transfer),
        }
    }
}

impl From<&TransferSection> for TransferSettings {
    fn from(section: &TransferSection) -> Self {
        Self {
            source_path:   section.source_path.clone(),
            limit:         section.limit(),
            chunk_bytes:   section.chunk_bytes,
            download_name: section.download_name.clone(),
        }
    }
}
