//! # サンプルファイル
//!
//! 帯域制限付き配信の動作確認に使う固定サイズのファイルを用意する。

use std::{io, path::Path};

use tokio::{fs, io::AsyncWriteExt};

use crate::token_bucket::MIB;

const FILL_BYTE: u8 = b'a';

/// `path` にファイルがなければ `size` バイトの `a` で埋めたファイルを作る
///
/// 既に存在する場合は何もしない。作成した場合は `true` を返す。
pub async fn ensure_sample_file(path: &Path, size: u64) -> io::Result<bool> {
    if fs::try_exists(path).await? {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let block = vec![FILL_BYTE; usize::try_from(size.min(MIB)).unwrap_or(usize::MAX)];
    let mut file = fs::File::create(path).await?;
    let mut remaining = size;
    while remaining > 0 {
        let n = remaining.min(block.len() as u64) as usize;
        file.write_all(&block[..n]).await?;
        remaining -= n as u64;
    }
    file.flush().await?;

    tracing::info!(path = %path.display(), size_bytes = size, "サンプルファイルを作成しました");
    Ok(true)
}
