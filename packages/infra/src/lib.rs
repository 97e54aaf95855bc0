//! # RepairHub インフラ層
//!
//! 大きなペイロードを帯域制限付きで配信するための部品を提供する。
//!
//! ## モジュール構成
//!
//! - `token_bucket`: トークンバケット（バイト単位のレートとバースト）
//! - `paced_reader`: トークンバケットで読み込みを律速するリーダーと転送ドライバー
//! - `sample`: 配信用サンプルファイルの用意
//! - `error`: 読み込み・転送エラー
//!
//! ## 並行性
//!
//! [`PacedReader`] は 1 つの転送元を専有し、内部のバケット状態を共有しない。
//! リクエストごとに新しいインスタンスを作ること。

pub mod error;
pub mod paced_reader;
pub mod sample;
pub mod token_bucket;

pub use error::{ReadError, TransferError};
pub use paced_reader::{PacedReader, ReadOutcome};
pub use sample::ensure_sample_file;
pub use token_bucket::{GIB, KIB, MIB, Reservation, TokenBucket, TrafficLimit};
