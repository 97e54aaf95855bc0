//! # RepairHub サーバー
//!
//! ## 起動手順
//!
//! 1. `.env` と設定ファイルを読み込む
//! 2. トレーシングを初期化する
//! 3. 配信用サンプルファイルがなければ作る
//! 4. ルートを登録し、一覧表をログに出す
//! 5. SIGINT / SIGTERM まで待ち受ける
//!
//! 停止シグナルを受けると、処理中の帯域制限付き配信をキャンセルしてから接続を閉じる。

use repairhub_infra::ensure_sample_file;
use repairhub_server::{App, ServerConfig, build_app};
use repairhub_shared::observability::{TracingConfig, init_tracing};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::load()?;
    init_tracing(TracingConfig::from_env("repairhub-server", &config.app.log_level))?;

    ensure_sample_file(&config.transfer.source_path, config.transfer.source_size_bytes).await?;

    let shutdown = CancellationToken::new();
    let App { router, registry } = build_app(&config, shutdown.clone())?;
    tracing::info!("登録済みルート:\n{}", registry.render_table());

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("サーバーが起動しました: {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("サーバーを停止しました");
    Ok(())
}

/// 停止シグナルを待ち、受け取ったら `shutdown` をキャンセルする
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Ctrl-C ハンドラーを登録できませんでした");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "SIGTERM ハンドラーを登録できませんでした");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("停止シグナルを受け取りました。処理中の配信をキャンセルします");
    shutdown.cancel();
}
