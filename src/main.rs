use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, Level};

use dicom_pixel_server::config::ServerConfig;
use dicom_pixel_server::server::{routes, AppState};
use dicom_pixel_server::storage::Storage;
use dicom_pixel_server::CommonResult;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if config.verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .unwrap_or_else(|e| {
        eprintln!("[ERROR] Could not set up global logging subscriber: {e}");
    });

    run(config).await.unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(-2);
    });
}

async fn run(config: ServerConfig) -> CommonResult<()> {
    let storage = Storage::new(&config.storage_dir);
    storage.ensure_root()?;

    let state = Arc::new(AppState {
        storage,
        render: config.render_options(),
    });
    let app = routes(state, config.max_upload_bytes);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    info!(
        %addr,
        storage = %config.storage_dir.display(),
        "server is running"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
