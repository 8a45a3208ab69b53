use anyhow::Result;
use std::path::PathBuf;

use taskboard::board::server::start_server;
use taskboard::config::TaskboardConfig;

pub async fn cmd_serve(
    config: &TaskboardConfig,
    port: Option<u16>,
    db: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    let mut server = config.server_config();
    if let Some(port) = port {
        server.port = port;
    }
    if let Some(db) = db {
        server.db_path = db;
    }
    server.dev_mode |= dev;

    start_server(server).await
}
