use anyhow::{Context, Result};

use taskboard::board::db::DbHandle;
use taskboard::config::TaskboardConfig;

/// Verify every board's positions are exactly `0..n-1`.
pub async fn cmd_check(config: &TaskboardConfig) -> Result<()> {
    let db = DbHandle::open(&config.database.path, config.busy_timeout())
        .context("Failed to open board database")?;
    let unsettled = db.call(|db| db.dense_violations()).await?;

    if unsettled.is_empty() {
        println!("All boards are dense.");
        return Ok(());
    }

    for board in &unsettled {
        println!("board {}: positions {:?}", board.board_id, board.positions);
    }
    anyhow::bail!("{} board(s) have unsettled positions", unsettled.len())
}
