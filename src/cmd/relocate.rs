use anyhow::{Context, Result};
use tokio::sync::broadcast;
use uuid::Uuid;

use taskboard::board::api::AppState;
use taskboard::board::db::DbHandle;
use taskboard::board::models::RelocationRequest;
use taskboard::config::TaskboardConfig;

/// Run one relocation and print where the card landed.
pub async fn cmd_relocate(
    config: &TaskboardConfig,
    card_id: Uuid,
    actor_id: Uuid,
    target_board_id: Uuid,
    new_position: i32,
) -> Result<()> {
    let db = DbHandle::open(&config.database.path, config.busy_timeout())
        .context("Failed to open board database")?;
    let (events, _rx) = broadcast::channel(config.events.channel_capacity);
    let state = AppState::new(db, events);

    let result = state
        .engine
        .relocate(RelocationRequest {
            card_id,
            actor_id,
            target_board_id,
            new_position,
        })
        .await;
    state.engine.shutdown().await;

    let placement = result?;
    println!("{}", serde_json::to_string_pretty(&placement)?);
    Ok(())
}
