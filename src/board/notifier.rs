use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DbHandle;
use super::models::{ActivityAction, CardMoved};
use super::ws::{EventSender, WsMessage, publish};

/// Side effects of a committed relocation. Both calls are best-effort:
/// the engine logs their failures and never rolls back because of them.
#[async_trait]
pub trait MoveNotifier: Send + Sync {
    /// Append an audit entry for the move.
    async fn record_move(&self, moved: &CardMoved) -> Result<()>;

    /// Emit a realtime move event to the destination board's environment.
    async fn emit_moved(&self, environment_id: Uuid, moved: &CardMoved) -> Result<()>;
}

/// Notifier that writes to the activity log and the realtime event channel.
#[derive(Clone)]
pub struct BoardNotifier {
    db: DbHandle,
    events: EventSender,
}

impl BoardNotifier {
    pub fn new(db: DbHandle, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Append an arbitrary activity entry (card created/updated).
    pub async fn record_activity(
        &self,
        card_id: Uuid,
        actor_id: Uuid,
        action: ActivityAction,
        details: Option<String>,
    ) -> Result<()> {
        self.db
            .call(move |db| {
                db.insert_activity(card_id, actor_id, &action, details.as_deref())
                    .map(|_| ())
            })
            .await
    }
}

#[async_trait]
impl MoveNotifier for BoardNotifier {
    async fn record_move(&self, moved: &CardMoved) -> Result<()> {
        let details = serde_json::json!({
            "from_board_id": moved.from_board_id,
            "to_board_id": moved.to_board_id,
            "position": moved.position,
        })
        .to_string();
        self.record_activity(
            moved.card_id,
            moved.actor_id,
            ActivityAction::Moved,
            Some(details),
        )
        .await
        .context("Failed to record move activity")
    }

    async fn emit_moved(&self, environment_id: Uuid, moved: &CardMoved) -> Result<()> {
        let receivers = publish(&self.events, environment_id, &WsMessage::from(*moved))?;
        tracing::trace!(receivers, card_id = %moved.card_id, "move event published");
        Ok(())
    }
}
