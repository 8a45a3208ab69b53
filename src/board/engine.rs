//! Relocation engine: the only code path that moves a card between
//! positions or boards.
//!
//! One relocation is: load the card, ask the [`AccessGate`] about both
//! boards, then inside a single `IMMEDIATE` transaction re-read the
//! affected lists, plan with the reconciler and apply every write. Side
//! effects run after commit on a tracked background task and can never fail
//! the move.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::access::AccessGate;
use super::db::{BoardDb, DbHandle};
use super::models::{CardMoved, Placement, RelocationRequest};
use super::notifier::MoveNotifier;
use super::reconciler::{self, BoardList, RelocationPlan};
use crate::errors::RelocationError;

pub struct RelocationEngine {
    db: DbHandle,
    gate: Arc<dyn AccessGate>,
    notifier: Arc<dyn MoveNotifier>,
    side_effects: TaskTracker,
}

/// What the transaction committed, plus what the notifier needs.
struct Committed {
    plan: RelocationPlan,
    from_board_id: Uuid,
    environment_id: Uuid,
}

impl RelocationEngine {
    pub fn new(db: DbHandle, gate: Arc<dyn AccessGate>, notifier: Arc<dyn MoveNotifier>) -> Self {
        Self {
            db,
            gate,
            notifier,
            side_effects: TaskTracker::new(),
        }
    }

    /// Move a card to `new_position` on `target_board_id` and return where
    /// it ended up.
    #[tracing::instrument(
        name = "relocate",
        skip(self, request),
        fields(
            card_id = %request.card_id,
            actor_id = %request.actor_id,
            to_board = %request.target_board_id,
            requested = request.new_position,
        )
    )]
    pub async fn relocate(&self, request: RelocationRequest) -> Result<Placement, RelocationError> {
        let card_id = request.card_id;

        let card = self
            .db
            .call(move |db| db.get_card(card_id))
            .await
            .map_err(RelocationError::Internal)?
            .ok_or(RelocationError::NotFound { card_id })?;

        self.ensure_access(request.actor_id, card.board_id, card_id)
            .await?;
        if request.target_board_id != card.board_id {
            self.ensure_access(request.actor_id, request.target_board_id, card_id)
                .await?;
        }

        let committed = self
            .db
            .call(move |db| commit_relocation(db, request))
            .await
            .map_err(|e| {
                let err = RelocationError::from_store(card_id, e);
                tracing::error!(error = %err, retryable = err.is_retryable(), "relocation aborted");
                err
            })?
            .ok_or(RelocationError::NotFound { card_id })?;

        let placement = committed.plan.placement;
        tracing::info!(
            from_board = %committed.from_board_id,
            position = placement.position,
            writes = committed.plan.writes.len(),
            "card relocated"
        );

        self.notify(
            committed.environment_id,
            CardMoved {
                card_id,
                actor_id: request.actor_id,
                from_board_id: committed.from_board_id,
                to_board_id: placement.board_id,
                position: placement.position,
            },
        );

        Ok(placement)
    }

    /// Tracker for best-effort background work. Other writers (card
    /// create/update activity) spawn here so [`shutdown`](Self::shutdown)
    /// drains them too.
    pub fn side_effects(&self) -> &TaskTracker {
        &self.side_effects
    }

    /// Wait for in-flight side effects to finish. Relocations remain usable
    /// afterwards.
    pub async fn shutdown(&self) {
        self.side_effects.close();
        self.side_effects.wait().await;
    }

    async fn ensure_access(
        &self,
        actor_id: Uuid,
        board_id: Uuid,
        card_id: Uuid,
    ) -> Result<(), RelocationError> {
        let allowed = self
            .gate
            .can_access_board(actor_id, board_id)
            .await
            .map_err(RelocationError::Internal)?;
        if allowed {
            Ok(())
        } else {
            tracing::debug!(%board_id, "access denied, reporting not found");
            Err(RelocationError::NotFound { card_id })
        }
    }

    fn notify(&self, environment_id: Uuid, moved: CardMoved) {
        let notifier = Arc::clone(&self.notifier);
        self.side_effects.spawn(async move {
            if let Err(e) = notifier.record_move(&moved).await {
                tracing::warn!(error = %e, card_id = %moved.card_id, "failed to record move activity");
            }
            if let Err(e) = notifier.emit_moved(environment_id, &moved).await {
                tracing::warn!(error = %e, card_id = %moved.card_id, "failed to emit move event");
            }
        });
    }
}

/// Read, plan and write inside one transaction. `None` means the card or
/// the target board disappeared before the transaction started.
fn commit_relocation(db: &BoardDb, request: RelocationRequest) -> Result<Option<Committed>> {
    let tx = db.begin_positions()?;

    let Some((from_board_id, moving)) = tx.card_slot(request.card_id)? else {
        return Ok(None);
    };
    let Some(environment_id) = tx.board_environment(request.target_board_id)? else {
        return Ok(None);
    };

    let source = tx.list_ordered(from_board_id)?;
    let plan = if from_board_id == request.target_board_id {
        reconciler::plan_relocation(
            BoardList::new(from_board_id, &source),
            None,
            moving,
            request.new_position,
        )
    } else {
        let destination = tx.list_ordered(request.target_board_id)?;
        reconciler::plan_relocation(
            BoardList::new(from_board_id, &source),
            Some(BoardList::new(request.target_board_id, &destination)),
            moving,
            request.new_position,
        )
    };
    tracing::debug!(writes = ?plan.writes, "reconciled positions");

    tx.write_positions(&plan.writes)?;
    tx.commit()?;

    Ok(Some(Committed {
        plan,
        from_board_id,
        environment_id,
    }))
}
