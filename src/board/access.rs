use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DbHandle;

/// Decides whether an actor may act on a board.
#[async_trait]
pub trait AccessGate: Send + Sync {
    /// True if `actor_id` owns or is a member of the board's environment.
    /// Unknown boards answer `false`.
    async fn can_access_board(&self, actor_id: Uuid, board_id: Uuid) -> Result<bool>;
}

/// Access gate backed by environment ownership and membership rows.
#[derive(Clone)]
pub struct MembershipGate {
    db: DbHandle,
}

impl MembershipGate {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccessGate for MembershipGate {
    async fn can_access_board(&self, actor_id: Uuid, board_id: Uuid) -> Result<bool> {
        self.db
            .call(move |db| db.can_access_board(actor_id, board_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::db::DEFAULT_BUSY_TIMEOUT;
    use crate::board::models::MemberRole;

    #[tokio::test]
    async fn test_membership_gate_owner_member_stranger() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db = DbHandle::open(&dir.path().join("gate.db"), DEFAULT_BUSY_TIMEOUT)?;
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let board = db
            .call(move |db| {
                let env = db.create_environment("Acme", owner)?;
                db.add_member(env.id, member, &MemberRole::Member)?;
                db.create_board(env.id, "Todo", None)
            })
            .await?;

        let gate = MembershipGate::new(db);
        assert!(gate.can_access_board(owner, board.id).await?);
        assert!(gate.can_access_board(member, board.id).await?);
        assert!(!gate.can_access_board(Uuid::new_v4(), board.id).await?);
        assert!(!gate.can_access_board(owner, Uuid::new_v4()).await?);
        Ok(())
    }
}
