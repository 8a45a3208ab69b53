use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use uuid::Uuid;

use super::models::*;
use super::reconciler::{self, BoardList};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Async-safe handle to the board database.
///
/// Each `call` opens its own connection on tokio's blocking pool, so
/// concurrent requests contend on SQLite's locks rather than on an
/// in-process mutex. Migrations run once, in [`DbHandle::open`].
#[derive(Clone)]
pub struct DbHandle {
    path: Arc<PathBuf>,
    busy_timeout: Duration,
}

impl DbHandle {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let db = BoardDb::connect(path, busy_timeout)?;
        db.enable_wal()?;
        db.run_migrations().context("Failed to run migrations")?;
        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            busy_timeout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a closure with a fresh connection on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let path = Arc::clone(&self.path);
        let busy_timeout = self.busy_timeout;
        tokio::task::spawn_blocking(move || {
            let db = BoardDb::connect(&path, busy_timeout)?;
            f(&db)
        })
        .await
        .context("DB task panicked")?
    }
}

/// Board whose stored positions are not exactly `0..n-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsettledBoard {
    pub board_id: Uuid,
    pub positions: Vec<i32>,
}

pub struct BoardDb {
    conn: Connection,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let db = Self::connect(path, DEFAULT_BUSY_TIMEOUT)?;
        db.run_migrations().context("Failed to run migrations")?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        db.run_migrations().context("Failed to run migrations")?;
        Ok(db)
    }

    fn connect(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        conn.busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")
    }

    fn enable_wal(&self) -> Result<()> {
        let mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("Failed to enable WAL journal mode")?;
        tracing::debug!(journal_mode = %mode, "database journal mode set");
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        // (board_id, position) is not UNIQUE: a reindex passes through
        // transient duplicates before it commits.
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS environments (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    owner_id TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS environment_members (
                    environment_id TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'member',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (environment_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS boards (
                    id TEXT PRIMARY KEY,
                    environment_id TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    description TEXT,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS cards (
                    id TEXT PRIMARY KEY,
                    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT,
                    position INTEGER NOT NULL,
                    due_date TEXT,
                    completed INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS activity_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL,
                    action TEXT NOT NULL,
                    details TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_members_user ON environment_members(user_id);
                CREATE INDEX IF NOT EXISTS idx_boards_environment ON boards(environment_id);
                CREATE INDEX IF NOT EXISTS idx_cards_board ON cards(board_id);
                CREATE INDEX IF NOT EXISTS idx_cards_board_position ON cards(board_id, position);
                CREATE INDEX IF NOT EXISTS idx_cards_due_date ON cards(due_date);
                CREATE INDEX IF NOT EXISTS idx_activity_card ON activity_logs(card_id);
                CREATE INDEX IF NOT EXISTS idx_activity_created ON activity_logs(created_at);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// Begin an `IMMEDIATE` transaction for position changes. Dropping the
    /// returned handle without committing rolls back.
    pub fn begin_positions(&self) -> Result<PositionTx<'_>> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin position transaction")?;
        Ok(PositionTx { tx })
    }

    // ── Environments & membership ─────────────────────────────────────

    pub fn create_environment(&self, name: &str, owner_id: Uuid) -> Result<Environment> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO environments (id, name, owner_id) VALUES (?1, ?2, ?3)",
                params![id.to_string(), name, owner_id.to_string()],
            )
            .context("Failed to insert environment")?;
        self.get_environment(id)?
            .context("Environment not found after insert")
    }

    pub fn get_environment(&self, id: Uuid) -> Result<Option<Environment>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, owner_id, created_at FROM environments WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query environment")?;
        row.map(|(id, name, owner_id, created_at)| {
            Ok(Environment {
                id: parse_id(&id, "environment")?,
                name,
                owner_id: parse_id(&owner_id, "owner")?,
                created_at,
            })
        })
        .transpose()
    }

    /// Store-level membership seeding. There is no administration surface
    /// on top of this.
    pub fn add_member(&self, environment_id: Uuid, user_id: Uuid, role: &MemberRole) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO environment_members (environment_id, user_id, role) VALUES (?1, ?2, ?3)
                 ON CONFLICT(environment_id, user_id) DO UPDATE SET role = excluded.role",
                params![environment_id.to_string(), user_id.to_string(), role.as_str()],
            )
            .context("Failed to insert environment member")?;
        Ok(())
    }

    /// True if `actor_id` owns or is a member of the environment that owns
    /// `board_id`. Unknown boards are never accessible.
    pub fn can_access_board(&self, actor_id: Uuid, board_id: Uuid) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM boards b
                     JOIN environments e ON e.id = b.environment_id
                     WHERE b.id = ?1
                       AND (e.owner_id = ?2 OR EXISTS (
                           SELECT 1 FROM environment_members m
                           WHERE m.environment_id = e.id AND m.user_id = ?2))
                 )",
                params![board_id.to_string(), actor_id.to_string()],
                |row| row.get(0),
            )
            .context("Failed to check board access")
    }

    /// True if `actor_id` owns or is a member of the environment.
    pub fn can_access_environment(&self, actor_id: Uuid, environment_id: Uuid) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM environments e
                     WHERE e.id = ?1
                       AND (e.owner_id = ?2 OR EXISTS (
                           SELECT 1 FROM environment_members m
                           WHERE m.environment_id = e.id AND m.user_id = ?2))
                 )",
                params![environment_id.to_string(), actor_id.to_string()],
                |row| row.get(0),
            )
            .context("Failed to check environment access")
    }

    // ── Boards ────────────────────────────────────────────────────────

    pub fn create_board(
        &self,
        environment_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Board> {
        // Count and insert under one write lock so concurrent creates append
        // to distinct slots.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin board transaction")?;
        let position: i32 = tx
            .query_row(
                "SELECT COUNT(*) FROM boards WHERE environment_id = ?1",
                params![environment_id.to_string()],
                |row| row.get(0),
            )
            .context("Failed to count boards")?;
        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO boards (id, environment_id, name, description, position) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id.to_string(), environment_id.to_string(), name, description, position],
        )
        .context("Failed to insert board")?;
        tx.commit().context("Failed to commit board creation")?;
        self.get_board(id)?.context("Board not found after insert")
    }

    pub fn get_board(&self, id: Uuid) -> Result<Option<Board>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, environment_id, name, description, position, created_at FROM boards WHERE id = ?1",
                params![id.to_string()],
                BoardRow::from_row,
            )
            .optional()
            .context("Failed to query board")?;
        row.map(BoardRow::into_board).transpose()
    }

    pub fn list_boards(&self, environment_id: Uuid) -> Result<Vec<BoardSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT b.id, b.environment_id, b.name, b.description, b.position, b.created_at,
                        (SELECT COUNT(*) FROM cards c WHERE c.board_id = b.id)
                 FROM boards b WHERE b.environment_id = ?1 ORDER BY b.position, b.created_at",
            )
            .context("Failed to prepare list_boards")?;
        let rows = stmt
            .query_map(params![environment_id.to_string()], |row| {
                Ok((BoardRow::from_row(row)?, row.get::<_, i64>(6)?))
            })
            .context("Failed to query boards")?;
        let mut boards = Vec::new();
        for row in rows {
            let (board, cards_count) = row.context("Failed to read board row")?;
            boards.push(BoardSummary {
                board: board.into_board()?,
                cards_count,
            });
        }
        Ok(boards)
    }

    pub fn board_environment(&self, board_id: Uuid) -> Result<Option<Uuid>> {
        query_board_environment(&self.conn, board_id)
    }

    // ── Cards ─────────────────────────────────────────────────────────

    /// Ordered `(card, position)` list for one board, outside any
    /// transaction.
    pub fn list_ordered(&self, board_id: Uuid) -> Result<Vec<Slot>> {
        query_slots(&self.conn, board_id)
    }

    pub fn create_card(&self, board_id: Uuid, card: &NewCard) -> Result<Card> {
        let id = Uuid::new_v4();
        let tx = self.begin_positions()?;
        tx.board_environment(board_id)?
            .with_context(|| format!("Board {} not found", board_id))?;
        let slots = tx.list_ordered(board_id)?;
        let plan = reconciler::plan_insert(BoardList::new(board_id, &slots), id, card.position);

        tx.insert_card(id, board_id, card, plan.placement.position)?;
        let shifted: Vec<PositionWrite> =
            plan.writes.into_iter().filter(|w| w.card_id != id).collect();
        tx.write_positions(&shifted)?;
        tx.commit().context("Failed to commit card creation")?;

        self.get_card(id)?.context("Card not found after insert")
    }

    pub fn get_card(&self, id: Uuid) -> Result<Option<Card>> {
        query_card(&self.conn, id)
    }

    pub fn list_cards(&self, board_id: Uuid) -> Result<Vec<Card>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {CARD_COLUMNS} FROM cards WHERE board_id = ?1 ORDER BY position, created_at, id"
            ))
            .context("Failed to prepare list_cards")?;
        let rows = stmt
            .query_map(params![board_id.to_string()], CardRow::from_row)
            .context("Failed to query cards")?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row.context("Failed to read card row")?.into_card()?);
        }
        Ok(cards)
    }

    pub fn update_card(&self, id: Uuid, update: &CardUpdate) -> Result<Option<Card>> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin transaction")?;
        let key = id.to_string();

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM cards WHERE id = ?1)",
                params![key],
                |row| row.get(0),
            )
            .context("Failed to look up card")?;
        if !exists {
            return Ok(None);
        }

        if let Some(title) = &update.title {
            tx.execute(
                "UPDATE cards SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![title, key],
            )
            .context("Failed to update card title")?;
        }
        if let Some(description) = &update.description {
            tx.execute(
                "UPDATE cards SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![description, key],
            )
            .context("Failed to update card description")?;
        }
        if let Some(due_date) = &update.due_date {
            tx.execute(
                "UPDATE cards SET due_date = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![due_date, key],
            )
            .context("Failed to update card due date")?;
        }
        if let Some(completed) = update.completed {
            tx.execute(
                "UPDATE cards SET completed = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![completed, key],
            )
            .context("Failed to update card completion")?;
        }

        tx.commit().context("Failed to commit card update")?;
        self.get_card(id)
    }

    /// Delete a card and close the gap it leaves. Returns the deleted card.
    pub fn delete_card(&self, id: Uuid) -> Result<Option<Card>> {
        let tx = self.begin_positions()?;
        let Some(card) = query_card(&tx.tx, id)? else {
            return Ok(None);
        };
        let slots = tx.list_ordered(card.board_id)?;
        let writes = reconciler::plan_removal(BoardList::new(card.board_id, &slots), id);

        tx.delete_card(id)?;
        tx.write_positions(&writes)?;
        tx.commit().context("Failed to commit card deletion")?;
        Ok(Some(card))
    }

    /// Every board whose stored positions are not dense.
    pub fn dense_violations(&self) -> Result<Vec<UnsettledBoard>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM boards ORDER BY created_at, id")
            .context("Failed to prepare board scan")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to scan boards")?;

        let mut unsettled = Vec::new();
        for raw in ids {
            let board_id = parse_id(&raw.context("Failed to read board id")?, "board")?;
            let slots = self.list_ordered(board_id)?;
            if !reconciler::is_dense(&slots) {
                unsettled.push(UnsettledBoard {
                    board_id,
                    positions: slots.iter().map(|s| s.position).collect(),
                });
            }
        }
        Ok(unsettled)
    }

    // ── Activity log ──────────────────────────────────────────────────

    pub fn insert_activity(
        &self,
        card_id: Uuid,
        user_id: Uuid,
        action: &ActivityAction,
        details: Option<&str>,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO activity_logs (card_id, user_id, action, details) VALUES (?1, ?2, ?3, ?4)",
                params![card_id.to_string(), user_id.to_string(), action.as_str(), details],
            )
            .context("Failed to insert activity entry")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Activity for one card, newest first.
    pub fn list_activity(&self, card_id: Uuid) -> Result<Vec<ActivityEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, card_id, user_id, action, details, created_at
                 FROM activity_logs WHERE card_id = ?1 ORDER BY created_at DESC, id DESC",
            )
            .context("Failed to prepare list_activity")?;
        let rows = stmt
            .query_map(params![card_id.to_string()], |row| {
                Ok(ActivityRow {
                    id: row.get(0)?,
                    card_id: row.get(1)?,
                    user_id: row.get(2)?,
                    action: row.get(3)?,
                    details: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .context("Failed to query activity")?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("Failed to read activity row")?.into_entry()?);
        }
        Ok(entries)
    }
}

// ── Position transaction ──────────────────────────────────────────────

/// Open `IMMEDIATE` transaction scoped to position changes. All reads made
/// through it see the state as of transaction start plus its own writes.
pub struct PositionTx<'conn> {
    tx: Transaction<'conn>,
}

impl PositionTx<'_> {
    /// Current `(board, position)` of a card.
    pub fn card_slot(&self, card_id: Uuid) -> Result<Option<(Uuid, Slot)>> {
        let row = self
            .tx
            .query_row(
                "SELECT board_id, position FROM cards WHERE id = ?1",
                params![card_id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?)),
            )
            .optional()
            .context("Failed to read card slot")?;
        row.map(|(board_id, position)| {
            Ok((
                parse_id(&board_id, "board")?,
                Slot { card_id, position },
            ))
        })
        .transpose()
    }

    pub fn board_environment(&self, board_id: Uuid) -> Result<Option<Uuid>> {
        query_board_environment(&self.tx, board_id)
    }

    pub fn list_ordered(&self, board_id: Uuid) -> Result<Vec<Slot>> {
        query_slots(&self.tx, board_id)
    }

    pub fn write_positions(&self, writes: &[PositionWrite]) -> Result<()> {
        let mut stmt = self
            .tx
            .prepare_cached(
                "UPDATE cards SET board_id = ?1, position = ?2, updated_at = datetime('now') WHERE id = ?3",
            )
            .context("Failed to prepare position write")?;
        for write in writes {
            let changed = stmt
                .execute(params![
                    write.board_id.to_string(),
                    write.position,
                    write.card_id.to_string()
                ])
                .with_context(|| format!("Failed to write position for card {}", write.card_id))?;
            if changed == 0 {
                anyhow::bail!("Card {} vanished during reindex", write.card_id);
            }
        }
        Ok(())
    }

    fn insert_card(&self, id: Uuid, board_id: Uuid, card: &NewCard, position: i32) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO cards (id, board_id, title, description, position, due_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    board_id.to_string(),
                    card.title,
                    card.description,
                    position,
                    card.due_date
                ],
            )
            .context("Failed to insert card")?;
        Ok(())
    }

    fn delete_card(&self, id: Uuid) -> Result<()> {
        self.tx
            .execute("DELETE FROM cards WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete card")?;
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit().context("Failed to commit position transaction")
    }

    pub fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .context("Failed to roll back position transaction")
    }
}

// ── Row helpers ───────────────────────────────────────────────────────

const CARD_COLUMNS: &str =
    "id, board_id, title, description, position, due_date, completed, created_at, updated_at";

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid {} id '{}'", what, raw))
}

fn query_slots(conn: &Connection, board_id: Uuid) -> Result<Vec<Slot>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, position FROM cards WHERE board_id = ?1 ORDER BY position, created_at, id",
        )
        .context("Failed to prepare list_ordered")?;
    let rows = stmt
        .query_map(params![board_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?))
        })
        .context("Failed to query ordered cards")?;
    let mut slots = Vec::new();
    for row in rows {
        let (card_id, position) = row.context("Failed to read slot row")?;
        slots.push(Slot {
            card_id: parse_id(&card_id, "card")?,
            position,
        });
    }
    Ok(slots)
}

fn query_board_environment(conn: &Connection, board_id: Uuid) -> Result<Option<Uuid>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT environment_id FROM boards WHERE id = ?1",
            params![board_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to read board environment")?;
    raw.map(|id| parse_id(&id, "environment")).transpose()
}

fn query_card(conn: &Connection, id: Uuid) -> Result<Option<Card>> {
    let row = conn
        .query_row(
            &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
            params![id.to_string()],
            CardRow::from_row,
        )
        .optional()
        .context("Failed to query card")?;
    row.map(CardRow::into_card).transpose()
}

/// Intermediate row struct for reading cards before parsing ids.
struct CardRow {
    id: String,
    board_id: String,
    title: String,
    description: Option<String>,
    position: i32,
    due_date: Option<String>,
    completed: bool,
    created_at: String,
    updated_at: String,
}

impl CardRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            board_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            position: row.get(4)?,
            due_date: row.get(5)?,
            completed: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_card(self) -> Result<Card> {
        Ok(Card {
            id: parse_id(&self.id, "card")?,
            board_id: parse_id(&self.board_id, "board")?,
            title: self.title,
            description: self.description,
            position: self.position,
            due_date: self.due_date,
            completed: self.completed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

struct BoardRow {
    id: String,
    environment_id: String,
    name: String,
    description: Option<String>,
    position: i32,
    created_at: String,
}

impl BoardRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            environment_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            position: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_board(self) -> Result<Board> {
        Ok(Board {
            id: parse_id(&self.id, "board")?,
            environment_id: parse_id(&self.environment_id, "environment")?,
            name: self.name,
            description: self.description,
            position: self.position,
            created_at: self.created_at,
        })
    }
}

struct ActivityRow {
    id: i64,
    card_id: String,
    user_id: String,
    action: String,
    details: Option<String>,
    created_at: String,
}

impl ActivityRow {
    fn into_entry(self) -> Result<ActivityEntry> {
        let action = ActivityAction::from_str(&self.action)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse activity action")?;
        Ok(ActivityEntry {
            id: self.id,
            card_id: parse_id(&self.card_id, "card")?,
            user_id: parse_id(&self.user_id, "user")?,
            action,
            details: self.details,
            created_at: self.created_at,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
