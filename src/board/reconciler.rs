//! Position reconciler.
//!
//! Pure functions that turn "put this card there" into the exact set of
//! `(card, board, position)` writes needed to keep every affected board
//! dense (`0..n-1`, no gaps, no duplicates). Nothing here touches storage;
//! callers read the lists inside their transaction, plan, then apply.
//!
//! Every plan is computed by rebuilding the final card order and emitting a
//! write for each card whose stored position (or board) differs from its new
//! index. On a settled list this is exactly the shifted sub-range plus the
//! moving card; on an unsettled list it also repairs whatever is out of
//! place.

use std::collections::HashMap;

use uuid::Uuid;

use super::models::{Placement, PositionWrite, Slot};

/// A board's ordered card list as read at transaction start.
#[derive(Debug, Clone, Copy)]
pub struct BoardList<'a> {
    pub board_id: Uuid,
    /// Slots ordered by position ascending.
    pub slots: &'a [Slot],
}

impl<'a> BoardList<'a> {
    pub fn new(board_id: Uuid, slots: &'a [Slot]) -> Self {
        Self { board_id, slots }
    }

    fn len(&self) -> i32 {
        i32::try_from(self.slots.len()).unwrap_or(i32::MAX)
    }

    fn order_without(&self, card_id: Uuid) -> Vec<Uuid> {
        self.slots
            .iter()
            .map(|s| s.card_id)
            .filter(|id| *id != card_id)
            .collect()
    }
}

/// Result of planning a relocation or insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationPlan {
    pub placement: Placement,
    /// Unordered write set; empty for a no-op.
    pub writes: Vec<PositionWrite>,
}

impl RelocationPlan {
    fn unchanged(board_id: Uuid, card_id: Uuid, position: i32) -> Self {
        Self {
            placement: Placement {
                id: card_id,
                board_id,
                position,
            },
            writes: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Plan moving `moving` to `requested` on `destination`.
///
/// `destination` of `None` (or a list for the source board itself) is a
/// same-board reorder; `requested` is clamped to `[0, n-1]`. For a
/// cross-board move it is clamped to `[0, n]` of the destination list, so
/// appending after the last card is allowed.
pub fn plan_relocation(
    source: BoardList<'_>,
    destination: Option<BoardList<'_>>,
    moving: Slot,
    requested: i32,
) -> RelocationPlan {
    match destination {
        Some(dest) if dest.board_id != source.board_id => {
            plan_cross_board(source, dest, moving, requested)
        }
        _ => plan_same_board(source, moving, requested),
    }
}

fn plan_same_board(board: BoardList<'_>, moving: Slot, requested: i32) -> RelocationPlan {
    let Some(from) = board.slots.iter().position(|s| s.card_id == moving.card_id) else {
        return RelocationPlan::unchanged(board.board_id, moving.card_id, moving.position);
    };
    let to = clamp(requested, board.len() - 1);
    if from as i32 == to {
        return RelocationPlan::unchanged(
            board.board_id,
            moving.card_id,
            board.slots[from].position,
        );
    }

    let mut order = board.order_without(moving.card_id);
    order.insert(to as usize, moving.card_id);

    RelocationPlan {
        placement: Placement {
            id: moving.card_id,
            board_id: board.board_id,
            position: to,
        },
        writes: reindex(board, &order),
    }
}

fn plan_cross_board(
    source: BoardList<'_>,
    destination: BoardList<'_>,
    moving: Slot,
    requested: i32,
) -> RelocationPlan {
    let mut dest_order = destination.order_without(moving.card_id);
    let to = clamp(requested, dest_order.len() as i32);
    dest_order.insert(to as usize, moving.card_id);

    // Both lists come from the same snapshot, so opening the destination
    // slot never sees the source gap-close and vice versa.
    let mut writes = reindex(destination, &dest_order);
    writes.extend(reindex(source, &source.order_without(moving.card_id)));

    RelocationPlan {
        placement: Placement {
            id: moving.card_id,
            board_id: destination.board_id,
            position: to,
        },
        writes,
    }
}

/// Plan placing a brand-new card on `board`. `requested` of `None` appends.
pub fn plan_insert(board: BoardList<'_>, card_id: Uuid, requested: Option<i32>) -> RelocationPlan {
    let mut order = board.order_without(card_id);
    let to = clamp(requested.unwrap_or(order.len() as i32), order.len() as i32);
    order.insert(to as usize, card_id);

    RelocationPlan {
        placement: Placement {
            id: card_id,
            board_id: board.board_id,
            position: to,
        },
        writes: reindex(board, &order),
    }
}

/// Plan closing the gap left by removing `card_id` from `board`.
pub fn plan_removal(board: BoardList<'_>, card_id: Uuid) -> Vec<PositionWrite> {
    reindex(board, &board.order_without(card_id))
}

/// Whether `slots` holds exactly the positions `0..n-1`.
pub fn is_dense(slots: &[Slot]) -> bool {
    let mut positions: Vec<i32> = slots.iter().map(|s| s.position).collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(index, position)| *position == index as i32)
}

fn clamp(requested: i32, max: i32) -> i32 {
    requested.clamp(0, max.max(0))
}

/// Emit a write for every card in `order` whose stored slot on `board`
/// differs from its index. Cards not stored on `board` are always written.
fn reindex(board: BoardList<'_>, order: &[Uuid]) -> Vec<PositionWrite> {
    let stored: HashMap<Uuid, i32> = board
        .slots
        .iter()
        .map(|s| (s.card_id, s.position))
        .collect();

    order
        .iter()
        .enumerate()
        .filter_map(|(index, card_id)| {
            let index = index as i32;
            (stored.get(card_id) != Some(&index)).then_some(PositionWrite {
                card_id: *card_id,
                board_id: board.board_id,
                position: index,
            })
        })
        .collect()
}
