use std::cell::Cell;

thread_local! {
    /// Whether the last lookup found an existing slot.
    static LAST_WAS_HIT: Cell<bool> = const { Cell::new(false) };
}

/// Whether the last lookup on this thread reused an existing slot.
pub fn last_was_hit() -> bool {
    LAST_WAS_HIT.with(|cell| cell.get())
}

/// Records the result of a lookup.
pub(crate) fn register(hit: bool) {
    LAST_WAS_HIT.with(|cell| cell.set(hit))
}
