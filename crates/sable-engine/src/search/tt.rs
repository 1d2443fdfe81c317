//! Shared transposition table.
//!
//! Single-slot open addressing over a power-of-two array, indexed by the
//! low bits of the Zobrist key. The table is shared between search threads
//! without locks: entries are triplets of relaxed atomics, and the key
//! word stores `hash ^ data` so a torn key/payload pair fails validation
//! and reads as a miss. The move-hint word is not covered by the checksum;
//! hints are re-validated against generated legal moves before use.

use std::sync::atomic::{AtomicU64, Ordering};

use sable_core::{score_from_tt, score_to_tt, PackedMove, Position, INVALID_EVAL};

/// Number of best-move hints kept per entry.
pub const NUM_TT_MOVES: usize = 2;

/// Bound type of a stored score. `Exact` is both a lower and an upper
/// bound, which the bit tests below rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bounds {
    Invalid = 0,
    Lower = 1,
    Upper = 2,
    Exact = 3,
}

impl Bounds {
    #[inline]
    fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            1 => Bounds::Lower,
            2 => Bounds::Upper,
            3 => Bounds::Exact,
            _ => Bounds::Invalid,
        }
    }

    /// Lower or Exact.
    #[inline]
    pub fn includes_lower(self) -> bool {
        self as u8 & 1 != 0
    }

    /// Upper or Exact.
    #[inline]
    pub fn includes_upper(self) -> bool {
        self as u8 & 2 != 0
    }
}

/// One decoded transposition-table record.
#[derive(Debug, Clone, Copy)]
pub struct TtEntry {
    /// Full Zobrist key; zero only in empty slots.
    pub hash: u64,
    /// Search score, mate distances rebased by [`score_to_tt`].
    pub score: i16,
    /// Cached static evaluation, [`INVALID_EVAL`] when never computed.
    pub static_eval: i16,
    /// Draft of the stored search; 0 for quiescence, `i8::MAX` for proofs.
    pub depth: i8,
    pub bounds: Bounds,
    /// Best-move hints, most recent first.
    pub moves: [PackedMove; NUM_TT_MOVES],
}

impl TtEntry {
    /// Entry with no move hints.
    pub fn new(hash: u64, score: i16, static_eval: i16, depth: i8, bounds: Bounds) -> Self {
        Self {
            hash,
            score,
            static_eval,
            depth,
            bounds,
            moves: [PackedMove::NULL; NUM_TT_MOVES],
        }
    }

    /// Score translated back to root-relative form at `ply`.
    #[inline]
    pub fn score_at(&self, ply: usize, halfmove_clock: u16) -> i32 {
        score_from_tt(self.score, ply, halfmove_clock)
    }

    /// Static eval as an option.
    #[inline]
    pub fn static_eval(&self) -> Option<i32> {
        (self.static_eval != INVALID_EVAL).then_some(self.static_eval as i32)
    }
}

#[inline]
fn pack_data(score: i16, static_eval: i16, depth: i8, bounds: Bounds) -> u64 {
    (score as u16 as u64)
        | (static_eval as u16 as u64) << 16
        | (depth as u8 as u64) << 32
        | (bounds as u64) << 40
}

#[inline]
fn pack_hints(moves: &[PackedMove; NUM_TT_MOVES]) -> u64 {
    moves[0].raw() as u64 | (moves[1].raw() as u64) << 16
}

#[inline]
fn unpack_hints(hints: u64) -> [PackedMove; NUM_TT_MOVES] {
    [
        PackedMove::from_raw(hints as u16),
        PackedMove::from_raw((hints >> 16) as u16),
    ]
}

#[derive(Default)]
struct Slot {
    /// `hash ^ data`; doubles as the torn-read checksum.
    key: AtomicU64,
    data: AtomicU64,
    hints: AtomicU64,
}

/// The transposition table. Sized to a power of two; `clear` and probe
/// operations take `&self` so the table can be shared across threads.
pub struct TranspositionTable {
    slots: Box<[Slot]>,
    mask: u64,
}

impl TranspositionTable {
    /// Create a table using roughly `mb` megabytes, rounded down to a
    /// power-of-two entry count.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let entries = (bytes / std::mem::size_of::<Slot>()).max(1);
        let entries = if entries.is_power_of_two() {
            entries
        } else {
            entries.next_power_of_two() / 2
        };
        Self::with_entries(entries)
    }

    /// Create a table with an exact power-of-two entry count.
    pub fn with_entries(entries: usize) -> Self {
        debug_assert!(entries.is_power_of_two());
        let slots: Vec<Slot> = (0..entries).map(|_| Slot::default()).collect();
        Self {
            slots: slots.into_boxed_slice(),
            mask: entries as u64 - 1,
        }
    }

    #[inline]
    fn slot(&self, hash: u64) -> &Slot {
        &self.slots[(hash & self.mask) as usize]
    }

    /// Number of entries the table can hold.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Hint the CPU that this position's slot is about to be read.
    #[inline]
    pub fn prefetch(&self, hash: u64) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            let slot = self.slot(hash);
            _mm_prefetch::<_MM_HINT_T0>(slot as *const Slot as *const i8);
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = hash;
        }
    }

    /// Look up a position. A hit requires the checksum-validated key to
    /// match and the bounds to be valid; anything else (empty slot,
    /// collision, torn write) is a miss.
    pub fn read(&self, pos: &Position) -> Option<TtEntry> {
        let hash = pos.hash();
        let slot = self.slot(hash);
        let key = slot.key.load(Ordering::Relaxed);
        let data = slot.data.load(Ordering::Relaxed);

        if key ^ data != hash {
            return None;
        }

        let bounds = Bounds::from_bits((data >> 40) as u8);
        if bounds == Bounds::Invalid {
            return None;
        }

        Some(TtEntry {
            hash,
            score: data as u16 as i16,
            static_eval: (data >> 16) as u16 as i16,
            depth: (data >> 32) as u8 as i8,
            bounds,
            moves: unpack_hints(slot.hints.load(Ordering::Relaxed)),
        })
    }

    /// Store an entry.
    ///
    /// Replacement: a different key always replaces; the same key is
    /// replaced only by an entry at least as deep or with different
    /// bounds. On a same-key write the incoming move hints are merged in
    /// front of the stored ones.
    pub fn write(&self, entry: &TtEntry) {
        debug_assert!(entry.bounds != Bounds::Invalid);
        debug_assert!(entry.depth >= 0);

        let slot = self.slot(entry.hash);
        let old_key = slot.key.load(Ordering::Relaxed);
        let old_data = slot.data.load(Ordering::Relaxed);

        let mut moves = entry.moves;
        if old_key ^ old_data == entry.hash
            && Bounds::from_bits((old_data >> 40) as u8) != Bounds::Invalid
        {
            let old_depth = (old_data >> 32) as u8 as i8;
            let old_bounds = Bounds::from_bits((old_data >> 40) as u8);
            if entry.depth < old_depth && entry.bounds == old_bounds {
                return;
            }
            moves = merge_moves(&entry.moves, unpack_hints(slot.hints.load(Ordering::Relaxed)));
        }

        let data = pack_data(entry.score, entry.static_eval, entry.depth, entry.bounds);
        slot.data.store(data, Ordering::Relaxed);
        slot.key.store(entry.hash ^ data, Ordering::Relaxed);
        slot.hints.store(pack_hints(&moves), Ordering::Relaxed);
    }

    /// Drop every entry, keeping the allocation.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.key.store(0, Ordering::Relaxed);
            slot.data.store(0, Ordering::Relaxed);
            slot.hints.store(0, Ordering::Relaxed);
        }
    }

    /// Re-allocate to a new power-of-two entry count, re-hashing valid
    /// entries. Entries whose new slot is already taken are dropped.
    pub fn resize(&mut self, entries: usize) {
        debug_assert!(entries.is_power_of_two());
        if entries == self.slots.len() {
            return;
        }

        let old = std::mem::replace(self, Self::with_entries(entries));
        for slot in old.slots.iter() {
            let key = slot.key.load(Ordering::Relaxed);
            let data = slot.data.load(Ordering::Relaxed);
            if data == 0 || Bounds::from_bits((data >> 40) as u8) == Bounds::Invalid {
                continue;
            }
            let hash = key ^ data;
            let target = self.slot(hash);
            if target.data.load(Ordering::Relaxed) == 0 {
                target.data.store(data, Ordering::Relaxed);
                target.key.store(hash ^ data, Ordering::Relaxed);
                target
                    .hints
                    .store(slot.hints.load(Ordering::Relaxed), Ordering::Relaxed);
            }
        }
    }

    /// Count of occupied slots. Linear scan; diagnostics only.
    pub fn num_used(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.data.load(Ordering::Relaxed) != 0)
            .count()
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("entries", &self.slots.len())
            .finish()
    }
}

/// Prepend `new` move hints to `old`, dropping nulls and duplicates and
/// truncating to [`NUM_TT_MOVES`].
fn merge_moves(
    new: &[PackedMove; NUM_TT_MOVES],
    old: [PackedMove; NUM_TT_MOVES],
) -> [PackedMove; NUM_TT_MOVES] {
    let mut merged = [PackedMove::NULL; NUM_TT_MOVES];
    let mut count = 0;

    for mv in new.iter().chain(old.iter()) {
        if mv.is_null() || merged[..count].contains(mv) {
            continue;
        }
        merged[count] = *mv;
        count += 1;
        if count == NUM_TT_MOVES {
            break;
        }
    }

    merged
}

/// Convenience for the search: build and store an entry in one call.
#[allow(clippy::too_many_arguments)]
pub fn write_entry(
    tt: &TranspositionTable,
    pos: &Position,
    score: i32,
    ply: usize,
    static_eval: Option<i32>,
    depth: i8,
    bounds: Bounds,
    moves: &[PackedMove],
) {
    let mut hint_array = [PackedMove::NULL; NUM_TT_MOVES];
    for (slot, mv) in hint_array.iter_mut().zip(moves.iter()) {
        *slot = *mv;
    }
    tt.write(&TtEntry {
        hash: pos.hash(),
        score: score_to_tt(score, ply),
        static_eval: static_eval.map_or(INVALID_EVAL, |e| e as i16),
        depth,
        bounds,
        moves: hint_array,
    });
}
