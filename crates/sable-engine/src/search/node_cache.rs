//! Per-search move-visit statistics near the root.
//!
//! A small direct-mapped cache keyed by position hash. The iterative
//! deepening loop reads the root entry to tell the time manager what
//! fraction of the tree went into the current best move. Entries carry a
//! generation stamp: a new search reclaims stale slots without clearing
//! the array.

use sable_core::{Move, PackedMove};

/// Entries in the cache. Power of two; indexing uses the low hash bits.
const CACHE_SIZE: usize = 4096;

/// Move records kept per entry.
pub const MAX_CACHED_MOVES: usize = 16;

/// Per-move visit statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveStats {
    pub mv: PackedMove,
    pub nodes: u64,
    pub is_best: bool,
}

/// Statistics for one cached position.
#[derive(Debug, Clone, Copy)]
pub struct NodeCacheEntry {
    key: u64,
    generation: u32,
    pub distance_from_root: u16,
    nodes_sum: u64,
    moves: [MoveStats; MAX_CACHED_MOVES],
}

impl Default for NodeCacheEntry {
    fn default() -> Self {
        Self {
            key: 0,
            generation: 0,
            distance_from_root: 0,
            nodes_sum: 0,
            moves: [MoveStats::default(); MAX_CACHED_MOVES],
        }
    }
}

impl NodeCacheEntry {
    /// Total nodes recorded across all moves.
    #[inline]
    pub fn nodes_sum(&self) -> u64 {
        self.nodes_sum
    }

    /// Recorded moves, valid entries only.
    pub fn moves(&self) -> impl Iterator<Item = &MoveStats> {
        self.moves.iter().filter(|m| !m.mv.is_null())
    }

    /// Fraction of recorded nodes spent on `mv`.
    pub fn node_fraction(&self, mv: Move) -> f64 {
        if self.nodes_sum == 0 {
            return 0.0;
        }
        self.moves()
            .find(|m| mv == m.mv)
            .map_or(0.0, |m| m.nodes as f64 / self.nodes_sum as f64)
    }

    /// Add `nodes` to a move's count, inserting it if new. When the table
    /// is full the least-visited move is evicted. Counts are halved
    /// globally before any single count could overflow.
    pub fn add_move_stats(&mut self, mv: Move, nodes: u64) {
        let mut min_nodes = u64::MAX;
        let mut victim = None;

        for i in 0..MAX_CACHED_MOVES {
            let slot = self.moves[i];
            if mv == slot.mv && !slot.mv.is_null() {
                self.moves[i].nodes += nodes;
                self.nodes_sum += nodes;
                if self.moves[i].nodes >= u64::MAX / MAX_CACHED_MOVES as u64 {
                    self.scale_down();
                }
                return;
            }
            if slot.mv.is_null() || (slot.nodes < min_nodes && slot.nodes < nodes) {
                min_nodes = slot.nodes;
                victim = Some(i);
            }
        }

        if let Some(i) = victim {
            self.nodes_sum -= self.moves[i].nodes;
            self.nodes_sum += nodes;
            self.moves[i] = MoveStats {
                mv: mv.packed(),
                nodes,
                is_best: false,
            };
        }
    }

    /// Halve all counts, keeping relative proportions.
    fn scale_down(&mut self) {
        self.nodes_sum = 0;
        for slot in &mut self.moves {
            slot.nodes /= 2;
            self.nodes_sum += slot.nodes;
        }
    }

    /// Mark `mv` as the search's best move and rotate it to the front.
    pub fn set_best_move(&mut self, mv: Move) {
        if let Some(i) = (0..MAX_CACHED_MOVES).find(|&i| mv == self.moves[i].mv) {
            self.moves[i].is_best = true;
            self.moves[..=i].rotate_right(1);
        }
    }
}

/// Direct-mapped cache of [`NodeCacheEntry`] records.
#[derive(Debug)]
pub struct NodeCache {
    entries: Box<[NodeCacheEntry]>,
    generation: u32,
}

impl Default for NodeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeCache {
    pub fn new() -> Self {
        Self {
            entries: vec![NodeCacheEntry::default(); CACHE_SIZE].into_boxed_slice(),
            generation: 0,
        }
    }

    /// Begin a new root search; older-generation entries become reusable.
    pub fn on_new_search(&mut self) {
        self.generation += 1;
    }

    #[inline]
    fn index(hash: u64) -> usize {
        (hash & (CACHE_SIZE as u64 - 1)) as usize
    }

    /// Find the entry for a position, if cached this generation or earlier.
    pub fn try_get(&self, hash: u64) -> Option<&NodeCacheEntry> {
        let entry = &self.entries[Self::index(hash)];
        (entry.key == hash).then_some(entry)
    }

    /// Get or allocate the entry for a position.
    ///
    /// A matching entry is refreshed in place. A slot from an older
    /// generation is recycled. A current-generation slot holding a
    /// different position fails the allocation — there is no secondary
    /// probing.
    pub fn get_or_alloc(&mut self, hash: u64, distance_from_root: u16) -> Option<&mut NodeCacheEntry> {
        let generation = self.generation;
        let entry = &mut self.entries[Self::index(hash)];

        if entry.key == hash {
            entry.generation = generation;
            entry.distance_from_root = distance_from_root;
            return Some(entry);
        }

        if entry.generation < generation {
            *entry = NodeCacheEntry {
                key: hash,
                generation,
                distance_from_root,
                ..Default::default()
            };
            return Some(entry);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{Piece, ALL_SQUARES};

    fn mv(i: usize) -> Move {
        Move::new(
            ALL_SQUARES[i % 64],
            ALL_SQUARES[(i + 8) % 64],
            Piece::Knight,
            None,
            false,
            false,
            false,
        )
    }

    #[test]
    fn alloc_and_lookup() {
        let mut cache = NodeCache::new();
        cache.on_new_search();

        assert!(cache.try_get(0xABCD).is_none());
        let entry = cache.get_or_alloc(0xABCD, 0).unwrap();
        entry.add_move_stats(mv(1), 100);

        let entry = cache.try_get(0xABCD).unwrap();
        assert_eq!(entry.nodes_sum(), 100);
    }

    #[test]
    fn same_slot_current_generation_fails_allocation() {
        let mut cache = NodeCache::new();
        cache.on_new_search();

        let a = 0x10;
        let b = a + CACHE_SIZE as u64; // same index, different key
        assert!(cache.get_or_alloc(a, 0).is_some());
        assert!(cache.get_or_alloc(b, 1).is_none(), "no secondary probing");
    }

    #[test]
    fn old_generation_slot_is_recycled() {
        let mut cache = NodeCache::new();
        cache.on_new_search();

        let a = 0x10;
        let b = a + CACHE_SIZE as u64;
        cache.get_or_alloc(a, 0).unwrap().add_move_stats(mv(1), 50);

        cache.on_new_search();
        let entry = cache.get_or_alloc(b, 2).expect("stale slot should be reclaimed");
        assert_eq!(entry.nodes_sum(), 0, "recycled entry starts fresh");
        assert_eq!(entry.distance_from_root, 2);
    }

    #[test]
    fn existing_entry_survives_generation_bump() {
        let mut cache = NodeCache::new();
        cache.on_new_search();
        cache.get_or_alloc(0x77, 0).unwrap().add_move_stats(mv(3), 40);

        cache.on_new_search();
        // Same position revisited next search: the entry matches by key and
        // is refreshed rather than wiped.
        let entry = cache.get_or_alloc(0x77, 0).unwrap();
        assert_eq!(entry.nodes_sum(), 40);
    }

    #[test]
    fn move_accumulation_and_fraction() {
        let mut entry = NodeCacheEntry::default();
        entry.add_move_stats(mv(1), 300);
        entry.add_move_stats(mv(2), 100);
        entry.add_move_stats(mv(1), 100);

        assert_eq!(entry.nodes_sum(), 500);
        assert!((entry.node_fraction(mv(1)) - 0.8).abs() < 1e-9);
        assert!((entry.node_fraction(mv(2)) - 0.2).abs() < 1e-9);
        assert_eq!(entry.node_fraction(mv(9)), 0.0);
    }

    #[test]
    fn full_entry_evicts_least_visited() {
        let mut entry = NodeCacheEntry::default();
        for i in 0..MAX_CACHED_MOVES {
            entry.add_move_stats(mv(i), (i as u64 + 1) * 10);
        }
        // mv(0) has the fewest nodes (10); a heavier newcomer evicts it.
        entry.add_move_stats(mv(MAX_CACHED_MOVES), 1000);
        assert_eq!(entry.node_fraction(mv(0)), 0.0, "least-visited move evicted");
        assert!(entry.node_fraction(mv(MAX_CACHED_MOVES)) > 0.0);
    }

    #[test]
    fn lighter_newcomer_does_not_evict() {
        let mut entry = NodeCacheEntry::default();
        for i in 0..MAX_CACHED_MOVES {
            entry.add_move_stats(mv(i), 100);
        }
        let sum = entry.nodes_sum();
        entry.add_move_stats(mv(MAX_CACHED_MOVES), 5);
        assert_eq!(entry.nodes_sum(), sum, "newcomer lighter than every slot is dropped");
    }

    #[test]
    fn counts_halve_before_overflow() {
        let mut entry = NodeCacheEntry::default();
        let huge = u64::MAX / MAX_CACHED_MOVES as u64 - 1;
        entry.add_move_stats(mv(1), huge);
        entry.add_move_stats(mv(1), 10);
        assert!(entry.nodes_sum() < huge, "counts should have been halved");
        assert!(entry.node_fraction(mv(1)) > 0.99);
    }

    #[test]
    fn set_best_move_rotates_to_front() {
        let mut entry = NodeCacheEntry::default();
        entry.add_move_stats(mv(1), 10);
        entry.add_move_stats(mv(2), 20);
        entry.add_move_stats(mv(3), 30);

        entry.set_best_move(mv(3));
        let first = entry.moves().next().unwrap();
        assert!(mv(3) == first.mv);
        assert!(first.is_best);
        // Others keep their stats.
        assert_eq!(entry.nodes_sum(), 60);
    }

    #[test]
    fn set_best_move_unknown_is_noop() {
        let mut entry = NodeCacheEntry::default();
        entry.add_move_stats(mv(1), 10);
        entry.set_best_move(mv(9));
        assert!(!entry.moves().next().unwrap().is_best);
    }

    #[test]
    fn distance_from_root_is_tracked() {
        let mut cache = NodeCache::new();
        cache.on_new_search();
        let entry = cache.get_or_alloc(0x55, 3).unwrap();
        assert_eq!(entry.distance_from_root, 3);
    }
}
