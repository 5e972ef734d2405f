//! Node storage for skip lists.
//!
//! A `SkipArena` owns every node of every `OrderedSet` built on top of it. Nodes
//! are addressed by `u32` handles and their forward links live in one shared
//! link buffer, recycled through one free list per node height. Sets that share
//! an arena can hand nodes to each other without reallocating.

use crate::util::{DenoiseError, DenoiseResult};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Highest node level a skip list may use.
pub const MAX_LEVEL: usize = 10;

/// Default upper bound on live nodes in one arena.
pub const DEFAULT_NODE_CAPACITY: usize = 1 << 20;

// p = 12055 / 32768, close to 1/e.
const LEVEL_NUMERATOR: u32 = 12055;
const LEVEL_DENOMINATOR: u32 = 32768;
const LEVEL_SEED: u64 = 0x5eed_1e7e1;

/// Link value marking the end of a level.
pub(crate) const END: u32 = u32::MAX;
/// Path value standing for a list head.
pub(crate) const HEAD: u32 = u32::MAX - 1;

#[derive(Clone, Copy)]
struct NodeSlot<T> {
    value: T,
    level: u8,
    links: u32,
}

/// Arena of skip-list nodes shared by a family of ordered sets.
pub struct SkipArena<T> {
    nodes: Vec<NodeSlot<T>>,
    links: Vec<u32>,
    free_nodes: Vec<u32>,
    free_links: [Vec<u32>; MAX_LEVEL],
    capacity: usize,
    live: usize,
    rng: SmallRng,
}

impl<T: Copy> SkipArena<T> {
    /// Creates an arena limited to [`DEFAULT_NODE_CAPACITY`] live nodes.
    pub fn new() -> Self {
        Self::with_capacity_limit(DEFAULT_NODE_CAPACITY)
    }

    /// Creates an arena that refuses to hold more than `limit` live nodes.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            free_nodes: Vec::new(),
            free_links: Default::default(),
            capacity: limit.min(HEAD as usize),
            live: 0,
            rng: SmallRng::seed_from_u64(LEVEL_SEED),
        }
    }

    /// Maximum number of live nodes.
    pub fn capacity_limit(&self) -> usize {
        self.capacity
    }

    /// Number of nodes currently owned by some set.
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    /// Draws a node level from a geometric distribution, capped at `cap`.
    pub(crate) fn random_level(&mut self, cap: usize) -> usize {
        let cap = cap.clamp(1, MAX_LEVEL);
        let mut level = 1;
        while level < cap && self.rng.random_ratio(LEVEL_NUMERATOR, LEVEL_DENOMINATOR) {
            level += 1;
        }
        level
    }

    /// Allocates a node of the given level. Nothing is modified on failure.
    pub(crate) fn allocate(&mut self, value: T, level: usize) -> DenoiseResult<u32> {
        debug_assert!((1..=MAX_LEVEL).contains(&level));
        if self.live >= self.capacity {
            return Err(DenoiseError::OutOfMemory {
                context: "skip-list node arena",
            });
        }

        let links = match self.free_links[level - 1].pop() {
            Some(offset) => offset,
            None => {
                self.links.try_reserve(level)?;
                let offset = self.links.len() as u32;
                self.links.resize(self.links.len() + level, END);
                offset
            }
        };
        let slot = NodeSlot {
            value,
            level: level as u8,
            links,
        };

        let node = match self.free_nodes.pop() {
            Some(node) => {
                self.nodes[node as usize] = slot;
                node
            }
            None => {
                if let Err(err) = self.nodes.try_reserve(1) {
                    self.free_links[level - 1].push(links);
                    return Err(err.into());
                }
                self.nodes.push(slot);
                (self.nodes.len() - 1) as u32
            }
        };
        for l in 0..level {
            self.links[links as usize + l] = END;
        }
        self.live += 1;
        Ok(node)
    }

    /// Returns a node to the free lists.
    pub(crate) fn release(&mut self, node: u32) {
        let slot = self.nodes[node as usize];
        self.free_links[slot.level as usize - 1].push(slot.links);
        self.free_nodes.push(node);
        self.live -= 1;
    }

    #[inline]
    pub(crate) fn value(&self, node: u32) -> &T {
        &self.nodes[node as usize].value
    }

    #[inline]
    pub(crate) fn value_mut(&mut self, node: u32) -> &mut T {
        &mut self.nodes[node as usize].value
    }

    #[inline]
    pub(crate) fn level(&self, node: u32) -> usize {
        self.nodes[node as usize].level as usize
    }

    #[inline]
    pub(crate) fn link(&self, node: u32, level: usize) -> u32 {
        let slot = &self.nodes[node as usize];
        debug_assert!(level < slot.level as usize);
        self.links[slot.links as usize + level]
    }

    #[inline]
    pub(crate) fn set_link(&mut self, node: u32, level: usize, target: u32) {
        let slot = self.nodes[node as usize];
        debug_assert!(level < slot.level as usize);
        self.links[slot.links as usize + level] = target;
    }
}

impl<T: Copy> Default for SkipArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{SkipArena, MAX_LEVEL};
    use crate::util::DenoiseError;

    #[test]
    fn levels_stay_within_cap() {
        let mut arena = SkipArena::<u32>::new();
        let mut seen_tall = false;
        for _ in 0..10_000 {
            let level = arena.random_level(MAX_LEVEL);
            assert!((1..=MAX_LEVEL).contains(&level));
            seen_tall |= level > 2;
            assert_eq!(arena.random_level(1), 1);
        }
        assert!(seen_tall);
    }

    #[test]
    fn released_nodes_are_reused() {
        let mut arena = SkipArena::<u32>::with_capacity_limit(2);
        let a = arena.allocate(1, 3).unwrap();
        let b = arena.allocate(2, 1).unwrap();
        assert_eq!(
            arena.allocate(3, 1),
            Err(DenoiseError::OutOfMemory {
                context: "skip-list node arena"
            })
        );
        arena.release(a);
        let c = arena.allocate(4, 3).unwrap();
        assert_eq!(c, a);
        assert_eq!(*arena.value(c), 4);
        assert_eq!(*arena.value(b), 2);
        assert_eq!(arena.live_nodes(), 2);
    }
}
