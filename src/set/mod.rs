//! Ordered sets backed by skip lists.
//!
//! An [`OrderedSet`] keeps unique keys sorted under a [`Comparator`] and stores its
//! nodes in a caller-owned [`SkipArena`]. The set itself only holds the head
//! links, so creating and moving sets is cheap; every operation takes the arena
//! explicitly. Searches remember the predecessor path of the previous query and
//! resume from it, which makes runs of nearby lookups close to O(1).
//!
//! Sets must always be used with the arena their nodes came from. Clearing a
//! set returns its nodes to the arena; dropping it without clearing leaves them
//! allocated until the arena itself is dropped.

mod arena;

pub use arena::{SkipArena, DEFAULT_NODE_CAPACITY, MAX_LEVEL};

use crate::util::{DenoiseError, DenoiseResult};
use arena::{END, HEAD};
use std::cell::Cell;
use std::cmp::Ordering;
use std::marker::PhantomData;

/// Total order used by an [`OrderedSet`].
pub trait Comparator<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders keys by their `Ord` implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Natural;

impl<T: Ord> Comparator<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Position of an element inside an [`OrderedSet`].
///
/// A cursor stays valid until its element is erased or moved to another set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cursor(u32);

/// Sorted set of unique keys stored in a [`SkipArena`].
pub struct OrderedSet<T, C = Natural> {
    head: [u32; MAX_LEVEL],
    level: usize,
    len: usize,
    finger: Cell<[u32; MAX_LEVEL]>,
    comparator: C,
    _marker: PhantomData<T>,
}

type Path = [u32; MAX_LEVEL];

impl<T: Copy, C: Comparator<T> + Default> OrderedSet<T, C> {
    /// Creates an empty set using the comparator's default value.
    pub fn new() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<T: Copy, C: Comparator<T> + Default> Default for OrderedSet<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, C: Comparator<T>> OrderedSet<T, C> {
    /// Creates an empty set ordered by `comparator`.
    pub fn with_comparator(comparator: C) -> Self {
        Self {
            head: [END; MAX_LEVEL],
            level: 1,
            len: 0,
            finger: Cell::new([HEAD; MAX_LEVEL]),
            comparator,
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn less(&self, a: &T, b: &T) -> bool {
        self.comparator.compare(a, b) == Ordering::Less
    }

    #[inline]
    fn equal(&self, a: &T, b: &T) -> bool {
        self.comparator.compare(a, b) == Ordering::Equal
    }

    #[inline]
    fn next_at(&self, arena: &SkipArena<T>, at: u32, level: usize) -> u32 {
        if at == HEAD {
            self.head[level]
        } else {
            arena.link(at, level)
        }
    }

    #[inline]
    fn set_next_at(&mut self, arena: &mut SkipArena<T>, at: u32, level: usize, target: u32) {
        if at == HEAD {
            self.head[level] = target;
        } else {
            arena.set_link(at, level, target);
        }
    }

    /// Finds, for every level, the last node whose key is less than `key`.
    ///
    /// Levels where the previous search path still brackets `key` are reused
    /// as-is; the first level where it does not is resumed from the finger
    /// node when that node still precedes `key`.
    fn search_lower(&self, arena: &SkipArena<T>, key: &T) -> Path {
        let finger = self.finger.get();
        let mut path = [HEAD; MAX_LEVEL];
        let mut current = HEAD;
        let mut reuse = true;

        for level in (0..self.level).rev() {
            if reuse {
                let start = finger[level];
                if start == HEAD || self.less(arena.value(start), key) {
                    let next = self.next_at(arena, start, level);
                    if next == END || !self.less(arena.value(next), key) {
                        path[level] = start;
                        current = start;
                        continue;
                    }
                    current = start;
                }
                reuse = false;
            }
            loop {
                let next = self.next_at(arena, current, level);
                if next != END && self.less(arena.value(next), key) {
                    current = next;
                } else {
                    break;
                }
            }
            path[level] = current;
        }

        self.finger.set(path);
        path
    }

    /// Returns the key stored at `cursor`.
    #[inline]
    pub fn get<'a>(&self, arena: &'a SkipArena<T>, cursor: Cursor) -> &'a T {
        arena.value(cursor.0)
    }

    /// First element, if any.
    pub fn first(&self) -> Option<Cursor> {
        (self.head[0] != END).then_some(Cursor(self.head[0]))
    }

    /// Last element, if any.
    pub fn last(&self, arena: &SkipArena<T>) -> Option<Cursor> {
        let mut current = HEAD;
        for level in (0..self.level).rev() {
            loop {
                let next = self.next_at(arena, current, level);
                if next == END {
                    break;
                }
                current = next;
            }
        }
        (current != HEAD).then_some(Cursor(current))
    }

    /// Element following `cursor`.
    #[inline]
    pub fn next(&self, arena: &SkipArena<T>, cursor: Cursor) -> Option<Cursor> {
        let next = arena.link(cursor.0, 0);
        (next != END).then_some(Cursor(next))
    }

    /// First element not less than `key`.
    pub fn lower_bound(&self, arena: &SkipArena<T>, key: &T) -> Option<Cursor> {
        let path = self.search_lower(arena, key);
        let next = self.next_at(arena, path[0], 0);
        (next != END).then_some(Cursor(next))
    }

    /// First element greater than `key`.
    pub fn upper_bound(&self, arena: &SkipArena<T>, key: &T) -> Option<Cursor> {
        let cursor = self.lower_bound(arena, key)?;
        if self.equal(arena.value(cursor.0), key) {
            self.next(arena, cursor)
        } else {
            Some(cursor)
        }
    }

    /// Last element less than `key`.
    pub fn predecessor(&self, arena: &SkipArena<T>, key: &T) -> Option<Cursor> {
        let path = self.search_lower(arena, key);
        (path[0] != HEAD).then_some(Cursor(path[0]))
    }

    /// Element equal to `key`.
    pub fn find(&self, arena: &SkipArena<T>, key: &T) -> Option<Cursor> {
        let cursor = self.lower_bound(arena, key)?;
        self.equal(arena.value(cursor.0), key).then_some(cursor)
    }

    /// Inserts `value` unless an equal key is present.
    ///
    /// Returns the element's cursor and whether it was newly inserted. On an
    /// allocation failure the set is left untouched.
    pub fn insert(&mut self, arena: &mut SkipArena<T>, value: T) -> DenoiseResult<(Cursor, bool)> {
        let path = self.search_lower(arena, &value);
        let next = self.next_at(arena, path[0], 0);
        if next != END && self.equal(arena.value(next), &value) {
            return Ok((Cursor(next), false));
        }

        let level = arena.random_level(self.level + 1);
        let node = arena.allocate(value, level)?;
        self.link_node(arena, node, path);
        Ok((Cursor(node), true))
    }

    fn link_node(&mut self, arena: &mut SkipArena<T>, node: u32, mut path: Path) {
        let level = arena.level(node);
        if level > self.level {
            for slot in path.iter_mut().take(level).skip(self.level) {
                *slot = HEAD;
            }
            self.level = level;
        }
        for l in 0..level {
            let succ = self.next_at(arena, path[l], l);
            arena.set_link(node, l, succ);
            self.set_next_at(arena, path[l], l, node);
        }
        self.len += 1;
        self.finger.set(path);
    }

    fn unlink_node(&mut self, arena: &mut SkipArena<T>, node: u32) -> DenoiseResult<()> {
        let key = *arena.value(node);
        let path = self.search_lower(arena, &key);
        if self.next_at(arena, path[0], 0) != node {
            return Err(DenoiseError::InvariantViolation(
                "cursor does not belong to this set",
            ));
        }
        for l in 0..arena.level(node) {
            if self.next_at(arena, path[l], l) == node {
                let succ = arena.link(node, l);
                self.set_next_at(arena, path[l], l, succ);
            }
        }
        while self.level > 1 && self.head[self.level - 1] == END {
            self.level -= 1;
        }
        self.len -= 1;
        self.finger.set(path);
        Ok(())
    }

    /// Removes the element at `cursor` and returns the element after it.
    pub fn erase(&mut self, arena: &mut SkipArena<T>, cursor: Cursor) -> DenoiseResult<Option<Cursor>> {
        let next = self.next(arena, cursor);
        self.unlink_node(arena, cursor.0)?;
        arena.release(cursor.0);
        Ok(next)
    }

    /// Removes the element equal to `key`; returns whether one was present.
    pub fn erase_key(&mut self, arena: &mut SkipArena<T>, key: &T) -> DenoiseResult<bool> {
        match self.find(arena, key) {
            Some(cursor) => {
                self.erase(arena, cursor)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replaces the key at `cursor` in place.
    ///
    /// The new key must sort to the same position as the old one.
    pub fn replace(&mut self, arena: &mut SkipArena<T>, cursor: Cursor, value: T) {
        debug_assert!(self
            .next(arena, cursor)
            .map_or(true, |next| self.less(&value, arena.value(next.0))));
        *arena.value_mut(cursor.0) = value;
    }

    /// Moves the node at `cursor` out of `other` and into `self` without
    /// reallocating it. Fails if `self` already holds an equal key.
    pub fn move_from(
        &mut self,
        arena: &mut SkipArena<T>,
        other: &mut Self,
        cursor: Cursor,
    ) -> DenoiseResult<Cursor> {
        let key = *arena.value(cursor.0);
        let path = self.search_lower(arena, &key);
        let next = self.next_at(arena, path[0], 0);
        if next != END && self.equal(arena.value(next), &key) {
            return Err(DenoiseError::InvariantViolation(
                "moved key already present in destination set",
            ));
        }
        other.unlink_node(arena, cursor.0)?;
        self.link_node(arena, cursor.0, path);
        Ok(cursor)
    }

    /// Moves the elements of `other` from `first` up to, not including, `end`
    /// into `self`. Returns how many were moved.
    pub fn move_range(
        &mut self,
        arena: &mut SkipArena<T>,
        other: &mut Self,
        first: Cursor,
        end: Option<Cursor>,
    ) -> DenoiseResult<usize> {
        let mut moved = 0;
        let mut cursor = Some(first);
        while let Some(current) = cursor {
            if Some(current) == end {
                break;
            }
            cursor = other.next(arena, current);
            self.move_from(arena, other, current)?;
            moved += 1;
        }
        Ok(moved)
    }

    /// Moves every element of `other` into `self`. Constant time when `self` is
    /// empty.
    pub fn move_all(&mut self, arena: &mut SkipArena<T>, other: &mut Self) -> DenoiseResult<()> {
        if self.is_empty() {
            std::mem::swap(&mut self.head, &mut other.head);
            std::mem::swap(&mut self.level, &mut other.level);
            std::mem::swap(&mut self.len, &mut other.len);
            self.finger.set([HEAD; MAX_LEVEL]);
            other.finger.set([HEAD; MAX_LEVEL]);
            return Ok(());
        }
        if let Some(first) = other.first() {
            self.move_range(arena, other, first, None)?;
        }
        Ok(())
    }

    /// Removes every element, returning the nodes to the arena.
    pub fn clear(&mut self, arena: &mut SkipArena<T>) {
        let mut node = self.head[0];
        while node != END {
            let next = arena.link(node, 0);
            arena.release(node);
            node = next;
        }
        self.head = [END; MAX_LEVEL];
        self.level = 1;
        self.len = 0;
        self.finger.set([HEAD; MAX_LEVEL]);
    }

    /// Iterates over the keys in order.
    pub fn iter<'a>(&'a self, arena: &'a SkipArena<T>) -> Iter<'a, T> {
        Iter {
            arena,
            node: self.head[0],
        }
    }
}

/// In-order iterator over an [`OrderedSet`].
pub struct Iter<'a, T> {
    arena: &'a SkipArena<T>,
    node: u32,
}

impl<'a, T: Copy> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.node == END {
            return None;
        }
        let value = self.arena.value(self.node);
        self.node = self.arena.link(self.node, 0);
        Some(value)
    }
}
