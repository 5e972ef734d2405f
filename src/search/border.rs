//! Incremental tracking of moved regions along the scan.
//!
//! Every region under construction leaves behind boundary markers: one
//! horizontal span per scan line it touches, for the lines of the current
//! block row plus the line just above it. Markers are indexed twice by
//! position (by start and by end, so sliding the scan one pixel only looks at
//! markers whose start or end equals the new threshold) and once by motion
//! vector for the markers that currently touch the scan block ("active").
//! A new match therefore finds the regions it extends with one ordered-set
//! lookup instead of testing every region.
//!
//! Regions live in an arena of nodes merged by union-find. The root of each
//! set owns the region contents, the motion vector and a linked list of its
//! live markers; a root left with no markers can no longer grow and is handed
//! to a [`CompletedRegionSink`].

use crate::region::{priority_cmp, Extent, ExtentArena, MotionVector, MovedRegion, Region, SparseRegion};
use crate::set::{Comparator, OrderedSet, SkipArena};
use crate::util::{DenoiseError, DenoiseResult};
use std::cmp::Ordering;

/// Receives regions that left the search border.
pub trait CompletedRegionSink {
    fn on_completed_region(
        &mut self,
        arena: &mut ExtentArena,
        region: MovedRegion,
    ) -> DenoiseResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MarkerKey {
    line: i32,
    index: i32,
    motion: MotionVector,
    id: u32,
}

/// Orders markers by scan line, then position.
#[derive(Clone, Copy, Default)]
struct ByLine;

impl Comparator<MarkerKey> for ByLine {
    fn compare(&self, a: &MarkerKey, b: &MarkerKey) -> Ordering {
        (a.line, a.index, a.id).cmp(&(b.line, b.index, b.id))
    }
}

/// Orders markers by motion vector, then position.
#[derive(Clone, Copy, Default)]
struct ByMotion;

impl Comparator<MarkerKey> for ByMotion {
    fn compare(&self, a: &MarkerKey, b: &MarkerKey) -> Ordering {
        (a.motion, a.index, a.line, a.id).cmp(&(b.motion, b.index, b.line, b.id))
    }
}

const NIL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct Marker {
    line: i32,
    start: i32,
    end: i32,
    node: u32,
    motion: MotionVector,
    active: bool,
    prev: u32,
    next: u32,
}

impl Marker {
    fn start_key(&self, id: u32) -> MarkerKey {
        MarkerKey {
            line: self.line,
            index: self.start,
            motion: self.motion,
            id,
        }
    }

    fn end_key(&self, id: u32) -> MarkerKey {
        MarkerKey {
            line: self.line,
            index: self.end,
            motion: self.motion,
            id,
        }
    }
}

struct RegionNode {
    parent: u32,
    markers: u32,
    head: u32,
    tail: u32,
    region: SparseRegion,
    motion: MotionVector,
}

/// Moved regions under construction near the scan position.
pub struct SearchBorder {
    group_width: i32,
    group_height: i32,
    x: i32,
    y: i32,
    keys: SkipArena<MarkerKey>,
    starts: OrderedSet<MarkerKey, ByLine>,
    ends: OrderedSet<MarkerKey, ByLine>,
    active: OrderedSet<MarkerKey, ByMotion>,
    markers: Vec<Marker>,
    free_markers: Vec<u32>,
    nodes: Vec<RegionNode>,
    found: Vec<u32>,
    spans: Vec<Option<(i32, i32)>>,
    roots: Vec<u32>,
}

fn line_probe(line: i32, index: i32) -> MarkerKey {
    MarkerKey {
        line,
        index,
        motion: MotionVector::ZERO,
        id: 0,
    }
}

impl SearchBorder {
    /// Creates a border for blocks of `group_width x group_height` pixels.
    pub fn new(group_width: usize, group_height: usize) -> Self {
        Self {
            group_width: group_width as i32,
            group_height: group_height as i32,
            x: 0,
            y: 0,
            keys: SkipArena::new(),
            starts: OrderedSet::new(),
            ends: OrderedSet::new(),
            active: OrderedSet::new(),
            markers: Vec::new(),
            free_markers: Vec::new(),
            nodes: Vec::new(),
            found: Vec::new(),
            spans: vec![None; group_height + 1],
            roots: Vec::new(),
        }
    }

    /// Current block position.
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Number of boundary markers touching the current block.
    pub fn number_of_active_regions(&self) -> usize {
        self.active.len()
    }

    /// Appends the distinct motion vectors of the active markers to `out`.
    pub fn active_motions(&self, out: &mut Vec<MotionVector>) {
        for key in self.active.iter(&self.keys) {
            if out.last() != Some(&key.motion) {
                out.push(key.motion);
            }
        }
    }

    /// Begins a frame with no regions, at block `(0, 0)`.
    pub fn start_frame(&mut self, arena: &mut ExtentArena) {
        self.starts.clear(&mut self.keys);
        self.ends.clear(&mut self.keys);
        self.active.clear(&mut self.keys);
        self.markers.clear();
        self.free_markers.clear();
        for node in &mut self.nodes {
            node.region.clear(arena);
        }
        self.nodes.clear();
        self.x = 0;
        self.y = 0;
    }

    fn find(&mut self, mut node: u32) -> u32 {
        while self.nodes[node as usize].parent != node {
            let parent = self.nodes[node as usize].parent;
            let grandparent = self.nodes[parent as usize].parent;
            self.nodes[node as usize].parent = grandparent;
            node = grandparent;
        }
        node
    }

    /// Merges two roots, keeping the larger region's storage.
    fn union(&mut self, arena: &mut ExtentArena, a: u32, b: u32) -> DenoiseResult<u32> {
        let (keep, fold) = if self.nodes[a as usize].region.number_of_points()
            >= self.nodes[b as usize].region.number_of_points()
        {
            (a, b)
        } else {
            (b, a)
        };
        let mut folded = std::mem::take(&mut self.nodes[fold as usize].region);
        let markers = std::mem::take(&mut self.nodes[fold as usize].markers);
        let (head, tail) = {
            let node = &mut self.nodes[fold as usize];
            node.parent = keep;
            (
                std::mem::replace(&mut node.head, NIL),
                std::mem::replace(&mut node.tail, NIL),
            )
        };
        if head != NIL {
            let keep_tail = self.nodes[keep as usize].tail;
            if keep_tail == NIL {
                self.nodes[keep as usize].head = head;
            } else {
                self.markers[keep_tail as usize].next = head;
                self.markers[head as usize].prev = keep_tail;
            }
            self.nodes[keep as usize].tail = tail;
        }
        let root = &mut self.nodes[keep as usize];
        root.markers += markers;
        root.region.merge_from(arena, &mut folded)?;
        Ok(keep)
    }

    fn is_active(&self, marker: &Marker) -> bool {
        let right = self.x + self.group_width;
        if marker.line == self.y - 1 {
            marker.start < right && marker.end > self.x
        } else {
            marker.start <= right && marker.end >= self.x
        }
    }

    fn set_active(&mut self, id: u32, active: bool) -> DenoiseResult<()> {
        let marker = self.markers[id as usize];
        if marker.active == active {
            return Ok(());
        }
        let key = marker.start_key(id);
        if active {
            self.active.insert(&mut self.keys, key)?;
        } else {
            self.active.erase_key(&mut self.keys, &key)?;
        }
        self.markers[id as usize].active = active;
        Ok(())
    }

    fn add_marker(
        &mut self,
        line: i32,
        (start, end): (i32, i32),
        root: u32,
        motion: MotionVector,
    ) -> DenoiseResult<()> {
        let marker = Marker {
            line,
            start,
            end,
            node: root,
            motion,
            active: false,
            prev: NIL,
            next: self.nodes[root as usize].head,
        };
        let id = match self.free_markers.pop() {
            Some(id) => {
                self.markers[id as usize] = marker;
                id
            }
            None => {
                self.markers.push(marker);
                (self.markers.len() - 1) as u32
            }
        };
        self.starts.insert(&mut self.keys, marker.start_key(id))?;
        self.ends.insert(&mut self.keys, marker.end_key(id))?;
        let active = self.is_active(&marker);
        self.set_active(id, active)?;
        match marker.next {
            NIL => self.nodes[root as usize].tail = id,
            head => self.markers[head as usize].prev = id,
        }
        let node = &mut self.nodes[root as usize];
        node.head = id;
        node.markers += 1;
        Ok(())
    }

    /// Drops a marker and returns the root of its region.
    fn remove_marker(&mut self, id: u32) -> DenoiseResult<u32> {
        self.set_active(id, false)?;
        let marker = self.markers[id as usize];
        self.starts.erase_key(&mut self.keys, &marker.start_key(id))?;
        self.ends.erase_key(&mut self.keys, &marker.end_key(id))?;
        self.free_markers.push(id);

        let root = self.find(marker.node);
        if marker.prev == NIL {
            self.nodes[root as usize].head = marker.next;
        } else {
            self.markers[marker.prev as usize].next = marker.next;
        }
        if marker.next == NIL {
            self.nodes[root as usize].tail = marker.prev;
        } else {
            self.markers[marker.next as usize].prev = marker.prev;
        }
        let node = &mut self.nodes[root as usize];
        node.markers = node
            .markers
            .checked_sub(1)
            .ok_or(DenoiseError::InvariantViolation("border marker count underflow"))?;
        Ok(root)
    }

    fn take_region(&mut self, root: u32) -> MovedRegion {
        let node = &mut self.nodes[root as usize];
        MovedRegion::new(std::mem::take(&mut node.region), node.motion)
    }

    /// Collects ids of markers on `line` whose `index` (start or end) equals
    /// `index`, or all markers on the line when `index` is `None`.
    fn markers_at(&mut self, by_end: bool, line: i32, index: Option<i32>) -> Vec<u32> {
        let mut ids = std::mem::take(&mut self.found);
        ids.clear();
        let set = if by_end { &self.ends } else { &self.starts };
        let probe = line_probe(line, index.unwrap_or(i32::MIN));
        let mut cursor = set.lower_bound(&self.keys, &probe);
        while let Some(current) = cursor {
            let key = set.get(&self.keys, current);
            if key.line != line || index.is_some_and(|i| key.index != i) {
                break;
            }
            ids.push(key.id);
            cursor = set.next(&self.keys, current);
        }
        ids
    }

    /// Re-evaluates activity for markers found by [`Self::markers_at`].
    fn refresh(&mut self, by_end: bool, line: i32, index: Option<i32>) -> DenoiseResult<()> {
        let ids = self.markers_at(by_end, line, index);
        let mut result = Ok(());
        for &id in &ids {
            let active = self.is_active(&self.markers[id as usize]);
            result = self.set_active(id, active);
            if result.is_err() {
                break;
            }
        }
        self.found = ids;
        result
    }

    /// Adds the current block to the region moving by `motion`, merging every
    /// active region with the same vector. Returns the region's point count.
    pub fn add_new_match(
        &mut self,
        arena: &mut ExtentArena,
        motion: MotionVector,
    ) -> DenoiseResult<u64> {
        let (x, y) = (self.x, self.y);
        let gw = self.group_width;

        let mut spans = std::mem::take(&mut self.spans);
        spans[0] = None;
        for span in spans.iter_mut().skip(1) {
            *span = Some((x, x + gw));
        }

        let mut found = std::mem::take(&mut self.found);
        found.clear();
        let probe = MarkerKey {
            line: i32::MIN,
            index: i32::MIN,
            motion,
            id: 0,
        };
        let mut cursor = self.active.lower_bound(&self.keys, &probe);
        while let Some(current) = cursor {
            let key = self.active.get(&self.keys, current);
            if key.motion != motion {
                break;
            }
            found.push(key.id);
            cursor = self.active.next(&self.keys, current);
        }

        for &id in &found {
            let marker = &self.markers[id as usize];
            let line = (marker.line - (y - 1)) as usize;
            spans[line] = Some(match spans[line] {
                Some((start, end)) => (start.min(marker.start), end.max(marker.end)),
                None => (marker.start, marker.end),
            });
        }

        let result = self.merge_match(arena, motion, &found, &spans);
        self.found = found;
        self.spans = spans;
        result
    }

    fn merge_match(
        &mut self,
        arena: &mut ExtentArena,
        motion: MotionVector,
        found: &[u32],
        spans: &[Option<(i32, i32)>],
    ) -> DenoiseResult<u64> {
        let root = match found.split_first() {
            None => {
                let id = self.nodes.len() as u32;
                self.nodes.push(RegionNode {
                    parent: id,
                    markers: 0,
                    head: NIL,
                    tail: NIL,
                    region: SparseRegion::new(),
                    motion,
                });
                id
            }
            Some((&first, rest)) => {
                let mut root = self.find(self.markers[first as usize].node);
                for &id in rest {
                    let other = self.find(self.markers[id as usize].node);
                    if other != root {
                        root = self.union(arena, root, other)?;
                    }
                }
                root
            }
        };

        for &id in found {
            self.remove_marker(id)?;
        }

        let (x, y) = (self.x, self.y);
        for line in y..y + self.group_height {
            self.nodes[root as usize]
                .region
                .union_extent(arena, Extent::new(line, x, x + self.group_width))?;
        }

        for (offset, span) in spans.iter().enumerate() {
            if let Some(span) = *span {
                self.add_marker(y - 1 + offset as i32, span, root, motion)?;
            }
        }
        Ok(self.nodes[root as usize].region.number_of_points())
    }

    /// Slides the scan one block to the right.
    pub fn move_right(&mut self) -> DenoiseResult<()> {
        let old_x = self.x;
        self.x += 1;
        let gw = self.group_width;
        let last = self.y - 1;
        for line in last..self.y + self.group_height {
            let own = line != last;
            let leaving = if own { old_x } else { self.x };
            self.refresh(true, line, Some(leaving))?;
            let entering = if own { self.x + gw } else { self.x + gw - 1 };
            self.refresh(false, line, Some(entering))?;
        }
        Ok(())
    }

    /// Slides the scan one block to the left.
    pub fn move_left(&mut self) -> DenoiseResult<()> {
        let old_x = self.x;
        self.x -= 1;
        let gw = self.group_width;
        let last = self.y - 1;
        for line in last..self.y + self.group_height {
            let own = line != last;
            let leaving = if own { old_x + gw } else { old_x + gw - 1 };
            self.refresh(false, line, Some(leaving))?;
            let entering = if own { self.x } else { old_x };
            self.refresh(true, line, Some(entering))?;
        }
        Ok(())
    }

    /// Moves the scan one line down. Markers on the line that falls behind are
    /// dropped, and regions left without markers go to `sink`.
    pub fn move_down<S: CompletedRegionSink>(
        &mut self,
        arena: &mut ExtentArena,
        sink: &mut S,
    ) -> DenoiseResult<()> {
        let ids = self.markers_at(false, self.y - 1, None);
        let mut result = Ok(());
        for &id in &ids {
            result = self.drop_marker(arena, sink, id);
            if result.is_err() {
                break;
            }
        }
        self.found = ids;
        result?;

        self.y += 1;
        // The first block line becomes the trailing line, where merely
        // touching the block no longer counts.
        self.refresh(false, self.y - 1, None)
    }

    fn drop_marker<S: CompletedRegionSink>(
        &mut self,
        arena: &mut ExtentArena,
        sink: &mut S,
        id: u32,
    ) -> DenoiseResult<()> {
        let root = self.remove_marker(id)?;
        if self.nodes[root as usize].markers == 0 {
            let region = self.take_region(root);
            sink.on_completed_region(arena, region)?;
        }
        Ok(())
    }

    /// Keeps the best region touching the current block and removes every
    /// other touching region from the border.
    ///
    /// The best region has the most points, then the shortest motion vector.
    /// The others go to `sink` so their points can still be claimed later.
    pub fn choose_best_active_region<S: CompletedRegionSink>(
        &mut self,
        arena: &mut ExtentArena,
        sink: &mut S,
    ) -> DenoiseResult<Option<MovedRegion>> {
        let mut roots = std::mem::take(&mut self.roots);
        roots.clear();
        let active: Vec<u32> = self.active.iter(&self.keys).map(|key| key.id).collect();
        for id in active {
            let root = self.find(self.markers[id as usize].node);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        let result = self.detach_roots(arena, sink, &roots);
        self.roots = roots;
        result
    }

    fn detach_roots<S: CompletedRegionSink>(
        &mut self,
        arena: &mut ExtentArena,
        sink: &mut S,
        roots: &[u32],
    ) -> DenoiseResult<Option<MovedRegion>> {
        let Some(mut best) = roots.first().copied() else {
            return Ok(None);
        };
        for &root in &roots[1..] {
            let candidate = &self.nodes[root as usize];
            let current = &self.nodes[best as usize];
            if priority_cmp(
                candidate.region.number_of_points(),
                candidate.motion,
                current.region.number_of_points(),
                current.motion,
            ) == Ordering::Less
            {
                best = root;
            }
        }

        for &root in roots {
            while self.nodes[root as usize].head != NIL {
                self.remove_marker(self.nodes[root as usize].head)?;
            }
        }

        let mut survivor = None;
        for &root in roots {
            let region = self.take_region(root);
            if root == best {
                survivor = Some(region);
            } else {
                sink.on_completed_region(arena, region)?;
            }
        }
        Ok(survivor)
    }

    /// Flushes every remaining region to `sink` and empties the border.
    pub fn finish_frame<S: CompletedRegionSink>(
        &mut self,
        arena: &mut ExtentArena,
        sink: &mut S,
    ) -> DenoiseResult<()> {
        for _ in 0..=self.group_height {
            self.move_down(arena, sink)?;
        }
        if !self.starts.is_empty() || !self.ends.is_empty() || !self.active.is_empty() {
            return Err(DenoiseError::InvariantViolation(
                "border markers survived the end of the frame",
            ));
        }
        self.start_frame(arena);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CompletedRegionSink, SearchBorder};
    use crate::region::{Extent, ExtentArena, MotionVector, MovedRegion, Region};
    use crate::util::DenoiseResult;

    #[derive(Default)]
    struct Collect {
        regions: Vec<(u64, MotionVector)>,
    }

    impl CompletedRegionSink for Collect {
        fn on_completed_region(
            &mut self,
            arena: &mut ExtentArena,
            mut region: MovedRegion,
        ) -> DenoiseResult<()> {
            self.regions
                .push((region.number_of_points(), region.motion));
            region.clear(arena);
            Ok(())
        }
    }

    const RIGHT: MotionVector = MotionVector::new(1, 0);
    const DOWN: MotionVector = MotionVector::new(0, 2);

    #[test]
    fn overlapping_blocks_with_one_vector_grow_one_region() {
        let mut arena = ExtentArena::new();
        let mut border = SearchBorder::new(4, 2);
        border.start_frame(&mut arena);
        assert_eq!(border.add_new_match(&mut arena, RIGHT).unwrap(), 8);
        border.move_right().unwrap();
        assert_eq!(border.add_new_match(&mut arena, RIGHT).unwrap(), 10);
        assert_eq!(border.add_new_match(&mut arena, DOWN).unwrap(), 8);

        let mut sink = Collect::default();
        let best = border
            .choose_best_active_region(&mut arena, &mut sink)
            .unwrap()
            .unwrap();
        assert_eq!(best.motion, RIGHT);
        let extents: Vec<Extent> = best.region.extents(&arena).collect();
        assert_eq!(extents, vec![Extent::new(0, 0, 5), Extent::new(1, 0, 5)]);
        assert_eq!(sink.regions, vec![(8, DOWN)]);
        assert_eq!(border.number_of_active_regions(), 0);
    }

    #[test]
    fn regions_continue_onto_the_next_line() {
        let mut arena = ExtentArena::new();
        let mut sink = Collect::default();
        let mut border = SearchBorder::new(4, 2);
        border.start_frame(&mut arena);
        border.add_new_match(&mut arena, RIGHT).unwrap();
        border.move_down(&mut arena, &mut sink).unwrap();
        assert!(border.number_of_active_regions() > 0);
        assert_eq!(border.add_new_match(&mut arena, RIGHT).unwrap(), 12);
        assert!(sink.regions.is_empty());
    }

    #[test]
    fn regions_complete_when_the_scan_leaves_them() {
        let mut arena = ExtentArena::new();
        let mut sink = Collect::default();
        let mut border = SearchBorder::new(4, 2);
        border.start_frame(&mut arena);
        border.add_new_match(&mut arena, RIGHT).unwrap();
        border.move_down(&mut arena, &mut sink).unwrap();
        border.move_down(&mut arena, &mut sink).unwrap();
        assert!(sink.regions.is_empty());
        border.move_down(&mut arena, &mut sink).unwrap();
        assert_eq!(sink.regions, vec![(8, RIGHT)]);
    }

    #[test]
    fn sliding_away_deactivates_markers() {
        let mut arena = ExtentArena::new();
        let mut sink = Collect::default();
        let mut border = SearchBorder::new(2, 2);
        border.start_frame(&mut arena);
        border.add_new_match(&mut arena, RIGHT).unwrap();
        border.move_right().unwrap();
        border.move_right().unwrap();
        // Touching on the right edge still counts on block lines.
        assert_eq!(border.number_of_active_regions(), 2);
        border.move_right().unwrap();
        assert_eq!(border.number_of_active_regions(), 0);
        border.move_left().unwrap();
        assert_eq!(border.number_of_active_regions(), 2);
        // A fresh match here is contiguous with the first block.
        assert_eq!(border.add_new_match(&mut arena, RIGHT).unwrap(), 8);
        border.finish_frame(&mut arena, &mut sink).unwrap();
        assert_eq!(sink.regions, vec![(8, RIGHT)]);
    }

    #[test]
    fn losing_regions_leave_with_their_inactive_markers() {
        let mut arena = ExtentArena::new();
        let mut sink = Collect::default();
        let mut border = SearchBorder::new(2, 2);
        border.start_frame(&mut arena);
        border.add_new_match(&mut arena, DOWN).unwrap();
        border.move_down(&mut arena, &mut sink).unwrap();
        for _ in 0..4 {
            border.move_right().unwrap();
        }
        border.add_new_match(&mut arena, RIGHT).unwrap();
        border.move_left().unwrap();
        border.move_left().unwrap();

        // Both regions touch the block; the first one's trailing marker does not.
        let mut best = border
            .choose_best_active_region(&mut arena, &mut sink)
            .unwrap()
            .unwrap();
        assert_eq!(best.motion, RIGHT);
        assert_eq!(best.number_of_points(), 4);
        assert_eq!(sink.regions, vec![(4, DOWN)]);
        assert_eq!(border.number_of_active_regions(), 0);

        border.finish_frame(&mut arena, &mut sink).unwrap();
        assert_eq!(sink.regions, vec![(4, DOWN)]);
        best.clear(&mut arena);
        assert_eq!(arena.live_nodes(), 0);
    }

    #[test]
    fn finish_frame_flushes_everything() {
        let mut arena = ExtentArena::new();
        let mut sink = Collect::default();
        let mut border = SearchBorder::new(2, 2);
        border.start_frame(&mut arena);
        border.add_new_match(&mut arena, RIGHT).unwrap();
        for _ in 0..4 {
            border.move_right().unwrap();
        }
        border.add_new_match(&mut arena, DOWN).unwrap();
        border.finish_frame(&mut arena, &mut sink).unwrap();
        sink.regions.sort_by_key(|(_, motion)| *motion);
        assert_eq!(sink.regions, vec![(4, DOWN), (4, RIGHT)]);
        assert_eq!(arena.live_nodes(), 0);
    }
}
