//! Best-K tracking for block matches.

use crate::region::MotionVector;
use std::cmp::Ordering;

/// One block match found in the search window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Displacement to the matching reference block.
    pub motion: MotionVector,
    /// Sum of per-sample differences over the block.
    pub sad: u32,
    /// Position in the window's scan order, for deterministic ties.
    pub order: u32,
}

fn candidate_cmp(a: &Candidate, b: &Candidate, prefer_shorter: bool) -> Ordering {
    let by_sad = a.sad.cmp(&b.sad);
    let by_length = if prefer_shorter {
        a.motion.squared_length().cmp(&b.motion.squared_length())
    } else {
        Ordering::Equal
    };
    by_sad.then(by_length).then_with(|| a.order.cmp(&b.order))
}

/// Keeps the `k` lowest-SAD candidates with O(k) insertion cost.
pub struct TopK {
    k: usize,
    prefer_shorter: bool,
    items: Vec<Candidate>,
}

impl TopK {
    /// Creates a collector. With `prefer_shorter`, equal SADs are ranked by
    /// motion-vector length before scan order.
    pub fn new(k: usize, prefer_shorter: bool) -> Self {
        Self {
            k,
            prefer_shorter,
            items: Vec::with_capacity(k),
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pushes a candidate, evicting the worst one if at capacity and the new
    /// one ranks strictly better.
    pub fn push(&mut self, candidate: Candidate) {
        if self.k == 0 {
            return;
        }
        if self.items.len() < self.k {
            self.items.push(candidate);
            return;
        }

        let prefer_shorter = self.prefer_shorter;
        let mut worst_idx = 0usize;
        for (idx, item) in self.items.iter().enumerate().skip(1) {
            if candidate_cmp(item, &self.items[worst_idx], prefer_shorter) == Ordering::Greater {
                worst_idx = idx;
            }
        }

        if candidate_cmp(&candidate, &self.items[worst_idx], prefer_shorter) == Ordering::Less {
            self.items[worst_idx] = candidate;
        }
    }

    /// Sorts the kept candidates best first and returns them.
    pub fn sorted(&mut self) -> &[Candidate] {
        let prefer_shorter = self.prefer_shorter;
        self.items
            .sort_by(|a, b| candidate_cmp(a, b, prefer_shorter));
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::{Candidate, TopK};
    use crate::region::MotionVector;

    fn candidate(dx: i32, dy: i32, sad: u32, order: u32) -> Candidate {
        Candidate {
            motion: MotionVector::new(dx, dy),
            sad,
            order,
        }
    }

    #[test]
    fn keeps_lowest_sads() {
        let mut topk = TopK::new(2, true);
        topk.push(candidate(1, 0, 9, 0));
        topk.push(candidate(2, 0, 3, 1));
        topk.push(candidate(3, 0, 5, 2));
        topk.push(candidate(4, 0, 7, 3));
        let kept: Vec<u32> = topk.sorted().iter().map(|c| c.sad).collect();
        assert_eq!(kept, vec![3, 5]);
    }

    #[test]
    fn equal_sads_prefer_short_vectors() {
        let mut topk = TopK::new(1, true);
        topk.push(candidate(-3, 0, 4, 0));
        topk.push(candidate(1, 1, 4, 1));
        assert_eq!(topk.sorted()[0].motion, MotionVector::new(1, 1));

        let mut by_order = TopK::new(1, false);
        by_order.push(candidate(-3, 0, 4, 0));
        by_order.push(candidate(1, 1, 4, 1));
        assert_eq!(by_order.sorted()[0].motion, MotionVector::new(-3, 0));
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut topk = TopK::new(0, true);
        topk.push(candidate(0, 0, 0, 0));
        assert!(topk.is_empty());
    }
}
