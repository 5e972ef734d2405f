//! Ranking of block-match candidates.

pub(crate) mod topk;
