//! Scan-order machinery for the motion search.
//!
//! [`SearchWindow`] finds candidate motion vectors for the block under the
//! scan, and [`SearchBorder`] grows the moved regions those vectors describe.

pub mod border;
pub mod window;

pub use border::{CompletedRegionSink, SearchBorder};
pub use window::{ReferenceView, SearchWindow};
