//! Low-level building blocks for custom search pipelines.
//!
//! These types expose the ordered sets, regions, reference pixels and search
//! structures the [`MotionSearcher`](crate::MotionSearcher) is built from.
//! Most users should prefer the top-level `Denoiser` and `MotionSearcher`.

pub use crate::candidate::topk::{Candidate, TopK};
pub use crate::denoiser::{PlaneEngine, PlaneGroup};
pub use crate::pixel::{PixelHandle, PixelPool, ReferenceFrame, ReferencePixel};
pub use crate::region::{
    priority_cmp, DenseRegion, Extent, ExtentArena, FloodFillControl, FloodFillWork,
    MotionVector, MovedRegion, Region, SparseRegion,
};
pub use crate::search::{CompletedRegionSink, ReferenceView, SearchBorder, SearchWindow};
pub use crate::set::{Comparator, OrderedSet, SkipArena};
