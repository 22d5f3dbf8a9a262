//! Frame-side state: the catalog of frames the gateway knows about, the frame
//! currently being edited, and the SPN write rows attached to it.

pub mod active;
pub mod catalog;
pub mod spn_tracker;

pub use active::{
    ActiveFrameState, CreateFrameRequest, FrameHeader, FrameUpdate, HeaderField, HeaderInput,
};
pub use catalog::{CatalogPolicy, FrameCatalog, FrameSummary};
pub use spn_tracker::{ResolveOutcome, SpnEntry, SpnStatus, SpnTracker, SpnWrite};
