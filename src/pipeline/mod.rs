//! Two-phase upload orchestration.
//!
//! `Idle -> UploadingMedia -> Reconciling -> UploadingMetadata -> Done`, with
//! any failure ending in `Failed(phase)`. Phase two only starts once phase
//! one's content address is known.

mod orchestrator;
pub mod retry;

pub use orchestrator::{Phase, Pipeline, PipelineOutcome, PipelineState, ProgressFactory};
pub use retry::{call_with_policy, CallPolicy};
