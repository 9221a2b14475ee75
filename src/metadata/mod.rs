//! Metadata stubs, staged records, and their reconciliation with media.
//!
//! # Module layout
//!
//! - [`store`] -- Reading `<base>.json` stubs and writing staged records.
//! - [`reconcile`] -- Pairing assets with stubs and injecting the media URI.

pub mod reconcile;
pub mod store;

pub use reconcile::{MissingMetadata, ReconcileReport, Reconciler, StagedRecord};
pub use store::{MetadataStore, MetadataStub, StubError, UploadRecord, IMAGE_KEY};
