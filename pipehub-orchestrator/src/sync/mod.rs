//! Background pipeline synchronization

pub mod reconciler;
pub mod scheduler;

pub use reconciler::{PipelineKey, ReconcilePlan, reconcile};
pub use scheduler::{SyncScheduler, SyncSummary};
