//! Publishing the ranking as a curated Bluesky list

pub mod reconciler;

pub use reconciler::{ListReconciler, ListSettings, ReconcileReport};
