//! Data synchronization module

pub mod background;
pub mod supabase;

// Re-export commonly used types
pub use background::{BackgroundSyncService, StartupOutcome, StartupPolicy, UnloadDecision};
pub use supabase::{SupabaseClient, SupabaseError};
