//! Supabase (PostgREST) backend integration

mod client;
mod types;

pub use client::SupabaseClient;
pub use types::SupabaseError;
