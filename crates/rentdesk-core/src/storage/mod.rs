//! Object storage for vehicle and model images.

mod supabase;

pub use supabase::SupabaseStorage;
