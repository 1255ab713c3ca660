pub mod client;

pub use client::{decode_response, with_query, ApiClient};
