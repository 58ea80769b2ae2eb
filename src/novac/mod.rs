pub mod client;
pub mod types;

pub use client::{NovacClient, NovacError};
pub use types::PaymentStatus;
