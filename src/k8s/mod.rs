pub mod client;
pub mod discovery;

pub use client::create_client;
pub use discovery::{discover_prometheus, service_address};
