pub mod batch;
pub mod error;
pub mod extract;
pub mod fields;
pub mod files;
pub mod identity;
pub mod sport;
pub mod store;
pub mod units;

pub use error::{IngestError, Result};
