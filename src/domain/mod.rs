//! Domain layer: the fixed collections and the record encoding rules.

pub mod collection;
pub mod record;

pub use collection::Collection;
pub use record::{EncodedRecord, MAX_ID_LEN};
