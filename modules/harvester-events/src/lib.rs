pub mod store;
pub mod types;

pub use store::{EventHandle, EventStore};
pub use types::{AppendEvent, StoredEvent};
