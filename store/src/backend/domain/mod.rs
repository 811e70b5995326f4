//! # Domain Module
//!
//! The consumer-facing layer on top of storage:
//!
//! - **data_access.rs** - `DataAccess`, which forwards to the selected backend
//!   and announces successful mutations
//! - **events.rs** - `EventBus` and the `StoreEvent` notifications

pub mod data_access;
pub mod events;

pub use data_access::DataAccess;
pub use events::{EventBus, EventHandler, StoreEvent};
