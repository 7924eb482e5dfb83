//! meshdesk-store: store capability boundary.
//! Defines the `WatchableStore` trait projections consume, the subscription
//! handle contract, and an in-memory implementation. No projection logic.

pub mod error;
pub mod memory;
pub mod watch;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use watch::{StoreCallback, StorePath, SubscriptionHandle, WatchableStore};
