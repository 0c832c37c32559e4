// ── Reactive data store ──
//
// Last-known-good poll results with push-based change notification.

mod collection;
mod data_store;

pub use data_store::DataStore;
