//! Test doubles for the catalog source and store, plus record fixtures.

pub mod fixtures;
mod source;
mod store;

pub use source::{Step, StubSource};
pub use store::{SaveStep, StubStore};
