//! Services controllers are built from.
//!
//! Each worker gets its own [`Container`]; `#[controller]` implements
//! [`Injectable`] so the registry can build a controller singleton from it
//! the first time a request needs one.

mod container;
mod injectable;

pub use container::Container;
pub use injectable::Injectable;
