pub mod stream;

pub use stream::{managed, managed_with_outcome, unmanaged};
