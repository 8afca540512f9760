//! store
//!
//! Client side of the remote content-addressable object store.
//!
//! # Architecture
//!
//! The [`ObjectStore`] trait is the only way the publish engine talks to the
//! remote repository. Commands obtain a store through [`create_store`]
//! rather than importing an implementation directly.
//!
//! # Modules
//!
//! - `traits`: Core `ObjectStore` trait and request/response types
//! - [`github`]: GitHub implementation over the git data REST API
//! - [`mock`]: In-memory implementation for deterministic testing
//! - `factory`: Store selection and creation

mod factory;
pub mod github;
pub mod mock;
mod traits;

pub use factory::{create_store, valid_store_names, FactoryError, StoreProvider};
pub use github::parse_repo_spec;
pub use traits::*;
