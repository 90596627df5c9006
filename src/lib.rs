//! Storage provider that keeps a filesystem's blocks in an S3-compatible
//! object store.
//!
//! A [`Provider`] owns the store client and a namespace. After
//! [`Provider::open`], it hands out read-only or read-write [`Context`]s that
//! map logical keys to `<namespace>/<key>` objects.

pub mod adapters;
pub mod context;
pub mod model;
pub mod provider;
pub mod util;

pub use adapters::ObjectStore;
pub use context::{Context, Mode};
pub use model::{
    error::{ProviderError, StoreError},
    value::Value,
};
pub use provider::{Provider, ProviderConfig};
