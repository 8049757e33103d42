#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// Public modules
mod common;
mod error;

pub mod address_book;
#[cfg(feature = "async")]
pub mod async_manager;
pub mod cache;
pub mod codec;
pub mod datastore;
pub mod defaults;
pub mod manager;
pub mod provider_set;

pub use crate::common::{PeerId, ProviderInfo};
pub use bytes::Bytes;
pub use error::Error;
pub use manager::{Config, ProviderManager, ProviderStore};
