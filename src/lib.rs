//! Admin console for translation keys: a typed client for the translation
//! REST service, a request cache with explicit invalidation, an observable
//! UI state store and the console components built on top of them.

pub mod api;
pub mod config;
pub mod console;
pub mod error;
pub mod models;
pub mod query;
pub mod retry;
pub mod store;
