//! Provider client boundary.
//!
//! The executor talks to model providers through the [`ModelClient`]
//! trait: send an [`ApiRequest`], receive a [`ModelResponse`] of ordered
//! content blocks plus a stop reason and usage counters. HTTP transport,
//! retries and credentials live behind the trait in the host application;
//! this crate only defines the envelopes, the error taxonomy, and the
//! pure wire-shaping adapters for the two supported protocol families.

pub mod adapters;
pub mod client;
pub mod error;
pub mod request;
pub mod response;

pub use client::ModelClient;
pub use error::ApiError;
pub use error::FailureDump;
pub use request::ApiParams;
pub use request::ApiRequest;
pub use response::ApiStopReason;
pub use response::ModelResponse;
