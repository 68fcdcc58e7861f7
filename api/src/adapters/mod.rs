//! Wire-shaping adapters.
//!
//! Pure conversion between the neutral [`crate::ApiRequest`] /
//! [`crate::ModelResponse`] envelopes and provider JSON bodies. No
//! transport lives here; a [`crate::ModelClient`] implementation composes
//! an adapter with whatever HTTP stack the host application uses.

pub mod anthropic;
pub mod responses;
