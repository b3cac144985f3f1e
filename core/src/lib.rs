//! Shared types for the HCP interaction engine: the canonical record schema,
//! alias normalization, the response envelope protocol and the client-side
//! synchronization session.

pub mod dates;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod form;
pub mod interactions;
pub mod normalize;
pub mod session;
