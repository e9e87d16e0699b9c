//! Shared HTTP plumbing for the center API.

mod client;
mod envelope;

pub use client::{EnvelopeClient, Query};
pub use envelope::{Envelope, Payload};
