//! Message building utilities for tool responses.

mod builder;

pub use builder::{StartMessageBuilder, TimeoutMessageBuilder};
