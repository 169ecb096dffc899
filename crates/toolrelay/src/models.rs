//! These models represent the objects passed around during a turn
//!
//! There are a few related formats we need to interact with:
//! - chat messages sent from the interface, in the OpenAI chat wire format
//! - tool definitions sent to the LLM, derived from search or OpenAPI schemas
//! - tool results sent back to the LLM as `tool` role messages
//!
//! The conversation is kept in the wire format end to end, since the only
//! completion transport we speak is the OpenAI-compatible one.
pub mod catalog;
pub mod message;
pub mod role;
pub mod tool;
