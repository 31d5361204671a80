//! # Docs Agent
//!
//! Turns GitHub issues into documentation changes. An issue whose title carries
//! a marker (by default `[Docs Agent]`) becomes a documentation request; a
//! language model is driven through a bounded tool-call loop against an MCP
//! tool server; its final answer is committed back to the repository.
//!
//! ## Modules
//!
//! - `trigger`: issue notifications in, documentation requests out
//! - `request`: request model and scope parsing
//! - `agent`: the bounded model ⇄ tool loop
//! - `channel`: tool calls to a remote MCP server
//! - `applier`: writing the result back, with conflict detection
//! - `pipeline`: one request end to end, and many in parallel
//! - `server`: an MCP server exposing the GitHub primitives the agent uses

/// Bounded agent loop
pub mod agent;
/// Applying results to the repository
pub mod applier;
/// Tool channel to the MCP server
pub mod channel;
/// Run configuration
pub mod config;
/// Parsing the model's documentation output
pub mod document;
/// Terminal request errors
pub mod error;
/// GitHub API integration
pub mod github;
/// Language model client
pub mod llm;
/// Request handling end to end
pub mod pipeline;
/// Documentation requests
pub mod request;
/// MCP server implementation and tools
pub mod server;
/// Issue notifications
pub mod trigger;
