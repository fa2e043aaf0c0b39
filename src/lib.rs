//! toolrelay is a streaming chat gateway that sits between a user and two
//! backends: an MCP tool server and an LLM.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session store, the LLM port, configuration and the
//!   streaming orchestrator that drives one chat turn.
//! - [`decision`] decides, per user message, whether a tool should be called
//!   and with what arguments.
//! - [`mcp`] talks to the tool backend over JSON-RPC or the plain REST shape.
//! - [`api`] defines the chat payloads exchanged with OpenAI-compatible APIs.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod decision;
pub mod mcp;
pub mod utils;
