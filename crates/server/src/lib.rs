pub mod config;
pub mod mcp;
