//! TransportAdapter, tool-protocol half (C13, §4.11): JSON-RPC 2.0 over
//! stdio. `crate::rest` is the other half, over HTTP.

pub mod dispatch;
pub mod protocol;
pub mod tools;

pub use dispatch::ToolDispatcher;
pub use protocol::{
    methods, InitializeResult, McpHandler, McpRequest, McpResponse, McpServer, ToolCallResult,
};
pub use tools::{get_tool_definitions, TOOL_DEFINITIONS};
