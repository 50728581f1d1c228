//! Answer a single query and exit.

use std::sync::Arc;

use toolrelay_agent::AgentEventHandler;
use toolrelay_core::{ToolCall, ToolResult};

use crate::commands::build_runner;
use crate::AppContext;

/// Prints tool activity to stderr.
struct ProgressHandler;

impl AgentEventHandler for ProgressHandler {
    fn on_tool_start(&self, call: &ToolCall) {
        eprintln!("→ {}({})", call.name, call.arguments);
    }

    fn on_tool_complete(&self, call: &ToolCall, result: &ToolResult) {
        let status = if result.success { "✓" } else { "✗" };
        eprintln!("  {} {} ({} ms)", status, call.name, result.duration_ms);
    }
}

pub async fn run(query: &str, servers: &[String], ctx: &AppContext) -> anyhow::Result<()> {
    let mut runner = build_runner(ctx, Arc::new(ProgressHandler))?;

    let result = match runner.setup_with_servers(&ctx.servers(servers)).await {
        Ok(()) => runner.run(query).await,
        Err(e) => Err(e),
    };

    // Connections are released whether or not the query succeeded
    runner.cleanup().await;

    println!("{}", result?);
    Ok(())
}
