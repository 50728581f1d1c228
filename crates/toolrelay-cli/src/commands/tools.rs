//! List the tools the configured servers expose.
//!
//! Talks to the MCP servers only; no model provider is needed.

use toolrelay_mcp::{McpClient, McpTool};

use crate::AppContext;

pub async fn run(ctx: &AppContext, servers: &[String]) -> anyhow::Result<()> {
    for line in list(ctx, servers).await? {
        println!("{}", line);
    }
    Ok(())
}

/// Connect, describe every tool on one line each, then disconnect.
async fn list(ctx: &AppContext, servers: &[String]) -> anyhow::Result<Vec<String>> {
    let client = McpClient::new();
    let tools = client.connect_all(&ctx.servers(servers)).await?;
    let lines = describe(&tools);
    client.disconnect_all().await;
    Ok(lines)
}

fn describe(tools: &[McpTool]) -> Vec<String> {
    let width = tools.iter().map(|t| t.tool_name().len()).max().unwrap_or(0);
    tools
        .iter()
        .map(|tool| {
            let description = tool.mcp_definition().description.as_deref().unwrap_or("");
            format!(
                "{:width$}  [{}]  {}",
                tool.tool_name(),
                tool.server_name(),
                description.lines().next().unwrap_or(""),
                width = width
            )
        })
        .collect()
}
