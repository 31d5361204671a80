use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService, ServiceError},
    transport::SseTransport,
};
use serde_json::Value;

use super::{ChannelError, ToolCall, ToolChannel, ToolResult, ToolSpec};

/// Tool channel backed by a remote MCP server reached over SSE.
pub struct McpChannel {
    service: RunningService<RoleClient, ()>,
    call_timeout: Duration,
}

impl McpChannel {
    /// Connect to an MCP server, authenticating with a bearer token when one is given.
    pub async fn connect(url: &str, token: Option<&str>, call_timeout: Duration) -> Result<Self> {
        if url.trim().is_empty() {
            anyhow::bail!("MCP server URL cannot be empty");
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            if token.trim().is_empty() {
                anyhow::bail!("MCP access token cannot be empty");
            }
            tracing::info!("Using bearer token for MCP server");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(call_timeout)
            .build()?;
        let transport = SseTransport::start_with_client(url, http).await?;
        let service = ().serve(transport).await.inspect_err(|e| {
            tracing::error!("MCP handshake failed: {:?}", e);
        })?;

        tracing::info!("Connected to MCP server at {}", url);
        Ok(Self {
            service,
            call_timeout,
        })
    }

    /// Close the session with the server.
    pub async fn close(self) -> Result<()> {
        self.service.cancel().await?;
        Ok(())
    }
}

#[async_trait]
impl ToolChannel for McpChannel {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ChannelError> {
        let tools = tokio::time::timeout(self.call_timeout, self.service.list_all_tools())
            .await
            .map_err(|_| ChannelError::Unavailable("timed out listing tools".to_string()))?
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        Ok(tools
            .into_iter()
            .map(|tool| ToolSpec {
                name: tool.name.to_string(),
                description: tool.description.to_string(),
                input_schema: Value::Object(tool.input_schema.as_ref().clone()),
            })
            .collect())
    }

    async fn call(&self, call: &ToolCall) -> Result<ToolResult, ChannelError> {
        tracing::debug!("Calling tool {} ({})", call.tool_name, call.id);

        let request = CallToolRequestParam {
            name: call.tool_name.clone().into(),
            arguments: Some(call.arguments.clone()),
        };

        let response = match tokio::time::timeout(self.call_timeout, self.service.call_tool(request)).await {
            Err(_) => {
                return Err(ChannelError::Unavailable(format!(
                    "{} timed out after {:?}",
                    call.tool_name, self.call_timeout
                )));
            }
            // The server answered with an error: that is the tool failing, not the channel
            Ok(Err(ServiceError::McpError(e))) => {
                return Ok(ToolResult::failure(call, e.message.to_string()));
            }
            Ok(Err(e)) => return Err(ChannelError::Unavailable(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let payload = response
            .content
            .iter()
            .filter_map(|content| match &content.raw {
                RawContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if response.is_error.unwrap_or(false) {
            Ok(ToolResult::failure(call, payload))
        } else {
            Ok(ToolResult::success(call, payload))
        }
    }
}
