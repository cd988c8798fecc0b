use super::test_mocks::*;
use super::*;

use rmcp::model::CallToolRequestParams;
use rmcp::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a MCP server and connect a client via in-memory duplex transport.
async fn spawn_client_server(
    base: &std::path::Path,
) -> (
    rmcp::service::RunningService<rmcp::RoleClient, ()>,
    tokio::task::JoinHandle<anyhow::Result<()>>,
) {
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    let server = build_server(base).server;
    let server_handle = tokio::spawn(async move {
        server.serve(server_transport).await?.waiting().await?;
        anyhow::Ok(())
    });

    let client = ().serve(client_transport).await.unwrap();
    (client, server_handle)
}

fn call_params(name: &str, args: &serde_json::Value) -> CallToolRequestParams {
    CallToolRequestParams {
        meta: None,
        name: name.to_string().into(),
        arguments: args.as_object().cloned(),
        task: None,
    }
}

const EXPECTED_TOOL_NAMES: &[&str] = &[
    "create_stack",
    "list_stacks",
    "manage_stack",
    "create_dns_record",
    "list_dns_records",
    "update_dns_proxy",
    "delete_dns_record",
    "validate_stack_config",
    "health_check",
];

// ===========================================================================
// Handshake and tool discovery
// ===========================================================================

#[tokio::test]
async fn client_connects_and_receives_server_info() -> anyhow::Result<()> {
    let base = tempfile::tempdir()?;
    let (client, server_handle) = spawn_client_server(base.path()).await;

    let server_info = client
        .peer_info()
        .expect("server info should be set after handshake");
    assert_eq!(server_info.protocol_version, ProtocolVersion::LATEST);
    assert!(server_info.capabilities.tools.is_some());
    let instructions = server_info.instructions.as_deref().unwrap_or("");
    assert!(instructions.contains("validate_stack_config"));

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn tools_list_returns_all_nine_tools() -> anyhow::Result<()> {
    let base = tempfile::tempdir()?;
    let (client, server_handle) = spawn_client_server(base.path()).await;

    let tools = client.list_all_tools().await?;
    assert_eq!(tools.len(), EXPECTED_TOOL_NAMES.len());

    let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
    for expected in EXPECTED_TOOL_NAMES {
        assert!(names.contains(expected), "missing tool: {expected}");
    }

    let create = tools.iter().find(|t| t.name == "create_stack").unwrap();
    let required = create
        .input_schema
        .get("required")
        .and_then(|v| v.as_array())
        .expect("create_stack should have required fields");
    assert!(required.iter().any(|v| v == "name"));

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

// ===========================================================================
// tools/call
// ===========================================================================

#[tokio::test]
async fn call_create_then_list_over_the_wire() -> anyhow::Result<()> {
    let base = tempfile::tempdir()?;
    let (client, server_handle) = spawn_client_server(base.path()).await;

    let created = client
        .call_tool(call_params(
            "create_stack",
            &serde_json::json!({ "name": "blog", "image": "ghost:5", "port": 2368 }),
        ))
        .await?;
    assert_eq!(envelope(&created)["success"], true);

    let listed = client
        .call_tool(call_params("list_stacks", &serde_json::json!({})))
        .await?;
    let body = envelope(&listed);
    assert_eq!(body["details"]["stacks"][0]["name"], "blog");
    assert_eq!(body["details"]["stacks"][0]["status"], "created");

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn operation_failure_is_not_a_protocol_error() -> anyhow::Result<()> {
    let base = tempfile::tempdir()?;
    let (client, server_handle) = spawn_client_server(base.path()).await;

    let result = client
        .call_tool(call_params(
            "manage_stack",
            &serde_json::json!({ "name": "ghost", "action": "start" }),
        ))
        .await?;
    assert_eq!(result.is_error, Some(true));
    assert_eq!(envelope(&result)["error"]["code"], "StackNotFound");

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

// ===========================================================================
// resources/list and prompts/list
// ===========================================================================

#[tokio::test]
async fn resources_and_prompts_are_advertised() -> anyhow::Result<()> {
    let base = tempfile::tempdir()?;
    let (client, server_handle) = spawn_client_server(base.path()).await;

    let capabilities = &client
        .peer_info()
        .expect("server info should be set after handshake")
        .capabilities;
    assert!(capabilities.resources.is_some());
    assert!(capabilities.prompts.is_some());

    let resources = client.list_all_resources().await?;
    assert!(resources.iter().any(|r| r.raw.uri == "stack://list"));
    assert!(resources.iter().any(|r| r.raw.uri == "template://pocketbase"));

    let prompts = client.list_all_prompts().await?;
    let names: Vec<&str> = prompts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["deploy-web-app", "setup-database", "create-api-service"]
    );

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}
