//! MCP tool interface.
//!
//! Every tool maps onto one `PsuService` operation. Results are always a
//! JSON text payload, either `{"status":"success",...}` or
//! `{"status":"error","error":{"type":...,"message":...}}`, so a failing
//! instrument never surfaces as a protocol error.

use crate::codec::ProtectionKind;
use crate::config::ServerConfig;
use crate::service::{PsuService, ServiceError, ServiceResult};
use async_trait::async_trait;
use rust_mcp_sdk::macros::{mcp_tool, JsonSchema};
use rust_mcp_sdk::schema::{
    schema_utils::CallToolError, CallToolRequest, CallToolResult, Implementation,
    InitializeResult, ListToolsRequest, ListToolsResult, RpcError, ServerCapabilities,
    ServerCapabilitiesTools, TextContent, LATEST_PROTOCOL_VERSION,
};
use rust_mcp_sdk::{
    error::SdkResult,
    mcp_server::{server_runtime, ServerHandler},
    tool_box, McpServer, StdioTransport, TransportOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

// ========== Tool definitions ==========

#[mcp_tool(
    name = "ping",
    description = "Health check. Returns pong without touching the instrument."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct PingTool {}

#[mcp_tool(
    name = "discover_devices",
    description = "Scan the network for Rigol DP832/DP821/DP712 power supplies. Probes every host of a /24 subnet with *IDN? and returns the instruments that answer. Defaults to the configured or local subnet."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct DiscoverDevicesTool {
    /// First three octets to scan, e.g. "192.168.68".
    pub network: Option<String>,
    /// SCPI socket port to probe (default 5555).
    pub port: Option<i64>,
}

#[mcp_tool(
    name = "test_connection",
    description = "Open a separate connection to a power supply, read its identity and close it again. Uses the configured address or discovery when no IP is given."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TestConnectionTool {
    pub ip_address: Option<String>,
}

#[mcp_tool(
    name = "connect",
    description = "Connect to a power supply, replacing any existing connection. Uses the configured address or discovery when no IP is given."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ConnectTool {
    /// IP address, host name or TCPIP0::<host>::<port>::SOCKET descriptor.
    pub ip_address: Option<String>,
    pub port: Option<i64>,
}

#[mcp_tool(name = "disconnect", description = "Close the active power supply connection.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct DisconnectTool {}

#[mcp_tool(
    name = "get_connection_status",
    description = "Report whether a power supply is connected, which one, and since when."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetConnectionStatusTool {}

#[mcp_tool(
    name = "get_device_info",
    description = "Read manufacturer, model, serial number and firmware version of the connected power supply."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetDeviceInfoTool {}

#[mcp_tool(
    name = "set_channel_settings",
    description = "Set the voltage (V) and current limit (A) of a channel. Channels: 1-3 on DP832, 1-2 on DP821, 1 on DP712."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SetChannelSettingsTool {
    pub channel: i64,
    pub voltage: f64,
    pub current: f64,
}

#[mcp_tool(
    name = "get_channel_settings",
    description = "Read the programmed voltage and current limit of a channel."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetChannelSettingsTool {
    pub channel: i64,
}

#[mcp_tool(name = "set_output_state", description = "Turn a channel output on or off.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SetOutputStateTool {
    pub channel: i64,
    pub state: bool,
}

#[mcp_tool(name = "get_output_state", description = "Read whether a channel output is on.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetOutputStateTool {
    pub channel: i64,
}

#[mcp_tool(
    name = "get_output_mode",
    description = "Read the regulation mode of a channel: CV (constant voltage), CC (constant current) or UR (unregulated)."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetOutputModeTool {
    pub channel: i64,
}

#[mcp_tool(name = "measure_voltage", description = "Measure the output voltage of a channel in volts.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct MeasureVoltageTool {
    pub channel: i64,
}

#[mcp_tool(name = "measure_current", description = "Measure the output current of a channel in amperes.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct MeasureCurrentTool {
    pub channel: i64,
}

#[mcp_tool(name = "measure_power", description = "Measure the output power of a channel in watts.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct MeasurePowerTool {
    pub channel: i64,
}

#[mcp_tool(
    name = "measure_all",
    description = "Measure voltage, current and power of a channel."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct MeasureAllTool {
    pub channel: i64,
}

#[mcp_tool(name = "set_ocp_enabled", description = "Enable or disable over-current protection on a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SetOcpEnabledTool {
    pub channel: i64,
    pub state: bool,
}

#[mcp_tool(name = "get_ocp_enabled", description = "Read whether over-current protection is enabled on a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetOcpEnabledTool {
    pub channel: i64,
}

#[mcp_tool(
    name = "set_ocp_value",
    description = "Set the over-current protection trip level of a channel in amperes (up to 110% of the channel rating)."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SetOcpValueTool {
    pub channel: i64,
    pub current_limit: f64,
}

#[mcp_tool(name = "get_ocp_value", description = "Read the over-current protection trip level of a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetOcpValueTool {
    pub channel: i64,
}

#[mcp_tool(name = "get_ocp_alarm", description = "Read whether over-current protection has tripped on a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetOcpAlarmTool {
    pub channel: i64,
}

#[mcp_tool(name = "clear_ocp_alarm", description = "Clear a tripped over-current protection alarm on a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ClearOcpAlarmTool {
    pub channel: i64,
}

#[mcp_tool(name = "set_ovp_enabled", description = "Enable or disable over-voltage protection on a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SetOvpEnabledTool {
    pub channel: i64,
    pub state: bool,
}

#[mcp_tool(name = "get_ovp_enabled", description = "Read whether over-voltage protection is enabled on a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetOvpEnabledTool {
    pub channel: i64,
}

#[mcp_tool(
    name = "set_ovp_value",
    description = "Set the over-voltage protection trip level of a channel in volts (up to 110% of the channel rating)."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SetOvpValueTool {
    pub channel: i64,
    pub voltage_limit: f64,
}

#[mcp_tool(name = "get_ovp_value", description = "Read the over-voltage protection trip level of a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetOvpValueTool {
    pub channel: i64,
}

#[mcp_tool(name = "get_ovp_alarm", description = "Read whether over-voltage protection has tripped on a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetOvpAlarmTool {
    pub channel: i64,
}

#[mcp_tool(name = "clear_ovp_alarm", description = "Clear a tripped over-voltage protection alarm on a channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ClearOvpAlarmTool {
    pub channel: i64,
}

#[mcp_tool(
    name = "get_protection_status",
    description = "Read enable flag, trip level and alarm state of one protection (kind \"ocp\" or \"ovp\") on a channel."
)]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetProtectionStatusTool {
    pub channel: i64,
    /// "ocp" or "ovp".
    pub kind: String,
}

#[mcp_tool(name = "get_all_output_states", description = "Read the output state of every channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetAllOutputStatesTool {}

#[mcp_tool(name = "get_all_settings", description = "Read the programmed voltage and current of every channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetAllSettingsTool {}

#[mcp_tool(name = "get_all_measurements", description = "Measure voltage, current and power on every channel.")]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetAllMeasurementsTool {}

tool_box!(
    PsuTools,
    [
        PingTool,
        DiscoverDevicesTool,
        TestConnectionTool,
        ConnectTool,
        DisconnectTool,
        GetConnectionStatusTool,
        GetDeviceInfoTool,
        SetChannelSettingsTool,
        GetChannelSettingsTool,
        SetOutputStateTool,
        GetOutputStateTool,
        GetOutputModeTool,
        MeasureVoltageTool,
        MeasureCurrentTool,
        MeasurePowerTool,
        MeasureAllTool,
        SetOcpEnabledTool,
        GetOcpEnabledTool,
        SetOcpValueTool,
        GetOcpValueTool,
        GetOcpAlarmTool,
        ClearOcpAlarmTool,
        SetOvpEnabledTool,
        GetOvpEnabledTool,
        SetOvpValueTool,
        GetOvpValueTool,
        GetOvpAlarmTool,
        ClearOvpAlarmTool,
        GetProtectionStatusTool,
        GetAllOutputStatesTool,
        GetAllSettingsTool,
        GetAllMeasurementsTool
    ]
);

// ========== Payloads ==========

/// Tag an object body with `"status": "success"`.
pub fn success_payload(body: Value) -> Value {
    match body {
        Value::Object(mut map) => {
            map.insert("status".to_string(), Value::String("success".to_string()));
            Value::Object(map)
        }
        other => json!({ "status": "success", "result": other }),
    }
}

pub fn error_payload(err: &ServiceError) -> Value {
    json!({
        "status": "error",
        "error": {
            "type": err.error_type(),
            "message": err.to_string(),
        }
    })
}

fn channel_arg(channel: i64) -> ServiceResult<u8> {
    u8::try_from(channel)
        .map_err(|_| {
            ServiceError::invalid_argument("channel", format!("{channel} is not a channel number"))
        })
}

fn port_arg(port: Option<i64>) -> ServiceResult<Option<u16>> {
    port.map(|p| {
        u16::try_from(p)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ServiceError::invalid_argument("port", format!("{p} is not a TCP port")))
    })
    .transpose()
}

// ========== Handler ==========

/// MCP server handler backed by a `PsuService`.
#[derive(Clone, Debug)]
pub struct PsuServerHandler {
    service: PsuService,
}

impl PsuServerHandler {
    pub fn new(service: PsuService) -> Self {
        Self { service }
    }

    /// Run a blocking service call and shape its outcome into a payload.
    async fn run<R, F, B>(&self, op: F, body: B) -> Value
    where
        F: FnOnce(&PsuService) -> ServiceResult<R> + Send + 'static,
        R: Send + 'static,
        B: FnOnce(R) -> Value,
    {
        match self.service.blocking(op).await {
            Ok(value) => success_payload(body(value)),
            Err(e) => {
                debug!("Tool call failed: {}", e);
                error_payload(&e)
            }
        }
    }

    /// Channel-scoped variant of [`run`](Self::run): converts the channel
    /// argument first.
    async fn on_channel<R, F, B>(&self, channel: i64, op: F, body: B) -> Value
    where
        F: FnOnce(&PsuService, u8) -> ServiceResult<R> + Send + 'static,
        R: Send + 'static,
        B: FnOnce(u8, R) -> Value,
    {
        let channel = match channel_arg(channel) {
            Ok(ch) => ch,
            Err(e) => return error_payload(&e),
        };
        self.run(move |s| op(s, channel), move |v| body(channel, v)).await
    }

    async fn protection_enabled(
        &self,
        kind: ProtectionKind,
        channel: i64,
        state: Option<bool>,
    ) -> Value {
        let key = format!("{}_enabled", kind.mnemonic().to_ascii_lowercase());
        match state {
            Some(on) => {
                self.on_channel(
                    channel,
                    move |s, ch| s.set_protection_enabled(kind, ch, on),
                    move |ch, ()| json!({ "channel": ch, key: on }),
                )
                .await
            }
            None => {
                self.on_channel(
                    channel,
                    move |s, ch| s.get_protection_enabled(kind, ch),
                    move |ch, on| json!({ "channel": ch, key: on }),
                )
                .await
            }
        }
    }

    async fn protection_value(
        &self,
        kind: ProtectionKind,
        channel: i64,
        value: Option<f64>,
    ) -> Value {
        let key = match kind {
            ProtectionKind::Ocp => "ocp_current_limit",
            ProtectionKind::Ovp => "ovp_voltage_limit",
        };
        let unit = kind.unit();
        match value {
            Some(limit) => {
                self.on_channel(
                    channel,
                    move |s, ch| s.set_protection_value(kind, ch, limit),
                    move |ch, ()| json!({ "channel": ch, key: limit, "unit": unit }),
                )
                .await
            }
            None => {
                self.on_channel(
                    channel,
                    move |s, ch| s.get_protection_value(kind, ch),
                    move |ch, limit| json!({ "channel": ch, key: limit, "unit": unit }),
                )
                .await
            }
        }
    }

    async fn protection_alarm(&self, kind: ProtectionKind, channel: i64, clear: bool) -> Value {
        let name = kind.mnemonic();
        if clear {
            self.on_channel(
                channel,
                move |s, ch| s.clear_protection_alarm(kind, ch),
                move |ch, ()| json!({ "channel": ch, "message": format!("{name} alarm cleared") }),
            )
            .await
        } else {
            let key = format!("{}_alarm_active", name.to_ascii_lowercase());
            self.on_channel(
                channel,
                move |s, ch| s.get_protection_alarm(kind, ch),
                move |ch, active| json!({ "channel": ch, key: active }),
            )
            .await
        }
    }

    /// Execute one tool and return its JSON payload.
    pub async fn dispatch(&self, tool: PsuTools) -> Value {
        match tool {
            PsuTools::PingTool(_) => success_payload(json!({ "message": "pong" })),

            PsuTools::DiscoverDevicesTool(args) => {
                let port = match port_arg(args.port) {
                    Ok(p) => p,
                    Err(e) => return error_payload(&e),
                };
                let network = args.network;
                self.run(
                    move |s| s.discover_devices(network.as_deref(), port),
                    |devices| json!({ "count": devices.len(), "devices": devices }),
                )
                .await
            }

            PsuTools::TestConnectionTool(args) => {
                let ip = args.ip_address;
                self.run(move |s| s.test_connection(ip.as_deref(), None), |info| json!(info))
                    .await
            }

            PsuTools::ConnectTool(args) => {
                let port = match port_arg(args.port) {
                    Ok(p) => p,
                    Err(e) => return error_payload(&e),
                };
                let ip = args.ip_address;
                self.run(
                    move |s| s.connect(ip.as_deref(), port),
                    |info| {
                        let mut body = json!(info);
                        body["connected"] = json!(true);
                        body
                    },
                )
                .await
            }

            PsuTools::DisconnectTool(_) => {
                self.run(
                    |s| Ok(s.disconnect()),
                    |was_connected| {
                        let message = if was_connected {
                            "Disconnected successfully"
                        } else {
                            "No active connection to disconnect"
                        };
                        json!({ "message": message, "was_connected": was_connected })
                    },
                )
                .await
            }

            PsuTools::GetConnectionStatusTool(_) => {
                self.run(|s| Ok(s.connection_status()), |status| json!(status))
                    .await
            }

            PsuTools::GetDeviceInfoTool(_) => {
                self.run(|s| s.device_info(), |id| json!({ "device_info": id }))
                    .await
            }

            PsuTools::SetChannelSettingsTool(args) => {
                let (voltage, current) = (args.voltage, args.current);
                self.on_channel(
                    args.channel,
                    move |s, ch| s.set_channel_settings(ch, voltage, current),
                    move |ch, ()| json!({ "channel": ch, "voltage": voltage, "current": current }),
                )
                .await
            }

            PsuTools::GetChannelSettingsTool(args) => {
                self.on_channel(
                    args.channel,
                    |s, ch| s.get_channel_settings(ch),
                    |ch, settings| json!({ "channel": ch, "settings": settings }),
                )
                .await
            }

            PsuTools::SetOutputStateTool(args) => {
                let on = args.state;
                self.on_channel(
                    args.channel,
                    move |s, ch| s.set_output_state(ch, on),
                    move |ch, ()| json!({ "channel": ch, "output_enabled": on }),
                )
                .await
            }

            PsuTools::GetOutputStateTool(args) => {
                self.on_channel(
                    args.channel,
                    |s, ch| s.get_output_state(ch),
                    |ch, on| json!({ "channel": ch, "output_enabled": on }),
                )
                .await
            }

            PsuTools::GetOutputModeTool(args) => {
                self.on_channel(
                    args.channel,
                    |s, ch| s.get_output_mode(ch),
                    |ch, mode| json!({ "channel": ch, "output_mode": mode }),
                )
                .await
            }

            PsuTools::MeasureVoltageTool(args) => {
                self.on_channel(
                    args.channel,
                    |s, ch| s.measure_voltage(ch),
                    |ch, v| json!({ "channel": ch, "voltage": v, "unit": "V" }),
                )
                .await
            }

            PsuTools::MeasureCurrentTool(args) => {
                self.on_channel(
                    args.channel,
                    |s, ch| s.measure_current(ch),
                    |ch, i| json!({ "channel": ch, "current": i, "unit": "A" }),
                )
                .await
            }

            PsuTools::MeasurePowerTool(args) => {
                self.on_channel(
                    args.channel,
                    |s, ch| s.measure_power(ch),
                    |ch, p| json!({ "channel": ch, "power": p, "unit": "W" }),
                )
                .await
            }

            PsuTools::MeasureAllTool(args) => {
                self.on_channel(
                    args.channel,
                    |s, ch| s.measure_all(ch),
                    |ch, m| {
                        json!({
                            "channel": ch,
                            "measurements": m,
                            "units": { "voltage": "V", "current": "A", "power": "W" }
                        })
                    },
                )
                .await
            }

            PsuTools::SetOcpEnabledTool(args) => {
                self.protection_enabled(ProtectionKind::Ocp, args.channel, Some(args.state))
                    .await
            }
            PsuTools::GetOcpEnabledTool(args) => {
                self.protection_enabled(ProtectionKind::Ocp, args.channel, None)
                    .await
            }
            PsuTools::SetOcpValueTool(args) => {
                self.protection_value(ProtectionKind::Ocp, args.channel, Some(args.current_limit))
                    .await
            }
            PsuTools::GetOcpValueTool(args) => {
                self.protection_value(ProtectionKind::Ocp, args.channel, None)
                    .await
            }
            PsuTools::GetOcpAlarmTool(args) => {
                self.protection_alarm(ProtectionKind::Ocp, args.channel, false)
                    .await
            }
            PsuTools::ClearOcpAlarmTool(args) => {
                self.protection_alarm(ProtectionKind::Ocp, args.channel, true)
                    .await
            }
            PsuTools::SetOvpEnabledTool(args) => {
                self.protection_enabled(ProtectionKind::Ovp, args.channel, Some(args.state))
                    .await
            }
            PsuTools::GetOvpEnabledTool(args) => {
                self.protection_enabled(ProtectionKind::Ovp, args.channel, None)
                    .await
            }
            PsuTools::SetOvpValueTool(args) => {
                self.protection_value(ProtectionKind::Ovp, args.channel, Some(args.voltage_limit))
                    .await
            }
            PsuTools::GetOvpValueTool(args) => {
                self.protection_value(ProtectionKind::Ovp, args.channel, None)
                    .await
            }
            PsuTools::GetOvpAlarmTool(args) => {
                self.protection_alarm(ProtectionKind::Ovp, args.channel, false)
                    .await
            }
            PsuTools::ClearOvpAlarmTool(args) => {
                self.protection_alarm(ProtectionKind::Ovp, args.channel, true)
                    .await
            }

            PsuTools::GetProtectionStatusTool(args) => {
                let kind: ProtectionKind = match args.kind.parse() {
                    Ok(kind) => kind,
                    Err(message) => {
                        return error_payload(&ServiceError::invalid_argument("kind", message))
                    }
                };
                let unit = kind.unit();
                self.on_channel(
                    args.channel,
                    move |s, ch| s.get_protection_status(kind, ch),
                    move |ch, status| {
                        json!({ "channel": ch, "kind": kind, "protection": status, "unit": unit })
                    },
                )
                .await
            }

            PsuTools::GetAllOutputStatesTool(_) => {
                self.run(|s| s.get_all_output_states(), |states| json!({ "outputs": states }))
                    .await
            }

            PsuTools::GetAllSettingsTool(_) => {
                self.run(|s| s.get_all_settings(), |settings| json!({ "settings": settings }))
                    .await
            }

            PsuTools::GetAllMeasurementsTool(_) => {
                self.run(
                    |s| s.get_all_measurements(),
                    |m| {
                        json!({
                            "measurements": m,
                            "units": { "voltage": "V", "current": "A", "power": "W" }
                        })
                    },
                )
                .await
            }
        }
    }
}

#[async_trait]
impl ServerHandler for PsuServerHandler {
    async fn handle_list_tools_request(
        &self,
        _request: ListToolsRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> Result<ListToolsResult, RpcError> {
        Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: PsuTools::tools(),
        })
    }

    async fn handle_call_tool_request(
        &self,
        request: CallToolRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> Result<CallToolResult, CallToolError> {
        let tool = PsuTools::try_from(request.params).map_err(CallToolError::new)?;
        let payload = self.dispatch(tool).await;
        Ok(CallToolResult::text_content(vec![TextContent::from(
            payload.to_string(),
        )]))
    }
}

/// Server identity sent in the initialize response.
pub fn server_details(config: &ServerConfig) -> InitializeResult {
    InitializeResult {
        server_info: Implementation {
            name: config.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Rigol DP800 power supply".to_string()),
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools { list_changed: None }),
            ..Default::default()
        },
        meta: None,
        instructions: Some(config.instructions.clone()),
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}

/// Serve the tool set over stdio until the client disconnects.
pub async fn run_server(service: PsuService, config: &ServerConfig) -> SdkResult<()> {
    let transport = StdioTransport::new(TransportOptions::default())?;
    let handler = PsuServerHandler::new(service);
    info!("Starting MCP server '{}' on stdio", config.name);
    let server = server_runtime::create_server(server_details(config), transport, handler);
    server.start().await
}
