use std::time::Instant;

use serde_json::{Map, Value, json};
use shopping_insight_core::error::{ValidationError, codes};
use shopping_insight_core::query::{
    CategoryQuery, KeywordQuery, ParamGroup, Period, Segment, category_query_schema,
    keyword_query_schema,
};
use shopping_insight_core::trend::TrendResponse;
use tokio::io::{self, AsyncBufRead, AsyncWrite, BufReader};

mod client;
mod report;
mod transport;

#[cfg(test)]
mod test_support;

pub use client::{
    CLIENT_ID_ENV, CLIENT_SECRET_ENV, ClientConfig, ConfigError, Credentials, DEFAULT_BASE_URL,
    Endpoint, ShoppingInsightClient, UpstreamError,
};
pub use report::format_trend_report;
pub use transport::TransportError;

use transport::{read_message, write_message};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "naver-shopping-insight";
const CATEGORY_RESOURCE_NAME: &str = "categories";
const CATEGORY_RESOURCE_TEMPLATE: &str =
    "naver-shopping-insight://categories/{startDate}/{endDate}/{timeUnit}";
const CATEGORY_RESOURCE_PREFIX: &str = "naver-shopping-insight://categories/";
const GUIDE_PROMPT_NAME: &str = "shopping-insight-guide";
const ERROR_TEXT_PREFIX: &str = "오류 발생: ";

const GUIDE_TEXT: &str = "네이버 쇼핑인사이트 API를 통해 다음과 같은 정보를 조회할 수 있습니다:

1. 쇼핑인사이트 분야별 트렌드 조회
2. 쇼핑인사이트 분야 내 기기별 트렌드 조회
3. 쇼핑인사이트 분야 내 성별 트렌드 조회
4. 쇼핑인사이트 분야 내 연령별 트렌드 조회
5. 쇼핑인사이트 키워드별 트렌드 조회
6. 쇼핑인사이트 키워드 기기별/성별/연령별 트렌드 조회

다음 도구들을 사용할 수 있습니다:
- get-category-trends: 분야별 트렌드 조회
- get-category-by-device: 기기별 트렌드 조회
- get-category-by-gender: 성별 트렌드 조회
- get-category-by-age: 연령별 트렌드 조회
- get-keyword-trends: 키워드별 트렌드 조회
- get-keyword-by-device: 키워드 기기별 트렌드 조회
- get-keyword-by-gender: 키워드 성별 트렌드 조회
- get-keyword-by-age: 키워드 연령별 트렌드 조회

공통 파라미터:
- startDate, endDate: YYYY-MM-DD
- timeUnit: date | week | month
- device: pc | mobile | all (선택)
- gender: m | f | a (선택)
- ages: 10, 20, 30, 40, 50, 60 중 복수 선택 (선택)

요청 예시:
1. 2023년 1월부터 2023년 3월까지 패션의류와 화장품/미용 분야의 월별 트렌드
2. 특정 키워드(예: \"니트\", \"립스틱\")의 트렌드
3. 20-30대 여성의 화장품 관련 트렌드

주요 카테고리 ID:
- 패션의류: 50000000
- 화장품/미용: 50000002
- 디지털/가전: 50000003
- 식품: 50000008
";

/// Starts the stdio server. Returns the process exit code.
pub async fn run(config: ClientConfig) -> i32 {
    let client = match Credentials::from_env()
        .and_then(|credentials| ShoppingInsightClient::new(credentials, config))
    {
        Ok(client) => client,
        Err(err) => {
            report_fatal("configuration_error", &err.to_string());
            return 1;
        }
    };

    let server = McpServer::new(client);
    tracing::info!(
        server = MCP_SERVER_NAME,
        version = env!("CARGO_PKG_VERSION"),
        base_url = server.client.base_url(),
        "네이버 쇼핑인사이트 MCP 서버 시작 중..."
    );

    match server.serve_stdio().await {
        Ok(()) => {
            tracing::info!("stdin closed; shutting down");
            0
        }
        Err(err) => {
            report_fatal("mcp_server_error", &err.to_string());
            1
        }
    }
}

fn report_fatal(code: &str, message: &str) {
    let payload = json!({
        "error": code,
        "message": message,
    });
    eprintln!("{}", to_pretty_json(&payload));
}

/// MCP front-end over a [`ShoppingInsightClient`]. Holds no per-call state.
pub struct McpServer {
    client: ShoppingInsightClient,
}

impl McpServer {
    pub fn new(client: ShoppingInsightClient) -> Self {
        Self { client }
    }

    pub async fn serve_stdio(&self) -> Result<(), TransportError> {
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(frame) = read_message(&mut reader).await? {
            let response = match frame.body {
                Ok(incoming) => self.handle_incoming_message(incoming).await,
                Err(err) => Some(error_response(Value::Null, RpcError::parse_error(err))),
            };
            if let Some(response) = response {
                write_message(&mut writer, &response, frame.framing).await?;
            }
        }
        Ok(())
    }

    /// Handles one decoded message (single or batch). `None` when nothing
    /// needs to be written back, e.g. for notifications.
    pub async fn handle_incoming_message(&self, incoming: Value) -> Option<Value> {
        let Value::Array(batch) = incoming else {
            return self.handle_single_message(incoming).await;
        };

        if batch.is_empty() {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
        }
        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = self.handle_single_message(item).await {
                responses.push(response);
            }
        }
        (!responses.is_empty()).then_some(Value::Array(responses))
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Client responses; this server never issues outbound requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => Some(match self.handle_request(method, params).await {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            }),
            None => {
                tracing::debug!(method, "notification ignored");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "resources/templates/list" => Ok(resource_templates_payload()),
            "resources/read" => self.handle_resources_read(params).await,
            "prompts/list" => Ok(prompts_list_payload()),
            "prompts/get" => handle_prompts_get(params),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let started = Instant::now();
        let result = self.execute_tool(name, &args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        Ok(match result {
            Ok(response) => {
                tracing::info!(
                    tool = name,
                    elapsed_ms,
                    results = response.results.len(),
                    "tool call succeeded"
                );
                build_tool_call_response(&response)
            }
            Err(err) => {
                tracing::warn!(
                    tool = name,
                    elapsed_ms,
                    error = err.code,
                    message = %err.message,
                    "tool call failed"
                );
                build_tool_error_response(&err)
            }
        })
    }

    async fn execute_tool(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
    ) -> Result<TrendResponse, ToolError> {
        let client = &self.client;
        let response = match tool_name {
            "get-category-trends" => client.get_categories(&CategoryQuery::from_args(args)?).await?,
            "get-category-by-device" => {
                client
                    .get_category_by_device(&CategoryQuery::from_args(args)?)
                    .await?
            }
            "get-category-by-gender" => {
                client
                    .get_category_by_gender(&CategoryQuery::from_args(args)?)
                    .await?
            }
            "get-category-by-age" => {
                client
                    .get_category_by_age(&CategoryQuery::from_args(args)?)
                    .await?
            }
            "get-keyword-trends" => client.get_keywords(&KeywordQuery::from_args(args)?).await?,
            "get-keyword-by-device" => {
                client
                    .get_keyword_by_device(&KeywordQuery::from_args(args)?)
                    .await?
            }
            "get-keyword-by-gender" => {
                client
                    .get_keyword_by_gender(&KeywordQuery::from_args(args)?)
                    .await?
            }
            "get-keyword-by-age" => {
                client
                    .get_keyword_by_age(&KeywordQuery::from_args(args)?)
                    .await?
            }
            _ => {
                return Err(ToolError::new(
                    codes::UNKNOWN_TOOL,
                    format!("Unknown tool '{tool_name}'"),
                )
                .with_field("name"));
            }
        };
        Ok(response)
    }

    async fn handle_resources_read(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("resources/read params must be an object"))?;
        let uri = params.get("uri").and_then(Value::as_str).ok_or_else(|| {
            RpcError::invalid_params("resources/read requires string field 'uri'")
        })?;

        let [start_date, end_date, time_unit] = parse_category_resource_uri(uri)
            .ok_or_else(|| RpcError::invalid_params(format!("Unknown resource uri '{uri}'")))?;

        let text = match self
            .read_default_categories(start_date, end_date, time_unit)
            .await
        {
            Ok(response) => format_trend_report(&response),
            Err(err) => {
                tracing::warn!(uri, error = err.code, message = %err.message, "resource read failed");
                error_text(&err.message)
            }
        };

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "text/plain",
                "text": text
            }]
        }))
    }

    async fn read_default_categories(
        &self,
        start_date: &str,
        end_date: &str,
        time_unit: &str,
    ) -> Result<TrendResponse, ToolError> {
        let query = CategoryQuery {
            period: Period::new(start_date, end_date, time_unit)?,
            category: default_category_groups(),
            segment: Segment::default(),
        };
        Ok(self.client.get_categories(&query).await?)
    }
}

/// Groups queried by the category resource, which takes no body.
fn default_category_groups() -> Vec<ParamGroup> {
    vec![
        ParamGroup::new("패션의류", &["50000000"]),
        ParamGroup::new("화장품/미용", &["50000002"]),
    ]
}

fn parse_category_resource_uri(uri: &str) -> Option<[&str; 3]> {
    let rest = uri.strip_prefix(CATEGORY_RESOURCE_PREFIX)?;
    let mut segments = rest.split('/');
    let parsed = [segments.next()?, segments.next()?, segments.next()?];
    if segments.next().is_some() || parsed.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    Some(parsed)
}

fn initialize_payload() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            },
            "resources": {
                "listChanged": false
            },
            "prompts": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "Naver Shopping Insight trends. Read the shopping-insight-guide prompt for tool usage and sample category ids. Dates are YYYY-MM-DD; results are relative ratios (0-100), not counts."
    })
}

#[derive(Debug)]
struct ToolDefinition {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

fn tool_definitions() -> Vec<ToolDefinition> {
    let category = |name: &'static str, description: &'static str| ToolDefinition {
        name,
        description,
        input_schema: category_query_schema(),
    };
    let keyword = |name: &'static str, description: &'static str| ToolDefinition {
        name,
        description,
        input_schema: keyword_query_schema(),
    };
    vec![
        category("get-category-trends", "쇼핑인사이트 분야별 트렌드 조회"),
        category("get-category-by-device", "쇼핑인사이트 분야 내 기기별 트렌드 조회"),
        category("get-category-by-gender", "쇼핑인사이트 분야 내 성별 트렌드 조회"),
        category("get-category-by-age", "쇼핑인사이트 분야 내 연령별 트렌드 조회"),
        keyword("get-keyword-trends", "쇼핑인사이트 키워드별 트렌드 조회"),
        keyword("get-keyword-by-device", "쇼핑인사이트 키워드 기기별 트렌드 조회"),
        keyword("get-keyword-by-gender", "쇼핑인사이트 키워드 성별 트렌드 조회"),
        keyword("get-keyword-by-age", "쇼핑인사이트 키워드 연령별 트렌드 조회"),
    ]
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn resource_templates_payload() -> Value {
    json!({
        "resourceTemplates": [{
            "uriTemplate": CATEGORY_RESOURCE_TEMPLATE,
            "name": CATEGORY_RESOURCE_NAME,
            "description": "패션의류/화장품·미용 분야 트렌드 (기간과 시간 단위 지정)",
            "mimeType": "text/plain"
        }]
    })
}

fn prompts_list_payload() -> Value {
    json!({
        "prompts": [{
            "name": GUIDE_PROMPT_NAME,
            "description": "쇼핑인사이트 도구 사용 안내",
            "arguments": []
        }]
    })
}

fn handle_prompts_get(params: Value) -> Result<Value, RpcError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params("prompts/get requires string field 'name'"))?;
    if name != GUIDE_PROMPT_NAME {
        return Err(RpcError::invalid_params(format!("Unknown prompt '{name}'")));
    }
    Ok(json!({
        "description": "쇼핑인사이트 도구 사용 안내",
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": GUIDE_TEXT }
        }]
    }))
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn parse_error(err: serde_json::Error) -> Self {
        Self {
            code: -32700,
            message: format!("Parse error: {err}"),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

/// Structured failure of one tool call. Flattened to `오류 발생: {message}`
/// for the text block; the fields survive in `structuredContent`.
#[derive(Debug, Clone)]
struct ToolError {
    code: &'static str,
    message: String,
    field: Option<String>,
    status: Option<u16>,
    body: Option<Value>,
}

impl ToolError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            status: None,
            body: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code,
            "message": self.message
        });
        if let Some(field) = &self.field {
            payload["field"] = Value::String(field.clone());
        }
        if let Some(status) = self.status {
            payload["status"] = json!(status);
        }
        if let Some(body) = &self.body {
            payload["body"] = body.clone();
        }
        payload
    }
}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        ToolError::new(codes::VALIDATION_FAILED, err.message.clone()).with_field(err.field)
    }
}

impl From<UpstreamError> for ToolError {
    fn from(err: UpstreamError) -> Self {
        let message = err.to_string();
        match err {
            UpstreamError::Status { status, body } => Self {
                status: Some(status),
                body: Some(body),
                ..ToolError::new(codes::UPSTREAM_ERROR, message)
            },
            UpstreamError::Transport(_) | UpstreamError::Decode(_) => {
                ToolError::new(codes::TRANSPORT_ERROR, message)
            }
        }
    }
}

fn error_text(message: &str) -> String {
    format!("{ERROR_TEXT_PREFIX}{message}")
}

fn build_tool_call_response(response: &TrendResponse) -> Value {
    json!({
        "content": [{ "type": "text", "text": format_trend_report(response) }],
        "structuredContent": response
    })
}

fn build_tool_error_response(err: &ToolError) -> Value {
    json!({
        "isError": true,
        "content": [{ "type": "text", "text": error_text(&err.message) }],
        "structuredContent": err.to_value()
    })
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
