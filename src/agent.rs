//! External question answering agent.
//!
//! The agent talks to an OpenAI-compatible chat-completions endpoint. When the
//! operator allows code execution it may call `run_sql`, which runs a polars
//! SQL query against the submitted table and feeds the result back to the model.

use crate::config::Settings;
use crate::error::AgentError;
use crate::ingest;
use crate::table::Tabular;
use log::{debug, info};
use polars::prelude::*;
use polars::sql::SQLContext;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Name the table is registered under, both in the prompt and for SQL.
pub const TABLE_NAME: &str = "df";
pub const MAX_ITERATIONS: usize = 15;
pub const PREVIEW_ROWS: usize = 5;
pub const TOOL_RESULT_ROWS: usize = 50;
const SQL_TOOL: &str = "run_sql";

/// Anything that can answer a question about a CSV dataset.
pub trait Agent {
    fn answer(&self, question: &str, dataset: &[u8]) -> Result<String, AgentError>;
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantReply,
}

#[derive(Debug, Deserialize)]
struct AssistantReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: FunctionCall,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct SqlArguments {
    query: String,
}

fn function_kind() -> String {
    "function".to_owned()
}

fn tool_definitions() -> Vec<Value> {
    vec![json!({
        "type": "function",
        "function": {
            "name": SQL_TOOL,
            "description": format!(
                "Run a SQL query against the table `{TABLE_NAME}` and return at most \
                 {TOOL_RESULT_ROWS} result rows as CSV."
            ),
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": format!("SQL SELECT statement over `{TABLE_NAME}`.")
                    }
                },
                "required": ["query"]
            }
        }
    })]
}

/// Agent backed by a hosted chat-completions model at temperature 0.
pub struct OpenAiAgent {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    allow_code_execution: bool,
    max_iterations: usize,
}

impl OpenAiAgent {
    pub fn new(settings: &Settings) -> Result<Self, AgentError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(AgentError::MissingCredential)?;
        let http = Client::builder()
            .user_agent(concat!("csv-explorer/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| AgentError::Network(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            allow_code_execution: settings.allow_code_execution,
            max_iterations: MAX_ITERATIONS,
        })
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<AssistantReply, AgentError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages,
            tools: self.allow_code_execution.then(tool_definitions),
        };
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| AgentError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Http(status.as_u16(), error_body(response.text())));
        }
        let body: ChatResponse = response
            .json()
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AgentError::MalformedResponse("response has no choices".to_owned()))
    }
}

/// Body of a failed response, or why it could not be read.
fn error_body<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

impl Agent for OpenAiAgent {
    fn answer(&self, question: &str, dataset: &[u8]) -> Result<String, AgentError> {
        let table =
            ingest::read_csv_bytes(dataset).map_err(|e| AgentError::Dataset(e.to_string()))?;
        let frame = table.data();
        let prompt = system_prompt(frame, self.allow_code_execution)
            .map_err(|e| AgentError::Dataset(e.to_string()))?;
        let mut messages = vec![
            ChatMessage::System { content: prompt },
            ChatMessage::User {
                content: question.to_owned(),
            },
        ];

        for iteration in 1..=self.max_iterations {
            let reply = self.complete(&messages)?;
            let tool_calls = reply.tool_calls.unwrap_or_default();
            if tool_calls.is_empty() {
                info!("agent answered after {iteration} round(s)");
                return reply
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| AgentError::MalformedResponse("empty answer".to_owned()));
            }
            debug!("round {iteration}: {} tool call(s)", tool_calls.len());
            let outputs: Vec<ChatMessage> = tool_calls
                .iter()
                .map(|call| ChatMessage::Tool {
                    tool_call_id: call.id.clone(),
                    content: run_tool(frame, call, self.allow_code_execution),
                })
                .collect();
            messages.push(ChatMessage::Assistant {
                content: reply.content,
                tool_calls,
            });
            messages.extend(outputs);
        }
        Err(AgentError::IterationLimit(self.max_iterations))
    }
}

fn system_prompt(frame: &DataFrame, tools: bool) -> PolarsResult<String> {
    let mut prompt = format!(
        "You are working with a table named `{TABLE_NAME}` loaded from a CSV file \
         ({} rows). Columns:\n",
        frame.height()
    );
    for series in frame.get_columns() {
        prompt.push_str(&format!("- {}: {}\n", series.name(), series.dtype()));
    }
    prompt.push_str(&format!("\nFirst {PREVIEW_ROWS} rows as CSV:\n"));
    prompt.push_str(&to_csv(&frame.head(Some(PREVIEW_ROWS)))?);
    if tools {
        prompt.push_str(&format!(
            "\nUse the `{SQL_TOOL}` tool to compute anything you need instead of guessing. "
        ));
    } else {
        prompt.push_str("\nAnswer from the information above and say so when it is not enough. ");
    }
    prompt.push_str("Reply to the user in plain text.");
    Ok(prompt)
}

fn run_tool(frame: &DataFrame, call: &ToolCall, allowed: bool) -> String {
    if call.function.name != SQL_TOOL {
        return format!("Error: unknown tool `{}`", call.function.name);
    }
    if !allowed {
        return "Error: code execution is disabled".to_owned();
    }
    let args: SqlArguments = match serde_json::from_str(&call.function.arguments) {
        Ok(args) => args,
        Err(e) => return format!("Error: invalid arguments: {e}"),
    };
    debug!("running SQL: {}", args.query);
    run_sql(frame, &args.query).unwrap_or_else(|e| format!("Error: {e}"))
}

/// Runs `query` against `frame` registered as `df`; returns up to
/// [`TOOL_RESULT_ROWS`] rows as CSV.
pub fn run_sql(frame: &DataFrame, query: &str) -> PolarsResult<String> {
    let mut ctx = SQLContext::new();
    ctx.register(TABLE_NAME, frame.clone().lazy());
    let result = ctx.execute(query)?.collect()?;
    to_csv(&result.head(Some(TOOL_RESULT_ROWS)))
}

fn to_csv(frame: &DataFrame) -> PolarsResult<String> {
    let mut frame = frame.clone();
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut frame)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
