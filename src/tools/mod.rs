//! Tool box the model drives while solving a task.
//!
//! Tool calls arrive as a name plus JSON arguments and are parsed into the
//! [`ToolRequest`] tagged union, then dispatched with a single `match`.
//! Relative paths resolve from the run's workspace directory; absolute paths
//! are used as-is.

mod code;
mod media;
mod process;
mod web;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AgentConfig;
use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::submit::StoredValueCache;

/// Name of the tool that ends a solving round with a submission.
pub const SUBMIT_TOOL: &str = "submit_answer";

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolRequest {
    /// Fetch a page's raw HTML.
    RenderPage { url: String },
    /// Save a remote file into the workspace.
    DownloadFile {
        url: String,
        #[serde(default)]
        filename: Option<String>,
    },
    /// Submit an answer. Intercepted by the solver, never executed here.
    SubmitAnswer { url: String, payload: Value },
    RunCode { code: String },
    InstallDependency { packages: Vec<String> },
    OcrImage { path: String },
    TranscribeAudio { path: String },
    /// Base64-encode an image and cache it under a `STORED:` key.
    EncodeImage { path: String },
}

impl ToolRequest {
    /// Parse a model tool call. Empty argument strings count as `{}`.
    pub fn from_call(name: &str, arguments: &str) -> anyhow::Result<Self> {
        let arguments: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| anyhow::anyhow!("Invalid JSON arguments for '{}': {}", name, e))?
        };
        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .map_err(|e| anyhow::anyhow!("Invalid call to '{}': {}", name, e))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::RenderPage { .. } => "render_page",
            ToolRequest::DownloadFile { .. } => "download_file",
            ToolRequest::SubmitAnswer { .. } => SUBMIT_TOOL,
            ToolRequest::RunCode { .. } => "run_code",
            ToolRequest::InstallDependency { .. } => "install_dependency",
            ToolRequest::OcrImage { .. } => "ocr_image",
            ToolRequest::TranscribeAudio { .. } => "transcribe_audio",
            ToolRequest::EncodeImage { .. } => "encode_image",
        }
    }
}

/// Resolve a path relative to the workspace; absolute paths pass through.
pub fn resolve_path(path_str: &str, workspace: &Path) -> PathBuf {
    let path = Path::new(path_str);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn function(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

fn path_schema(what: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": format!("Path to the {} (relative to the workspace or absolute)", what)
            }
        },
        "required": ["path"]
    })
}

/// Definitions advertised to the model, one per [`ToolRequest`] variant.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        function(
            "render_page",
            "Fetch a web page and return its raw HTML (no JavaScript execution).",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Absolute URL to fetch"}
                },
                "required": ["url"]
            }),
        ),
        function(
            "download_file",
            "Download a file into the workspace and return its local path.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Absolute URL of the file"},
                    "filename": {"type": "string", "description": "Optional: name to save as"}
                },
                "required": ["url"]
            }),
        ),
        function(
            SUBMIT_TOOL,
            "Submit the answer for the current task to the endpoint named on the task page.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Submission endpoint URL"},
                    "payload": {
                        "type": "object",
                        "description": "JSON body, normally {\"url\": <task url>, \"answer\": <answer>}"
                    }
                },
                "required": ["url", "payload"]
            }),
        ),
        function(
            "run_code",
            "Run a Python 3 script in the workspace and return its output.",
            json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "Python source to execute"}
                },
                "required": ["code"]
            }),
        ),
        function(
            "install_dependency",
            "Install Python packages with pip.",
            json!({
                "type": "object",
                "properties": {
                    "packages": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Package names, optionally with version specifiers"
                    }
                },
                "required": ["packages"]
            }),
        ),
        function("ocr_image", "Extract text from an image file.", path_schema("image")),
        function(
            "transcribe_audio",
            "Transcribe speech from an audio file.",
            path_schema("audio file"),
        ),
        function(
            "encode_image",
            "Base64-encode an image. Returns a STORED:<key> placeholder to use as the answer.",
            path_schema("image"),
        ),
    ]
}

/// Executes tool requests for one chain run.
pub struct ToolBox {
    workspace: PathBuf,
    http: reqwest::Client,
    store: StoredValueCache,
    ocr_command: String,
    transcribe_command: String,
}

impl ToolBox {
    pub fn new(config: &AgentConfig, http: reqwest::Client, store: StoredValueCache) -> Self {
        Self {
            workspace: config.workspace_path.clone(),
            http,
            store,
            ocr_command: config.ocr_command.clone(),
            transcribe_command: config.transcribe_command.clone(),
        }
    }

    /// Run one tool. Errors are meant to be shown to the model as text.
    pub async fn execute(&self, request: &ToolRequest) -> anyhow::Result<String> {
        tracing::debug!("Executing tool {}", request.name());
        match request {
            ToolRequest::RenderPage { url } => web::render_page(&self.http, url).await,
            ToolRequest::DownloadFile { url, filename } => {
                web::download_file(&self.http, url, filename.as_deref(), &self.workspace).await
            }
            ToolRequest::SubmitAnswer { .. } => {
                anyhow::bail!("{} is handled by the chain driver", SUBMIT_TOOL)
            }
            ToolRequest::RunCode { code } => code::run_code(code, &self.workspace).await,
            ToolRequest::InstallDependency { packages } => {
                code::install_dependency(packages, &self.workspace).await
            }
            ToolRequest::OcrImage { path } => {
                let path = resolve_path(path, &self.workspace);
                media::ocr_image(&self.ocr_command, &path, &self.workspace).await
            }
            ToolRequest::TranscribeAudio { path } => {
                let path = resolve_path(path, &self.workspace);
                media::transcribe_audio(&self.transcribe_command, &path, &self.workspace).await
            }
            ToolRequest::EncodeImage { path } => {
                let path = resolve_path(path, &self.workspace);
                media::encode_image(&path, &self.store).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_calls() {
        let req = ToolRequest::from_call("render_page", r#"{"url": "https://q.example/t1"}"#).unwrap();
        assert_eq!(
            req,
            ToolRequest::RenderPage {
                url: "https://q.example/t1".into()
            }
        );

        let req = ToolRequest::from_call(
            "submit_answer",
            r#"{"url": "https://q.example/submit", "payload": {"answer": 42}}"#,
        )
        .unwrap();
        match req {
            ToolRequest::SubmitAnswer { url, payload } => {
                assert_eq!(url, "https://q.example/submit");
                assert_eq!(payload["answer"], 42);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn optional_arguments_default() {
        let req = ToolRequest::from_call("download_file", r#"{"url": "https://q.example/a.csv"}"#).unwrap();
        assert_eq!(
            req,
            ToolRequest::DownloadFile {
                url: "https://q.example/a.csv".into(),
                filename: None
            }
        );
    }

    #[test]
    fn unknown_tool_and_bad_arguments_are_errors() {
        assert!(ToolRequest::from_call("rm_rf", "{}").is_err());
        assert!(ToolRequest::from_call("run_code", "{}").is_err());
        assert!(ToolRequest::from_call("run_code", "not json").is_err());
    }

    #[test]
    fn every_definition_has_a_variant_name() {
        let names: Vec<String> = definitions().into_iter().map(|d| d.function.name).collect();
        assert_eq!(names.len(), 8);
        for name in [
            "render_page",
            "download_file",
            SUBMIT_TOOL,
            "run_code",
            "install_dependency",
            "ocr_image",
            "transcribe_audio",
            "encode_image",
        ] {
            assert!(names.iter().any(|n| n == name), "missing {}", name);
        }
    }

    #[test]
    fn resolve_path_joins_relative_only() {
        let ws = Path::new("/tmp/ws");
        assert_eq!(resolve_path("a.png", ws), PathBuf::from("/tmp/ws/a.png"));
        assert_eq!(resolve_path("/etc/hosts", ws), PathBuf::from("/etc/hosts"));
    }

    #[tokio::test]
    async fn submit_is_not_executed_by_the_tool_box() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            workspace_path: dir.path().to_path_buf(),
            ..AgentConfig::default()
        };
        let tools = ToolBox::new(&config, reqwest::Client::new(), StoredValueCache::new());
        let err = tools
            .execute(&ToolRequest::SubmitAnswer {
                url: "https://q.example".into(),
                payload: json!({}),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chain driver"));
    }
}
