use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{required_str, Tool, ToolError};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Runs Python code in a scratch directory and returns what it printed
pub struct CodeInterpreterTool {
    interpreter: String,
    timeout: Duration,
    /// Allow installing `libraries_used` with pip before running
    unsafe_mode: bool,
}

impl CodeInterpreterTool {
    pub fn new() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            unsafe_mode: false,
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_unsafe_mode(mut self, unsafe_mode: bool) -> Self {
        self.unsafe_mode = unsafe_mode;
        self
    }

    async fn install_libraries(&self, libraries: &[String]) -> Result<String, ToolError> {
        let mut report = String::new();
        for library in libraries {
            let output = Command::new(&self.interpreter)
                .args(["-m", "pip", "install", "--quiet", library.as_str()])
                .kill_on_drop(true)
                .output()
                .await?;
            if !output.status.success() {
                report.push_str(&format!(
                    "Failed to install {}: {}\n",
                    library,
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }
        }
        Ok(report)
    }

    async fn run_code(&self, code: &str) -> Result<String, ToolError> {
        // Removed on drop, including when the call is cancelled
        let dir = tempfile::Builder::new().prefix("merco-code-").tempdir()?;

        let child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(code)
            .current_dir(dir.path())
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(self.timeout, child).await;
        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            warn!("Failed to remove scratch directory {}: {}", path.display(), e);
        }

        let output = result.map_err(|_| ToolError::Timeout(self.timeout.as_secs()))??;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            Ok(stdout.trim_end().to_string())
        } else {
            Ok(format!(
                "Code exited with {}.\nstdout:\n{}\nstderr:\n{}",
                output.status,
                stdout.trim_end(),
                stderr.trim_end()
            ))
        }
    }
}

impl Default for CodeInterpreterTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CodeInterpreterTool {
    fn name(&self) -> &str {
        "code_interpreter"
    }

    fn description(&self) -> String {
        "Interprets Python3 code strings with a final print statement and returns its output.".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python3 code used to be interpreted. ALWAYS PRINT the final result and the output of the code"
                },
                "libraries_used": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "List of libraries used in the code with proper installing names"
                }
            },
            "required": ["code"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let code = required_str(&args, "code")?;
        let libraries: Vec<String> = args
            .get("libraries_used")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut prefix = String::new();
        if !libraries.is_empty() {
            if self.unsafe_mode {
                prefix = self.install_libraries(&libraries).await?;
            } else {
                debug!(?libraries, "Skipping library installation outside unsafe mode");
                prefix = format!(
                    "Note: libraries {:?} were not installed (unsafe mode disabled).\n",
                    libraries
                );
            }
        }

        let output = self.run_code(code).await?;
        Ok(format!("{}{}", prefix, output))
    }
}
