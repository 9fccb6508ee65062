use regex::Regex;
use std::sync::OnceLock;

/// Fence languages treated as a wrapper around the whole answer
const WRAPPER_FENCES: &[&str] = &["```", "```markdown", "```md", "```json", "```text"];

fn reasoning_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid reasoning regex"))
}

/// Output Handler for cleaning up raw model answers before validation
#[derive(Debug, Clone)]
pub struct OutputHandler {
    /// Drop `<think>...</think>` blocks emitted by reasoning models
    pub strip_reasoning: bool,
    /// Remove a code fence wrapping the entire answer
    pub unwrap_fences: bool,
}

impl OutputHandler {
    pub fn new() -> Self {
        Self {
            strip_reasoning: true,
            unwrap_fences: true,
        }
    }

    /// Clean a raw answer without validating it
    pub fn clean(&self, raw_output: &str) -> String {
        let mut output = if self.strip_reasoning {
            reasoning_block().replace_all(raw_output, "").into_owned()
        } else {
            raw_output.to_string()
        };

        if self.unwrap_fences {
            output = unwrap_fence(&output);
        }

        output.trim().to_string()
    }

    /// Clean the answer and reject empty results
    pub fn process_output(&self, raw_output: &str) -> Result<String, String> {
        let output = self.clean(raw_output);
        if output.is_empty() {
            return Err("Output cannot be empty".to_string());
        }
        Ok(output)
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn unwrap_fence(output: &str) -> String {
    let trimmed = output.trim();
    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() < 2 {
        return trimmed.to_string();
    }

    let opening = lines[0].trim().to_ascii_lowercase();
    let closing = lines[lines.len() - 1].trim();
    if WRAPPER_FENCES.contains(&opening.as_str()) && closing == "```" {
        lines[1..lines.len() - 1].join("\n")
    } else {
        trimmed.to_string()
    }
}
