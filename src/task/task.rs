use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::TaskConfig;

/// Kickoff inputs, interpolated into `{placeholder}` variables of agents and tasks
pub type Inputs = BTreeMap<String, String>;

/// Replace every `{key}` whose key is present in `inputs`; unknown placeholders stay untouched
pub fn interpolate(template: &str, inputs: &Inputs) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match inputs.get(key.trim()) {
                    Some(value) if is_placeholder(key) => result.push_str(value),
                    _ => {
                        result.push('{');
                        result.push_str(key);
                        result.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

fn is_placeholder(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// Enum to define different output format types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputFormat {
    Markdown, // Report style output written to markdown files
    Text,     // Free-form text output
    Json {
        schema: JsonSchema,
        strict: bool, // Whether to enforce strict validation (no extra fields)
    },
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Markdown
    }
}

// JSON Schema definition for validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    pub required_fields: Vec<JsonField>,
    pub optional_fields: Vec<JsonField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonField {
    pub name: String,
    pub field_type: JsonFieldType,
    pub description: Option<String>,
}

impl JsonField {
    pub fn new(name: &str, field_type: JsonFieldType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            description: Some(description.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsonFieldType {
    String,
    Number,
    Boolean,
    Array(Box<JsonFieldType>), // Array of specific type
    Object,
}

/// A unit of work with a description and expected output, bound to an agent
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub expected_output: String,
    /// Name of the agent that executes the task in a sequential crew
    pub agent: Option<String>,
    /// Names of earlier tasks whose outputs feed this one; empty means all earlier outputs
    pub context: Vec<String>,
    /// Markdown file the output is written to, relative to the crew output root
    pub output_file: Option<PathBuf>,
    pub handoff: Option<String>,
    pub output_format: OutputFormat,
}

impl Task {
    pub fn new(name: impl Into<String>, description: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent: None,
            context: Vec::new(),
            output_file: None,
            handoff: None,
            output_format: OutputFormat::Markdown,
        }
    }

    /// Build a task from its YAML record
    pub fn from_config(name: impl Into<String>, config: &TaskConfig) -> Self {
        let mut task = Self::new(name, config.description.clone(), config.expected_output.clone());
        task.agent = config.agent.clone();
        task.context = config.context.clone();
        task.output_file = config.output_file.clone();
        task.handoff = config.handoff.clone();
        task
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }

    /// Set the output file unless the YAML record already overrides it
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        if self.output_file.is_none() {
            self.output_file = Some(path.into());
        }
        self
    }

    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }

    /// Constructor for JSON output format
    pub fn new_with_json_output(
        name: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        required_fields: Vec<JsonField>,
        optional_fields: Vec<JsonField>,
        strict: bool,
    ) -> Self {
        Self::new(name, description, expected_output).with_output_format(OutputFormat::Json {
            schema: JsonSchema {
                required_fields,
                optional_fields,
            },
            strict,
        })
    }

    /// Copy of the task with inputs substituted into description and expected output
    pub fn interpolated(&self, inputs: &Inputs) -> Self {
        let mut task = self.clone();
        task.description = interpolate(&self.description, inputs);
        task.expected_output = interpolate(&self.expected_output, inputs);
        task.output_file = self
            .output_file
            .as_ref()
            .map(|path| PathBuf::from(interpolate(&path.to_string_lossy(), inputs)));
        task
    }

    /// Resolve the output file against the crew output root
    pub fn output_path(&self, root: &Path) -> Option<PathBuf> {
        self.output_file.as_ref().map(|file| root.join(file))
    }

    // Validate agent output against the expected format
    pub fn validate_output(&self, output: &str) -> Result<()> {
        match &self.output_format {
            OutputFormat::Markdown | OutputFormat::Text => {
                if output.trim().is_empty() {
                    return Err(anyhow!("Output is empty"));
                }
                Ok(())
            }
            OutputFormat::Json { schema, strict } => {
                self.validate_json_output(output, schema, *strict)
            }
        }
    }

    // JSON-specific validation
    fn validate_json_output(&self, output: &str, schema: &JsonSchema, strict: bool) -> Result<()> {
        let parsed: Value = serde_json::from_str(output.trim())
            .map_err(|e| anyhow!("Output is not valid JSON: {}", e))?;

        let obj = parsed
            .as_object()
            .ok_or_else(|| anyhow!("JSON output must be an object, got: {}", parsed))?;

        for field in &schema.required_fields {
            let value = obj
                .get(&field.name)
                .ok_or_else(|| anyhow!("Missing required field: '{}'", field.name))?;
            self.validate_field_type(value, &field.field_type, &field.name)?;
        }

        for field in &schema.optional_fields {
            if let Some(value) = obj.get(&field.name) {
                self.validate_field_type(value, &field.field_type, &field.name)?;
            }
        }

        if strict {
            let expected_fields: std::collections::HashSet<&String> = schema
                .required_fields
                .iter()
                .chain(schema.optional_fields.iter())
                .map(|f| &f.name)
                .collect();

            for key in obj.keys() {
                if !expected_fields.contains(key) {
                    return Err(anyhow!("Unexpected field in strict mode: '{}'", key));
                }
            }
        }

        Ok(())
    }

    fn validate_field_type(&self, value: &Value, expected_type: &JsonFieldType, field_name: &str) -> Result<()> {
        match expected_type {
            JsonFieldType::String => {
                if !value.is_string() {
                    return Err(anyhow!("Field '{}' must be a string, got: {}", field_name, value));
                }
            }
            JsonFieldType::Number => {
                if !value.is_number() {
                    return Err(anyhow!("Field '{}' must be a number, got: {}", field_name, value));
                }
            }
            JsonFieldType::Boolean => {
                if !value.is_boolean() {
                    return Err(anyhow!("Field '{}' must be a boolean, got: {}", field_name, value));
                }
            }
            JsonFieldType::Array(element_type) => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| anyhow!("Field '{}' must be an array, got: {}", field_name, value))?;
                for (i, element) in arr.iter().enumerate() {
                    self.validate_field_type(element, element_type, &format!("{}[{}]", field_name, i))?;
                }
            }
            JsonFieldType::Object => {
                if !value.is_object() {
                    return Err(anyhow!("Field '{}' must be an object, got: {}", field_name, value));
                }
            }
        }
        Ok(())
    }

    // Generate a prompt section describing the expected output format
    pub fn get_format_prompt(&self) -> String {
        match &self.output_format {
            OutputFormat::Markdown => {
                "Provide your final answer in Markdown, without wrapping it in a code block.".to_string()
            }
            OutputFormat::Text => "Provide your response as plain text.".to_string(),
            OutputFormat::Json { schema, strict } => {
                let mut prompt = "You must respond with valid JSON in the following format:\n\n{\n".to_string();

                for field in &schema.required_fields {
                    prompt.push_str(&format!(
                        "  \"{}\": <{}>,  // REQUIRED{}\n",
                        field.name,
                        type_to_string(&field.field_type),
                        field.description.as_ref().map(|d| format!(" - {}", d)).unwrap_or_default()
                    ));
                }

                for field in &schema.optional_fields {
                    prompt.push_str(&format!(
                        "  \"{}\": <{}>,  // OPTIONAL{}\n",
                        field.name,
                        type_to_string(&field.field_type),
                        field.description.as_ref().map(|d| format!(" - {}", d)).unwrap_or_default()
                    ));
                }

                prompt.push_str("}\n\n");

                if *strict {
                    prompt.push_str("IMPORTANT: Only include the specified fields. No additional fields are allowed.\n");
                }

                prompt.push_str("Ensure your response is valid JSON and follows this exact structure.");
                prompt
            }
        }
    }
}

fn type_to_string(field_type: &JsonFieldType) -> String {
    match field_type {
        JsonFieldType::String => "string".to_string(),
        JsonFieldType::Number => "number".to_string(),
        JsonFieldType::Boolean => "boolean".to_string(),
        JsonFieldType::Array(element_type) => format!("array of {}", type_to_string(element_type)),
        JsonFieldType::Object => "object".to_string(),
    }
}

/// Result of one executed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub task_id: String,
    pub name: String,
    pub description: String,
    pub expected_output: String,
    /// Name of the agent that produced the final answer
    pub agent: String,
    pub raw: String,
    pub output_file: Option<PathBuf>,
}

impl TaskOutput {
    pub fn to_markdown(&self) -> String {
        let mut content = self.raw.trim_end().to_string();
        content.push('\n');
        content
    }

    /// Short one-line preview for logs
    pub fn summary(&self) -> String {
        let first_line = self.raw.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
        let preview: String = first_line.chars().take(80).collect();
        format!("{} ({}): {}", self.name, self.agent, preview)
    }
}
