use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{optional_str, required_str, Tool, ToolError};

const SERPER_URL: &str = "https://google.serper.dev/search";
const DEFAULT_RESULTS: u32 = 10;
const DEFAULT_SCRAPE_CHARS: usize = 20_000;
/// Wrap width of the rendered page text
const TEXT_WIDTH: usize = 120;
/// Elements that never carry readable page content
const HIDDEN_ELEMENTS: &str = "head, script, style, noscript, template";

/// Google search through serper.dev (reads `SERPER_API_KEY`)
pub struct SerperDevTool {
    client: reqwest::Client,
    api_key: Option<String>,
    search_url: String,
    n_results: u32,
}

impl SerperDevTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            search_url: SERPER_URL.to_string(),
            n_results: DEFAULT_RESULTS,
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("SERPER_API_KEY").ok())
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    pub fn with_n_results(mut self, n_results: u32) -> Self {
        self.n_results = n_results;
        self
    }
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Deserialize)]
struct SerperResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl Tool for SerperDevTool {
    fn name(&self) -> &str {
        "search_the_internet_with_serper"
    }

    fn description(&self) -> String {
        "A tool that can be used to search the internet with a search_query. Returns titles, links and snippets of the top results.".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_query": {
                    "type": "string",
                    "description": "Mandatory search query you want to use to search the internet"
                }
            },
            "required": ["search_query"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let query = required_str(&args, "search_query")?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::MissingConfig("SERPER_API_KEY is not set".to_string()))?;

        debug!(query, "Searching with serper");
        let response = self
            .client
            .post(&self.search_url)
            .header("X-API-KEY", api_key)
            .header("Content-Type", "application/json")
            .json(&SerperRequest {
                q: query,
                num: self.n_results,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ToolError::Execution(format!(
                "search failed with {}: {}",
                status, error_text
            )));
        }

        let results: SerperResponse = response.json().await?;
        if results.organic.is_empty() {
            return Ok(format!("No results found for '{}'", query));
        }

        Ok(results
            .organic
            .iter()
            .map(|r| format!("Title: {}\nLink: {}\nSnippet: {}", r.title, r.link, r.snippet))
            .collect::<Vec<_>>()
            .join("\n---\n"))
    }
}

/// Fetches a page and returns its readable text
pub struct ScrapeWebsiteTool {
    client: reqwest::Client,
    default_url: Option<String>,
    max_chars: usize,
}

impl ScrapeWebsiteTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            default_url: None,
            max_chars: DEFAULT_SCRAPE_CHARS,
        }
    }

    /// Bind the tool to one site so the agent may call it without a URL
    pub fn with_website_url(mut self, url: impl Into<String>) -> Self {
        self.default_url = Some(url.into());
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

impl Default for ScrapeWebsiteTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Readable content of a fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub title: String,
    pub description: Option<String>,
    pub text: String,
}

impl ParsedPage {
    /// Title and description as a header above the page text
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        if !self.title.is_empty() {
            rendered.push_str(&format!("Title: {}\n", self.title));
        }
        if let Some(description) = &self.description {
            rendered.push_str(&format!("Description: {}\n", description));
        }
        if !rendered.is_empty() {
            rendered.push('\n');
        }
        rendered.push_str(&self.text);
        rendered
    }
}

/// Parse an HTML document into its title, description and text
pub fn parse_html(html: &str) -> Result<ParsedPage, ToolError> {
    let mut document = Html::parse_document(html);
    let title = extract_title(&document);
    let description = extract_description(&document);

    if let Some(hidden) = selector(HIDDEN_ELEMENTS) {
        let ids: Vec<_> = document.select(&hidden).map(|element| element.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    let rendered = html2text::from_read(document.html().as_bytes(), TEXT_WIDTH)
        .map_err(|e| ToolError::Execution(format!("could not render page text: {}", e)))?;

    Ok(ParsedPage {
        title,
        description,
        text: clean_text(&rendered),
    })
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    let element = document.select(&selector).next()?;
    let text = element.text().collect::<String>().trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn first_content(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    let content = document.select(&selector).next()?.value().attr("content")?.trim();
    (!content.is_empty()).then(|| content.to_string())
}

// <title>, then og:title, then the first <h1>
fn extract_title(document: &Html) -> String {
    first_text(document, "title")
        .or_else(|| first_content(document, r#"meta[property="og:title"]"#))
        .or_else(|| first_text(document, "h1"))
        .unwrap_or_default()
}

fn extract_description(document: &Html) -> Option<String> {
    first_content(document, r#"meta[name="description"]"#)
        .or_else(|| first_content(document, r#"meta[property="og:description"]"#))
}

/// Trim trailing spaces and keep at most one blank line between blocks
fn clean_text(rendered: &str) -> String {
    let mut result = String::with_capacity(rendered.len());
    let mut blank = false;
    for line in rendered.lines() {
        let line = line.replace('\u{a0}', " ");
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !blank && !result.is_empty() {
                result.push('\n');
            }
            blank = true;
        } else {
            blank = false;
            result.push_str(line);
            result.push('\n');
        }
    }
    result.trim().to_string()
}

#[async_trait]
impl Tool for ScrapeWebsiteTool {
    fn name(&self) -> &str {
        "read_website_content"
    }

    fn description(&self) -> String {
        match &self.default_url {
            Some(url) => format!("A tool that can be used to read the content of {}.", url),
            None => "A tool that can be used to read a website content. Pass the full website_url.".to_string(),
        }
    }

    fn parameters(&self) -> Value {
        let required: Vec<&str> = if self.default_url.is_some() {
            Vec::new()
        } else {
            vec!["website_url"]
        };
        json!({
            "type": "object",
            "properties": {
                "website_url": {
                    "type": "string",
                    "description": "Mandatory website url to read the file"
                }
            },
            "required": required
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let url = optional_str(&args, "website_url")
            .or(self.default_url.as_deref())
            .ok_or_else(|| ToolError::InvalidArguments("missing string field 'website_url'".to_string()))?;

        debug!(url, "Scraping website");
        let response = self
            .client
            .get(url)
            .header(
                "User-Agent",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::Execution(format!(
                "fetching {} returned {}",
                url,
                response.status()
            )));
        }

        let body = response.text().await?;
        let page = parse_html(&body)?;
        Ok(page.render().chars().take(self.max_chars).collect())
    }
}
