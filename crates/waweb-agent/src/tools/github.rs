//! GitHub repository tools backed by the REST API.
//!
//! One `GithubClient` is shared by all requests; `tools(token)` binds a
//! user's token to a fresh tool set for a single reply. The token only ever
//! travels in the `Authorization` header.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use waweb_core::config::GithubConfig;

use crate::prompt::truncate_content;

use super::{Tool, ToolResult};

/// Cap on text handed back to the model per call.
const MAX_OUTPUT_CHARS: usize = 12_000;
const USER_AGENT: &str = concat!("waweb/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

/// Shared HTTP client for api.github.com (or a GitHub Enterprise base).
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
}

impl GithubClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &GithubConfig) -> Result<Self, reqwest::Error> {
        Self::new(&cfg.api_url, Duration::from_secs(cfg.timeout_secs))
    }

    /// Every GitHub tool, authenticated as the owner of `token`.
    pub fn tools(&self, token: &str) -> Vec<Box<dyn Tool>> {
        let api = Arc::new(GithubApi {
            http: self.http.clone(),
            api_url: self.api_url.clone(),
            token: token.to_string(),
        });
        GithubOp::ALL
            .iter()
            .map(|&op| {
                Box::new(GithubTool {
                    api: Arc::clone(&api),
                    op,
                }) as Box<dyn Tool>
            })
            .collect()
    }
}

struct GithubApi {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GithubApi {
    /// Send one request; non-2xx becomes `Err` with GitHub's message.
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, String> {
        let url = format!("{}{}", self.api_url, path);
        debug!(%method, path, "GitHub API request");

        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| format!("GitHub request failed: {e}"))?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let value: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status.is_success() {
            Ok(value)
        } else {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));
            Err(format!("GitHub API {}: {}", status.as_u16(), message))
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, String> {
        self.call(Method::GET, path, query, None).await
    }

    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, String> {
        let info = self.get(&format!("/repos/{owner}/{repo}"), &[]).await?;
        Ok(info["default_branch"].as_str().unwrap_or("main").to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GithubOp {
    GetAuthenticatedUser,
    CreateRepo,
    GetRepo,
    ListRepoContent,
    GetFile,
    CreateOrUpdateFile,
    ListBranches,
    CreateBranch,
    GetLatestCommit,
    MergeBranches,
    SearchRepos,
}

impl GithubOp {
    const ALL: [GithubOp; 11] = [
        GithubOp::GetAuthenticatedUser,
        GithubOp::CreateRepo,
        GithubOp::GetRepo,
        GithubOp::ListRepoContent,
        GithubOp::GetFile,
        GithubOp::CreateOrUpdateFile,
        GithubOp::ListBranches,
        GithubOp::CreateBranch,
        GithubOp::GetLatestCommit,
        GithubOp::MergeBranches,
        GithubOp::SearchRepos,
    ];
}

struct GithubTool {
    api: Arc<GithubApi>,
    op: GithubOp,
}

#[async_trait]
impl Tool for GithubTool {
    fn name(&self) -> &str {
        match self.op {
            GithubOp::GetAuthenticatedUser => "get_authenticated_user",
            GithubOp::CreateRepo => "create_repo",
            GithubOp::GetRepo => "get_repo",
            GithubOp::ListRepoContent => "list_repo_content",
            GithubOp::GetFile => "get_file",
            GithubOp::CreateOrUpdateFile => "create_or_update_file",
            GithubOp::ListBranches => "list_branches",
            GithubOp::CreateBranch => "create_branch",
            GithubOp::GetLatestCommit => "get_latest_commit",
            GithubOp::MergeBranches => "merge_branches",
            GithubOp::SearchRepos => "search_repos",
        }
    }

    fn description(&self) -> &str {
        match self.op {
            GithubOp::GetAuthenticatedUser => {
                "Get the login of the GitHub account the user linked. Use it as `owner` for their own repositories."
            }
            GithubOp::CreateRepo => "Create a new repository in the linked account.",
            GithubOp::GetRepo => "Fetch details of a repository, including its default branch.",
            GithubOp::ListRepoContent => "List files and folders at a path in a repository.",
            GithubOp::GetFile => "Fetch the text contents of a file in a repository.",
            GithubOp::CreateOrUpdateFile => {
                "Create a file or overwrite an existing one with a single commit."
            }
            GithubOp::ListBranches => "List the branches of a repository.",
            GithubOp::CreateBranch => {
                "Create a branch from another branch (the default branch when `from` is omitted)."
            }
            GithubOp::GetLatestCommit => "Get the latest commit on a branch.",
            GithubOp::MergeBranches => "Merge the `head` branch into the `base` branch.",
            GithubOp::SearchRepos => "Search public GitHub repositories by keyword.",
        }
    }

    fn input_schema(&self) -> Value {
        let owner = json!({ "type": "string", "description": "Account or organisation that owns the repository." });
        let repo = json!({ "type": "string", "description": "Repository name." });
        let git_ref = json!({ "type": "string", "description": "Branch, tag or commit (optional; default branch when omitted)." });
        match self.op {
            GithubOp::GetAuthenticatedUser => json!({ "type": "object", "properties": {} }),
            GithubOp::CreateRepo => json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Repository name." },
                    "description": { "type": "string" },
                    "private": { "type": "boolean" },
                    "auto_init": { "type": "boolean", "description": "Create an initial commit with a README." }
                },
                "required": ["name"]
            }),
            GithubOp::GetRepo | GithubOp::ListBranches => json!({
                "type": "object",
                "properties": { "owner": owner, "repo": repo },
                "required": ["owner", "repo"]
            }),
            GithubOp::ListRepoContent => json!({
                "type": "object",
                "properties": {
                    "owner": owner,
                    "repo": repo,
                    "path": { "type": "string", "description": "Directory path; empty for the root." },
                    "ref": git_ref
                },
                "required": ["owner", "repo"]
            }),
            GithubOp::GetFile => json!({
                "type": "object",
                "properties": {
                    "owner": owner,
                    "repo": repo,
                    "path": { "type": "string" },
                    "ref": git_ref
                },
                "required": ["owner", "repo", "path"]
            }),
            GithubOp::CreateOrUpdateFile => json!({
                "type": "object",
                "properties": {
                    "owner": owner,
                    "repo": repo,
                    "path": { "type": "string" },
                    "content": { "type": "string", "description": "Full new file contents." },
                    "message": { "type": "string", "description": "Commit message." },
                    "branch": { "type": "string" }
                },
                "required": ["owner", "repo", "path", "content", "message"]
            }),
            GithubOp::CreateBranch => json!({
                "type": "object",
                "properties": {
                    "owner": owner,
                    "repo": repo,
                    "branch": { "type": "string", "description": "Name of the new branch." },
                    "from": { "type": "string", "description": "Source branch." }
                },
                "required": ["owner", "repo", "branch"]
            }),
            GithubOp::GetLatestCommit => json!({
                "type": "object",
                "properties": { "owner": owner, "repo": repo, "branch": { "type": "string" } },
                "required": ["owner", "repo"]
            }),
            GithubOp::MergeBranches => json!({
                "type": "object",
                "properties": {
                    "owner": owner,
                    "repo": repo,
                    "base": { "type": "string", "description": "Branch to merge into." },
                    "head": { "type": "string", "description": "Branch to merge from." },
                    "message": { "type": "string" }
                },
                "required": ["owner", "repo", "base", "head"]
            }),
            GithubOp::SearchRepos => json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> ToolResult {
        match self.run(&input).await {
            Ok(value) => ToolResult::success(render(&value)),
            Err(e) => ToolResult::error(e),
        }
    }
}

impl GithubTool {
    async fn run(&self, input: &Value) -> Result<Value, String> {
        let api = &self.api;
        match self.op {
            GithubOp::GetAuthenticatedUser => {
                let user = api.get("/user", &[]).await?;
                Ok(pick(&user, &["login", "name", "html_url", "public_repos"]))
            }
            GithubOp::CreateRepo => {
                let name = required(input, "name")?;
                let body = json!({
                    "name": name,
                    "description": optional(input, "description").unwrap_or(""),
                    "private": input["private"].as_bool().unwrap_or(false),
                    "auto_init": input["auto_init"].as_bool().unwrap_or(true),
                });
                let repo = api.call(Method::POST, "/user/repos", &[], Some(body)).await?;
                Ok(pick(&repo, REPO_FIELDS))
            }
            GithubOp::GetRepo => {
                let (owner, repo) = owner_repo(input)?;
                let info = api.get(&format!("/repos/{owner}/{repo}"), &[]).await?;
                Ok(pick(&info, REPO_FIELDS))
            }
            GithubOp::ListRepoContent => {
                let (owner, repo) = owner_repo(input)?;
                let path = repo_path(optional(input, "path").unwrap_or(""))?;
                let query = ref_query(input);
                let listing = api
                    .get(&format!("/repos/{owner}/{repo}/contents/{path}"), &query)
                    .await?;
                let entries = match listing {
                    Value::Array(items) => items
                        .iter()
                        .map(|e| pick(e, &["name", "path", "type", "size"]))
                        .collect(),
                    single => vec![pick(&single, &["name", "path", "type", "size"])],
                };
                Ok(Value::Array(entries))
            }
            GithubOp::GetFile => {
                let (owner, repo) = owner_repo(input)?;
                let path = repo_path(required(input, "path")?)?;
                let query = ref_query(input);
                let file = api
                    .get(&format!("/repos/{owner}/{repo}/contents/{path}"), &query)
                    .await?;
                Ok(Value::String(decode_file(&file)?))
            }
            GithubOp::CreateOrUpdateFile => {
                let (owner, repo) = owner_repo(input)?;
                let path = repo_path(required(input, "path")?)?;
                let content = input["content"]
                    .as_str()
                    .ok_or("missing required parameter: content")?;
                let message = required(input, "message")?;
                let branch = optional(input, "branch");
                let endpoint = format!("/repos/{owner}/{repo}/contents/{path}");

                // Overwriting needs the current blob sha.
                let lookup: Vec<(&str, &str)> = branch.map(|b| vec![("ref", b)]).unwrap_or_default();
                let existing_sha = api
                    .get(&endpoint, &lookup)
                    .await
                    .ok()
                    .and_then(|f| f["sha"].as_str().map(str::to_string));

                let mut body = json!({
                    "message": message,
                    "content": base64::engine::general_purpose::STANDARD.encode(content),
                });
                if let Some(branch) = branch {
                    body["branch"] = json!(branch);
                }
                if let Some(sha) = &existing_sha {
                    body["sha"] = json!(sha);
                }
                let out = api.call(Method::PUT, &endpoint, &[], Some(body)).await?;
                Ok(json!({
                    "action": if existing_sha.is_some() { "updated" } else { "created" },
                    "path": out["content"]["path"],
                    "html_url": out["content"]["html_url"],
                    "commit": out["commit"]["sha"],
                }))
            }
            GithubOp::ListBranches => {
                let (owner, repo) = owner_repo(input)?;
                let branches = api
                    .get(&format!("/repos/{owner}/{repo}/branches"), &[("per_page", "100")])
                    .await?;
                let names: Vec<Value> = branches
                    .as_array()
                    .map(|b| b.iter().map(|b| b["name"].clone()).collect())
                    .unwrap_or_default();
                Ok(Value::Array(names))
            }
            GithubOp::CreateBranch => {
                let (owner, repo) = owner_repo(input)?;
                let branch = required(input, "branch")?;
                let from = match optional(input, "from") {
                    Some(f) => f.to_string(),
                    None => api.default_branch(owner, repo).await?,
                };
                let source = api
                    .get(&format!("/repos/{owner}/{repo}/git/ref/heads/{from}"), &[])
                    .await?;
                let sha = source["object"]["sha"]
                    .as_str()
                    .ok_or_else(|| format!("branch {from} has no commit sha"))?;
                let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
                let created = api
                    .call(Method::POST, &format!("/repos/{owner}/{repo}/git/refs"), &[], Some(body))
                    .await?;
                Ok(json!({ "ref": created["ref"], "sha": sha, "from": from }))
            }
            GithubOp::GetLatestCommit => {
                let (owner, repo) = owner_repo(input)?;
                let branch = match optional(input, "branch") {
                    Some(b) => b.to_string(),
                    None => api.default_branch(owner, repo).await?,
                };
                let commit = api
                    .get(&format!("/repos/{owner}/{repo}/commits/{branch}"), &[])
                    .await?;
                Ok(json!({
                    "sha": commit["sha"],
                    "message": commit["commit"]["message"],
                    "author": commit["commit"]["author"]["name"],
                    "date": commit["commit"]["author"]["date"],
                    "html_url": commit["html_url"],
                }))
            }
            GithubOp::MergeBranches => {
                let (owner, repo) = owner_repo(input)?;
                let mut body = json!({
                    "base": required(input, "base")?,
                    "head": required(input, "head")?,
                });
                if let Some(message) = optional(input, "message") {
                    body["commit_message"] = json!(message);
                }
                let merged = api
                    .call(Method::POST, &format!("/repos/{owner}/{repo}/merges"), &[], Some(body))
                    .await?;
                // 204: nothing to merge.
                if merged.is_null() {
                    return Ok(json!({ "merged": false, "reason": "already up to date" }));
                }
                Ok(json!({ "merged": true, "sha": merged["sha"], "html_url": merged["html_url"] }))
            }
            GithubOp::SearchRepos => {
                let query = required(input, "query")?;
                let found = api
                    .get("/search/repositories", &[("q", query), ("per_page", "10")])
                    .await?;
                let items: Vec<Value> = found["items"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|r| pick(r, &["full_name", "description", "html_url", "stargazers_count"]))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(json!({ "total_count": found["total_count"], "items": items }))
            }
        }
    }
}

const REPO_FIELDS: &[&str] = &[
    "full_name",
    "description",
    "private",
    "html_url",
    "default_branch",
    "language",
    "stargazers_count",
];

fn required<'a>(input: &'a Value, key: &str) -> Result<&'a str, String> {
    optional(input, key).ok_or_else(|| format!("missing required parameter: {key}"))
}

/// Non-blank string parameter. Models often send "" for unset options.
fn optional<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn owner_repo(input: &Value) -> Result<(&str, &str), String> {
    let owner = required(input, "owner")?;
    let repo = required(input, "repo")?;
    for (key, value) in [("owner", owner), ("repo", repo)] {
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(format!("invalid {key}: {value}"));
        }
    }
    Ok((owner, repo))
}

/// Repository-relative path, without leading slash or `..` segments.
fn repo_path(path: &str) -> Result<String, String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.split('/').any(|seg| seg == "..") {
        return Err(format!("invalid path: {path}"));
    }
    Ok(trimmed.to_string())
}

fn ref_query(input: &Value) -> Vec<(&str, &str)> {
    optional(input, "ref")
        .map(|r| vec![("ref", r)])
        .unwrap_or_default()
}

fn decode_file(file: &Value) -> Result<String, String> {
    if file.is_array() {
        return Err("path is a directory; use list_repo_content".to_string());
    }
    let encoded: String = file["content"]
        .as_str()
        .ok_or("file has no inline content (too large or not a file)")?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| format!("could not decode file: {e}"))?;
    String::from_utf8(bytes).map_err(|_| "file is not UTF-8 text".to_string())
}

fn pick(value: &Value, keys: &[&str]) -> Value {
    let picked: serde_json::Map<String, Value> = keys
        .iter()
        .filter_map(|k| value.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect();
    Value::Object(picked)
}

fn render(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    truncate_content(&text, MAX_OUTPUT_CHARS)
}
