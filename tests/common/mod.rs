#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use docs_agent_rs::channel::{
    ADD_ISSUE_COMMENT, CREATE_BRANCH, CREATE_OR_UPDATE_FILE, CREATE_PULL_REQUEST, ChannelError,
    GET_FILE_CONTENTS, GET_ISSUE, ToolCall, ToolChannel, ToolResult, ToolSpec,
};
use docs_agent_rs::llm::{AgentTurn, LanguageModel, ModelError, ModelReply};
use docs_agent_rs::request::{DocumentationRequest, RepositoryRef};
use docs_agent_rs::trigger::IssueEvent;
use serde_json::{Value, json};

pub fn issue_event(number: u64, title: &str, body: &str) -> IssueEvent {
    IssueEvent::from_json(
        &json!({
            "action": "opened",
            "issue": { "number": number, "title": title, "body": body },
            "repository": { "name": "widgets", "owner": { "login": "octo" } }
        })
        .to_string(),
    )
    .unwrap()
}

pub fn request(number: u64, title: &str, body: &str) -> DocumentationRequest {
    DocumentationRequest::parse(
        format!("octo/widgets#{number}"),
        RepositoryRef {
            owner: "octo".into(),
            name: "widgets".into(),
        },
        number,
        "[Docs Agent]",
        title,
        body,
    )
}

pub fn read_call(id: &str, path: &str) -> ToolCall {
    ToolCall::new(id, GET_FILE_CONTENTS, json!({"owner": "octo", "repo": "widgets", "path": path}))
}

pub fn answer_with_file(path: &str, content: &str) -> String {
    format!("Documented the module.\n\n````markdown path={path}\n{content}````\n")
}

/// A model that replays a fixed script and records what it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
    /// Reply once the script runs out; `None` means keep asking for a tool
    fallback: Option<ModelReply>,
    pub calls: Mutex<Vec<Vec<AgentTurn>>>,
    pub offered_tools: Mutex<Vec<String>>,
    delay: Option<Duration>,
    hook: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
            offered_tools: Mutex::new(Vec::new()),
            delay: None,
            hook: None,
        }
    }

    /// Run `hook` with the 1-based call number before each reply.
    pub fn on_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn with_results(replies: Vec<Result<ModelReply, ModelError>>) -> Self {
        let model = Self::new(Vec::new());
        *model.replies.lock().unwrap() = replies.into_iter().collect();
        model
    }

    /// A model that never stops asking to read README.md.
    pub fn endless_reader() -> Self {
        Self::new(Vec::new())
    }

    pub fn slow(delay: Duration, reply: ModelReply) -> Self {
        let mut model = Self::new(vec![reply]);
        model.delay = Some(delay);
        model
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        _system: &str,
        turns: &[AgentTurn],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(turns.to_vec());
            calls.len()
        };
        *self.offered_tools.lock().unwrap() = tools.iter().map(|t| t.name.clone()).collect();
        if let Some(hook) = &self.hook {
            hook(n);
        }

        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Ok(self.fallback.clone().unwrap_or_else(|| {
                ModelReply::with_tool_calls(vec![read_call(&format!("toolu_{n}"), "README.md")])
            })),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    sha: String,
    content: String,
}

/// An in-memory repository behind the tool-channel interface.
pub struct FakeRepository {
    tools: Vec<ToolSpec>,
    /// (branch, path) -> file
    files: Mutex<HashMap<(String, String), StoredFile>>,
    branches: Mutex<Vec<String>>,
    next_sha: Mutex<u64>,
    pub calls: Mutex<Vec<ToolCall>>,
    pub comments: Mutex<Vec<String>>,
    /// Head branches with an open pull request
    open_pulls: Mutex<Vec<String>>,
    /// When set, every read fails with this message
    read_error: Mutex<Option<String>>,
    unavailable: bool,
}

pub const ALL_TOOLS: [&str; 6] = [
    GET_FILE_CONTENTS,
    CREATE_OR_UPDATE_FILE,
    CREATE_BRANCH,
    CREATE_PULL_REQUEST,
    GET_ISSUE,
    ADD_ISSUE_COMMENT,
];

impl FakeRepository {
    pub fn new() -> Self {
        Self::with_tools(&ALL_TOOLS)
    }

    pub fn with_tools(names: &[&str]) -> Self {
        Self {
            tools: names
                .iter()
                .map(|name| ToolSpec {
                    name: name.to_string(),
                    description: format!("{name} tool"),
                    input_schema: json!({"type": "object"}),
                })
                .collect(),
            files: Mutex::new(HashMap::new()),
            branches: Mutex::new(vec!["main".to_string()]),
            next_sha: Mutex::new(1),
            calls: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
            open_pulls: Mutex::new(Vec::new()),
            read_error: Mutex::new(None),
            unavailable: false,
        }
    }

    /// A server that never answers: every call times out.
    pub fn unreachable() -> Self {
        let mut repo = Self::new();
        repo.unavailable = true;
        repo
    }

    /// Write a file on `main` as someone else would, returning its new sha.
    pub fn put(&self, path: &str, content: &str) -> String {
        self.write("main", path, content)
    }

    /// Make every following read fail the way a rate-limited server does.
    pub fn fail_reads_with(&self, message: &str) {
        *self.read_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn sha(&self, branch: &str, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&(branch.to_string(), path.to_string()))
            .map(|f| f.sha.clone())
    }

    pub fn content(&self, branch: &str, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&(branch.to_string(), path.to_string()))
            .map(|f| f.content.clone())
    }

    pub fn calls_to(&self, tool: &str) -> Vec<ToolCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tool_name == tool)
            .cloned()
            .collect()
    }

    fn write(&self, branch: &str, path: &str, content: &str) -> String {
        let sha = {
            let mut next = self.next_sha.lock().unwrap();
            *next += 1;
            format!("sha-{next}")
        };
        self.files.lock().unwrap().insert(
            (branch.to_string(), path.to_string()),
            StoredFile {
                sha: sha.clone(),
                content: content.to_string(),
            },
        );
        sha
    }

    fn handle(&self, call: &ToolCall) -> ToolResult {
        let arg = |name: &str| {
            call.arguments
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let branch = arg("branch").unwrap_or_else(|| "main".to_string());

        match call.tool_name.as_str() {
            GET_FILE_CONTENTS => {
                if let Some(message) = self.read_error.lock().unwrap().clone() {
                    return ToolResult::failure(call, message);
                }
                let path = arg("path").unwrap_or_default();
                let files = self.files.lock().unwrap();
                match files.get(&(branch, path.clone())) {
                    Some(file) => ToolResult::success(
                        call,
                        json!({"path": path, "sha": file.sha, "content": file.content}).to_string(),
                    ),
                    None => ToolResult::failure(call, "file_not_found"),
                }
            }
            CREATE_OR_UPDATE_FILE => {
                let path = arg("path").unwrap_or_default();
                if !self.branches.lock().unwrap().contains(&branch) {
                    return ToolResult::failure(call, "branch not found");
                }
                if self.sha(&branch, &path) != arg("sha") {
                    return ToolResult::failure(call, "409: sha does not match");
                }
                let sha = self.write(&branch, &path, &arg("content").unwrap_or_default());
                ToolResult::success(call, json!({"path": path, "sha": sha}).to_string())
            }
            CREATE_BRANCH => {
                let new_branch = arg("branch").unwrap_or_default();
                let from = arg("from_branch").unwrap_or_else(|| "main".to_string());
                let mut branches = self.branches.lock().unwrap();
                if branches.contains(&new_branch) {
                    return ToolResult::failure(call, "Reference already exists");
                }
                branches.push(new_branch.clone());
                let mut files = self.files.lock().unwrap();
                let copied: Vec<_> = files
                    .iter()
                    .filter(|((b, _), _)| *b == from)
                    .map(|((_, p), f)| ((new_branch.clone(), p.clone()), f.clone()))
                    .collect();
                files.extend(copied);
                ToolResult::success(call, json!({"branch": new_branch}).to_string())
            }
            CREATE_PULL_REQUEST => {
                let head = arg("head").unwrap_or_default();
                let mut open = self.open_pulls.lock().unwrap();
                if open.contains(&head) {
                    return ToolResult::failure(
                        call,
                        format!("422: Validation Failed: A pull request already exists for octo:{head}."),
                    );
                }
                open.push(head);
                ToolResult::success(
                    call,
                    json!({"number": 7, "html_url": "https://github.com/octo/widgets/pull/7"}).to_string(),
                )
            }
            ADD_ISSUE_COMMENT => {
                self.comments
                    .lock()
                    .unwrap()
                    .push(arg("body").unwrap_or_default());
                ToolResult::success(call, "{}")
            }
            other => ToolResult::failure(call, format!("unknown tool {other}")),
        }
    }
}

#[async_trait]
impl ToolChannel for FakeRepository {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ChannelError> {
        Ok(self.tools.clone())
    }

    async fn call(&self, call: &ToolCall) -> Result<ToolResult, ChannelError> {
        self.calls.lock().unwrap().push(call.clone());
        if self.unavailable {
            return Err(ChannelError::Unavailable(format!(
                "{} timed out after 60s",
                call.tool_name
            )));
        }
        Ok(self.handle(call))
    }
}
