use anyhow::Result;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use octocrab::Octocrab;
use octocrab::models::repos::Object;
use octocrab::params::repos::Reference;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::time::{Duration, sleep};

/// A file read from a repository
#[derive(Debug, Clone)]
pub struct FileContents {
    pub path: String,
    pub sha: String,
    pub content: String,
}

/// A pull request that was opened
#[derive(Debug, Clone)]
pub struct OpenedPullRequest {
    pub number: u64,
    pub html_url: Option<String>,
}

/// GitHub connector that handles authentication and repository operations
#[derive(Clone)]
pub struct GitHubConnector {
    client: Arc<Octocrab>,
    // Semaphore to limit concurrent requests to GitHub API
    request_semaphore: Arc<Semaphore>,
    // Counter for API requests to track rate limiting
    request_count: Arc<AtomicUsize>,
}

impl GitHubConnector {
    pub fn new(token: Option<&str>, max_concurrent_requests: usize) -> Result<Self> {
        let mut builder = Octocrab::builder();

        // Set personal access token if provided
        if let Some(token) = token {
            if token.trim().is_empty() {
                anyhow::bail!("Personal access token cannot be empty");
            }
            tracing::info!("Using personal access token for GitHub API");
            builder = builder.personal_token(token.to_string());
        }

        let client = builder.build()?;

        Ok(Self {
            client: Arc::new(client),
            request_semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            request_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of GitHub API requests issued so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get a file from the repository with retry logic.
    /// Returns `Ok(None)` when the file does not exist.
    pub async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Option<FileContents>> {
        let _permit = self.request_semaphore.clone().acquire_owned().await?;

        // Retry with exponential backoff
        let max_retries = 3;
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(100);

        loop {
            self.request_count.fetch_add(1, Ordering::SeqCst);

            match self.fetch_file(owner, repo, path, branch).await {
                Ok(file) => return Ok(file),
                Err(e) if retry_count < max_retries => {
                    retry_count += 1;
                    tracing::warn!("Retry {}/{} for file {}: {}", retry_count, max_retries, path, e);
                    sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Helper method to fetch a single file from GitHub
    async fn fetch_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Option<FileContents>> {
        let repos = self.client.repos(owner, repo);
        let mut request = repos.get_content().path(path);
        if let Some(branch) = branch {
            request = request.r#ref(branch);
        }

        let content = match request.send().await {
            Ok(content) => content,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let Some(file) = content.items.into_iter().find(|item| item.r#type == "file") else {
            // A directory, submodule or symlink: nothing we can document in place
            return Ok(None);
        };

        let encoded = file.content.unwrap_or_default();
        let decoded = STANDARD.decode(encoded.replace('\n', ""))?;

        Ok(Some(FileContents {
            path: file.path,
            sha: file.sha,
            content: String::from_utf8(decoded)?,
        }))
    }

    /// Create a file, or update it when `sha` names the version being replaced.
    /// Returns the sha of the new blob.
    #[allow(clippy::too_many_arguments)]
    pub async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
        sha: Option<&str>,
    ) -> Result<String> {
        let _permit = self.request_semaphore.clone().acquire_owned().await?;
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let repos = self.client.repos(owner, repo);
        let update = match sha {
            Some(sha) => {
                repos
                    .update_file(path, message, content, sha)
                    .branch(branch)
                    .send()
                    .await?
            }
            None => {
                repos
                    .create_file(path, message, content)
                    .branch(branch)
                    .send()
                    .await?
            }
        };

        Ok(update.content.sha)
    }

    /// Create `branch` pointing at the head of `from_branch`, or the default branch.
    pub async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        from_branch: Option<&str>,
    ) -> Result<String> {
        let _permit = self.request_semaphore.clone().acquire_owned().await?;
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let repos = self.client.repos(owner, repo);
        let from = match from_branch {
            Some(from) => from.to_string(),
            None => repos
                .get()
                .await?
                .default_branch
                .unwrap_or_else(|| "main".to_string()),
        };

        let head = repos.get_ref(&Reference::Branch(from.clone())).await?;
        let sha = match head.object {
            Object::Commit { sha, .. } | Object::Tag { sha, .. } => sha,
            #[allow(unreachable_patterns)]
            _ => anyhow::bail!("Branch {} does not point at a commit", from),
        };

        repos
            .create_ref(&Reference::Branch(branch.to_string()), sha.clone())
            .await?;
        tracing::info!("Created branch {} from {} at {}", branch, from, sha);
        Ok(sha)
    }

    pub async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<OpenedPullRequest> {
        let _permit = self.request_semaphore.clone().acquire_owned().await?;
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let created = self
            .client
            .pulls(owner, repo)
            .create(title, head, base)
            .body(body)
            .send()
            .await;

        let pr = match created {
            Ok(pr) => pr,
            // 422 when a pull request from `head` is already open: hand that one back
            Err(e) if is_unprocessable(&e) => {
                self.request_count.fetch_add(1, Ordering::SeqCst);
                let open = self
                    .client
                    .pulls(owner, repo)
                    .list()
                    .state(octocrab::params::State::Open)
                    .head(format!("{owner}:{head}"))
                    .base(base)
                    .send()
                    .await?;
                match open.items.into_iter().next() {
                    Some(pr) => {
                        tracing::info!("Reusing open pull request #{} from {}", pr.number, head);
                        pr
                    }
                    None => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        Ok(OpenedPullRequest {
            number: pr.number,
            html_url: pr.html_url.map(|url| url.to_string()),
        })
    }

    /// Title and body of an issue
    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<(String, String)> {
        let _permit = self.request_semaphore.clone().acquire_owned().await?;
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let issue = self.client.issues(owner, repo).get(number).await?;
        Ok((issue.title, issue.body.unwrap_or_default()))
    }

    /// Comment on an issue, returning the comment URL
    pub async fn add_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<String> {
        let _permit = self.request_semaphore.clone().acquire_owned().await?;
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let comment = self
            .client
            .issues(owner, repo)
            .create_comment(number, body)
            .await?;
        Ok(comment.html_url.to_string())
    }
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}

fn is_unprocessable(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 422)
}
