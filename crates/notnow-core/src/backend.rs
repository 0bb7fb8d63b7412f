use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::replay::{CommentSource, IssueSource};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("issue #{0} not found")]
    IssueNotFound(u64),
    #[error("issue backend error: {0}")]
    Remote(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueFilter {
    Open,
    Closed,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<String>,
    pub open: bool,
}

impl Issue {
    pub fn source(&self) -> IssueSource {
        IssueSource {
            number: self.number,
            title: self.title.clone(),
            body: self.body.clone(),
            created_at: self.created_at,
            author: self.author.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub issue_number: u64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<String>,
}

impl Comment {
    pub fn source(&self) -> CommentSource {
        CommentSource {
            body: self.body.clone(),
            created_at: self.created_at,
            author: self.author.clone(),
        }
    }
}

/// Remote issue tracker seen by the core. Implementations own transport,
/// authentication and retries; the core never retries a failed call.
#[async_trait]
pub trait IssueBackend: Send + Sync {
    async fn fetch_issue(&self, number: u64) -> Result<Issue, BackendError>;
    async fn fetch_issues(&self, filter: IssueFilter) -> Result<Vec<Issue>, BackendError>;
    async fn fetch_comments(&self, number: u64) -> Result<Vec<Comment>, BackendError>;
    async fn create_issue(&self, title: &str, body: &str) -> Result<Issue, BackendError>;
    async fn post_comment(&self, number: u64, body: &str) -> Result<Comment, BackendError>;
    async fn update_issue_body(&self, number: u64, body: &str) -> Result<(), BackendError>;
    async fn close_issue(&self, number: u64) -> Result<(), BackendError>;
    async fn reopen_issue(&self, number: u64) -> Result<(), BackendError>;
}

#[derive(Debug, Default)]
struct MemoryStore {
    issues: BTreeMap<u64, Issue>,
    comments: Vec<Comment>,
    next_comment_id: u64,
}

/// In-process backend. New issues and comments are stamped with `Utc::now()`
/// unless seeded through `insert_issue` / `insert_comment`.
#[derive(Debug, Default)]
pub struct MemoryIssueBackend {
    store: Mutex<MemoryStore>,
}

impl MemoryIssueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStore>, BackendError> {
        self.store
            .lock()
            .map_err(|_| BackendError::Remote("memory backend lock poisoned".to_string()))
    }

    pub fn insert_issue(&self, issue: Issue) -> Result<(), BackendError> {
        self.lock()?.issues.insert(issue.number, issue);
        Ok(())
    }

    pub fn insert_comment(
        &self,
        number: u64,
        body: &str,
        author: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<Comment, BackendError> {
        let mut store = self.lock()?;
        if !store.issues.contains_key(&number) {
            return Err(BackendError::IssueNotFound(number));
        }
        store.next_comment_id += 1;
        let comment = Comment {
            id: store.next_comment_id,
            issue_number: number,
            body: body.to_string(),
            created_at,
            author: author.map(str::to_string),
        };
        store.comments.push(comment.clone());
        Ok(comment)
    }

    fn with_issue<T>(
        &self,
        number: u64,
        f: impl FnOnce(&mut Issue) -> T,
    ) -> Result<T, BackendError> {
        let mut store = self.lock()?;
        let issue = store
            .issues
            .get_mut(&number)
            .ok_or(BackendError::IssueNotFound(number))?;
        Ok(f(issue))
    }
}

#[async_trait]
impl IssueBackend for MemoryIssueBackend {
    async fn fetch_issue(&self, number: u64) -> Result<Issue, BackendError> {
        self.with_issue(number, |issue| issue.clone())
    }

    async fn fetch_issues(&self, filter: IssueFilter) -> Result<Vec<Issue>, BackendError> {
        let store = self.lock()?;
        Ok(store
            .issues
            .values()
            .filter(|issue| match filter {
                IssueFilter::Open => issue.open,
                IssueFilter::Closed => !issue.open,
                IssueFilter::All => true,
            })
            .cloned()
            .collect())
    }

    async fn fetch_comments(&self, number: u64) -> Result<Vec<Comment>, BackendError> {
        let store = self.lock()?;
        if !store.issues.contains_key(&number) {
            return Err(BackendError::IssueNotFound(number));
        }
        Ok(store
            .comments
            .iter()
            .filter(|comment| comment.issue_number == number)
            .cloned()
            .collect())
    }

    async fn create_issue(&self, title: &str, body: &str) -> Result<Issue, BackendError> {
        let mut store = self.lock()?;
        let number = store.issues.keys().next_back().copied().unwrap_or(0) + 1;
        let issue = Issue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            author: None,
            open: true,
        };
        store.issues.insert(number, issue.clone());
        Ok(issue)
    }

    async fn post_comment(&self, number: u64, body: &str) -> Result<Comment, BackendError> {
        self.insert_comment(number, body, None, Utc::now())
    }

    async fn update_issue_body(&self, number: u64, body: &str) -> Result<(), BackendError> {
        self.with_issue(number, |issue| issue.body = body.to_string())
    }

    async fn close_issue(&self, number: u64) -> Result<(), BackendError> {
        self.with_issue(number, |issue| issue.open = false)
    }

    async fn reopen_issue(&self, number: u64) -> Result<(), BackendError> {
        self.with_issue(number, |issue| issue.open = true)
    }
}
