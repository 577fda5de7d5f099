use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, IntoStaticStr};

use super::*;

pub type RecordId = String;

/// Fields a raw record carried that the engine does not interpret.
pub type Extra = Map<String, Value>;

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordKind {
    Commit,
    PullRequest,
    Issue,
    Comment,
    Review,
}

/// Identity of an event: two records with the same key are the same event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub id: RecordId,
}

impl RecordKey {
    pub fn new(kind: RecordKind, id: impl Into<RecordId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FileChange {
    pub path: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl FileChange {
    pub fn new(path: impl Into<String>, additions: u64, deletions: u64) -> Self {
        Self {
            path: path.into(),
            additions,
            deletions,
        }
    }

    pub fn lines_changed(&self) -> u64 {
        self.additions.saturating_add(self.deletions)
    }

    /// First path segment, if the file lives inside a directory.
    pub fn top_level_dir(&self) -> Option<&str> {
        let (head, _) = self.path.split_once('/')?;
        (!head.is_empty()).then_some(head)
    }
}

/// Review or comment received on a pull request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Feedback {
    #[serde(default)]
    pub author: Option<GithubHandle>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub body: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: RecordId,
    pub author_login: GithubHandle,
    pub created_at: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub files: Vec<FileChange>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub id: RecordId,
    pub author_login: GithubHandle,
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub reviews: Vec<Feedback>,
    #[serde(default)]
    pub comments: Vec<Feedback>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl PullRequest {
    pub fn additions(&self) -> u64 {
        self.files.iter().map(|f| f.additions).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.files.iter().map(|f| f.deletions).sum()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub id: RecordId,
    pub author_login: GithubHandle,
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Issue {
    /// An issue is engaged once somebody commented on it or it got closed.
    pub fn is_engaged(&self) -> bool {
        self.comment_count > 0 || self.state.eq_ignore_ascii_case("closed")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: RecordId,
    pub author_login: GithubHandle,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: RecordId,
    pub author_login: GithubHandle,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityRecord {
    Commit(Commit),
    PullRequest(PullRequest),
    Issue(Issue),
    Comment(Comment),
    Review(Review),
}

impl ActivityRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            ActivityRecord::Commit(_) => RecordKind::Commit,
            ActivityRecord::PullRequest(_) => RecordKind::PullRequest,
            ActivityRecord::Issue(_) => RecordKind::Issue,
            ActivityRecord::Comment(_) => RecordKind::Comment,
            ActivityRecord::Review(_) => RecordKind::Review,
        }
    }

    pub fn id(&self) -> &RecordId {
        match self {
            ActivityRecord::Commit(record) => &record.id,
            ActivityRecord::PullRequest(record) => &record.id,
            ActivityRecord::Issue(record) => &record.id,
            ActivityRecord::Comment(record) => &record.id,
            ActivityRecord::Review(record) => &record.id,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.kind(), self.id().clone())
    }

    pub fn author_login(&self) -> &GithubHandle {
        match self {
            ActivityRecord::Commit(record) => &record.author_login,
            ActivityRecord::PullRequest(record) => &record.author_login,
            ActivityRecord::Issue(record) => &record.author_login,
            ActivityRecord::Comment(record) => &record.author_login,
            ActivityRecord::Review(record) => &record.author_login,
        }
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        match self {
            ActivityRecord::Commit(record) => &record.created_at,
            ActivityRecord::PullRequest(record) => &record.created_at,
            ActivityRecord::Issue(record) => &record.created_at,
            ActivityRecord::Comment(record) => &record.created_at,
            ActivityRecord::Review(record) => &record.created_at,
        }
    }

    /// Title or message used for role and technology tagging.
    pub fn text(&self) -> &str {
        match self {
            ActivityRecord::Commit(record) => &record.message,
            ActivityRecord::PullRequest(record) => &record.title,
            ActivityRecord::Issue(record) => &record.title,
            ActivityRecord::Comment(record) => &record.body,
            ActivityRecord::Review(record) => &record.body,
        }
    }

    pub fn files(&self) -> &[FileChange] {
        match self {
            ActivityRecord::Commit(record) => &record.files,
            ActivityRecord::PullRequest(record) => &record.files,
            _ => &[],
        }
    }
}

impl From<Commit> for ActivityRecord {
    fn from(record: Commit) -> Self {
        ActivityRecord::Commit(record)
    }
}

impl From<PullRequest> for ActivityRecord {
    fn from(record: PullRequest) -> Self {
        ActivityRecord::PullRequest(record)
    }
}

impl From<Issue> for ActivityRecord {
    fn from(record: Issue) -> Self {
        ActivityRecord::Issue(record)
    }
}

impl From<Comment> for ActivityRecord {
    fn from(record: Comment) -> Self {
        ActivityRecord::Comment(record)
    }
}

impl From<Review> for ActivityRecord {
    fn from(record: Review) -> Self {
        ActivityRecord::Review(record)
    }
}
