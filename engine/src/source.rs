use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use shared::{GithubHandle, RecordKind};

/// Field naming convention of a raw payload. Both conventions are accepted either
/// way; the schema only decides which spelling wins when a payload carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceSchema {
    /// snake_case documents written by earlier runs (`created_at`, `path`).
    #[default]
    Snapshot,
    /// camelCase payloads straight from the hosting platform (`createdAt`, `filename`).
    Platform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawActivity {
    pub kind: RecordKind,
    pub schema: SourceSchema,
    pub value: Value,
}

impl RawActivity {
    pub fn new(kind: RecordKind, schema: SourceSchema, value: Value) -> Self {
        Self {
            kind,
            schema,
            value,
        }
    }
}

/// One contributor as seen by one source snapshot (for example one daily file).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContributorSnapshot {
    pub login: GithubHandle,
    pub avatar_url: Option<String>,
    pub summary: Option<String>,
    pub score: Option<u64>,
    /// Recency marker of the snapshot, used to pick the freshest summary.
    pub as_of: Option<NaiveDate>,
    pub items: Vec<RawActivity>,
}

/// Inclusive time window; built from dates it spans whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    /// Exclusive.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// From the start of `after` up to, not including, the day after `before`.
    pub fn from_dates(after: NaiveDate, before: NaiveDate) -> Self {
        Self {
            start: after.and_time(NaiveTime::MIN).and_utc(),
            end: before
                .succ_opt()
                .map_or(DateTime::<Utc>::MAX_UTC, |next| next.and_time(NaiveTime::MIN).and_utc()),
        }
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.start <= *timestamp && *timestamp < self.end
    }
}

/// The fetch collaborator: returns raw activity for one contributor, optionally
/// bounded to a window. Pagination, authentication and rate limits live behind it.
#[async_trait::async_trait]
pub trait ActivitySource: Send + Sync {
    async fn contributors(&self) -> anyhow::Result<Vec<GithubHandle>>;

    async fn fetch(
        &self,
        login: &str,
        window: Option<TimeWindow>,
    ) -> anyhow::Result<Vec<ContributorSnapshot>>;
}
