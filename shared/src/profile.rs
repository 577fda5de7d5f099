use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use super::*;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FocusArea {
    pub area: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Same key and same content: nothing changed.
    Duplicate,
    /// Same key, different content: the stored record was kept.
    Conflict,
}

/// Deduplicated activity and derived scores of one login.
///
/// Activity is keyed by [`RecordKey`], so every `total_*` counter is the size of
/// its set by construction. Derived fields (`score*`, `tag_*`, `focus_areas`) are
/// filled by the scorer and never summed across merges.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "ProfileDocument")]
pub struct ContributorProfile {
    pub login: GithubHandle,
    pub avatar_url: Option<String>,
    pub score: u64,
    pub score_breakdown: BTreeMap<String, f64>,
    pub score_level: TagLevel,
    pub summary: String,
    /// Date of the snapshot the summary came from.
    pub summary_as_of: Option<NaiveDate>,
    pub tags: BTreeSet<Tag>,
    pub tag_scores: BTreeMap<String, f64>,
    pub tag_levels: BTreeMap<String, TagLevel>,
    pub focus_areas: Vec<FocusArea>,
    records: BTreeMap<RecordKey, ActivityRecord>,
}

impl ContributorProfile {
    pub fn new(login: impl Into<GithubHandle>) -> Self {
        Self {
            login: login.into(),
            avatar_url: None,
            score: 0,
            score_breakdown: BTreeMap::new(),
            score_level: TagLevel::default(),
            summary: String::new(),
            summary_as_of: None,
            tags: BTreeSet::new(),
            tag_scores: BTreeMap::new(),
            tag_levels: BTreeMap::new(),
            focus_areas: vec![],
            records: BTreeMap::new(),
        }
    }

    pub fn insert_record(&mut self, record: ActivityRecord) -> InsertOutcome {
        match self.records.get(&record.key()) {
            Some(existing) if *existing == record => InsertOutcome::Duplicate,
            Some(_) => InsertOutcome::Conflict,
            None => {
                self.records.insert(record.key(), record);
                InsertOutcome::Inserted
            }
        }
    }

    pub fn record(&self, key: &RecordKey) -> Option<&ActivityRecord> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records.values()
    }

    pub fn record_keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.records.keys()
    }

    pub fn has_activity(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn total(&self, kind: RecordKind) -> usize {
        self.records.keys().filter(|key| key.kind == kind).count()
    }

    pub fn total_commits(&self) -> usize {
        self.total(RecordKind::Commit)
    }

    pub fn total_prs(&self) -> usize {
        self.total(RecordKind::PullRequest)
    }

    pub fn total_issues(&self) -> usize {
        self.total(RecordKind::Issue)
    }

    pub fn total_comments(&self) -> usize {
        self.total(RecordKind::Comment)
    }

    pub fn total_reviews(&self) -> usize {
        self.total(RecordKind::Review)
    }

    pub fn commits(&self) -> impl Iterator<Item = &Commit> {
        self.records.values().filter_map(|record| match record {
            ActivityRecord::Commit(commit) => Some(commit),
            _ => None,
        })
    }

    pub fn pull_requests(&self) -> impl Iterator<Item = &PullRequest> {
        self.records.values().filter_map(|record| match record {
            ActivityRecord::PullRequest(pr) => Some(pr),
            _ => None,
        })
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.records.values().filter_map(|record| match record {
            ActivityRecord::Issue(issue) => Some(issue),
            _ => None,
        })
    }

    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.records.values().filter_map(|record| match record {
            ActivityRecord::Comment(comment) => Some(comment),
            _ => None,
        })
    }

    pub fn reviews(&self) -> impl Iterator<Item = &Review> {
        self.records.values().filter_map(|record| match record {
            ActivityRecord::Review(review) => Some(review),
            _ => None,
        })
    }

    /// Drops everything the scorer derives, keeping identity and activity.
    pub fn clear_derived(&mut self) {
        self.score = 0;
        self.score_breakdown.clear();
        self.score_level = TagLevel::default();
        self.tags.clear();
        self.tag_scores.clear();
        self.tag_levels.clear();
        self.focus_areas.clear();
    }
}
