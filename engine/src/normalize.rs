use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use shared::{
    parse_timestamp, ActivityRecord, Comment, Commit, ContributorProfile, EngineError, Extra,
    Feedback, FileChange, InsertOutcome, Issue, PullRequest, RecordKind, Review,
};

use crate::source::{ContributorSnapshot, RawActivity, SourceSchema};

/// Spellings of one logical field, snake_case first.
struct Field(&'static [&'static str]);

const ID: Field = Field(&["id", "number", "sha", "oid"]);
const AUTHOR: Field = Field(&["author_login", "authorLogin", "author", "user"]);
const CREATED_AT: Field = Field(&[
    "created_at",
    "createdAt",
    "committed_date",
    "committedDate",
    "submitted_at",
    "submittedAt",
]);
/// Commit snapshots written by the collector keep their timestamp under `date`.
const COMMIT_DATE: Field = Field(&["date"]);
const REPOSITORY: Field = Field(&["repository", "repo", "nameWithOwner"]);
const MESSAGE: Field = Field(&["message", "messageHeadline", "title"]);
const TITLE: Field = Field(&["title"]);
const BODY: Field = Field(&["body", "bodyText"]);
const STATE: Field = Field(&["state"]);
const MERGED: Field = Field(&["merged"]);
const ADDITIONS: Field = Field(&["additions"]);
const DELETIONS: Field = Field(&["deletions"]);
const FILES: Field = Field(&["files", "changed_file_list", "changedFileList"]);
const PATH: Field = Field(&["path", "filename"]);
const REVIEWS: Field = Field(&["reviews"]);
const COMMENTS: Field = Field(&["comments"]);
const LABELS: Field = Field(&["labels"]);
const COMMENT_COUNT: Field = Field(&["comment_count", "commentCount", "comments"]);

/// Borrowed view over one raw object that remembers which keys were consumed,
/// so everything else ends up in `extra`.
struct Fields<'a> {
    object: &'a Map<String, Value>,
    schema: SourceSchema,
    consumed: HashSet<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(object: &'a Map<String, Value>, schema: SourceSchema) -> Self {
        Self {
            object,
            schema,
            consumed: HashSet::new(),
        }
    }

    fn get(&mut self, field: &Field) -> Option<&'a Value> {
        let mut names = field.0.to_vec();
        if self.schema == SourceSchema::Platform {
            names.reverse();
        }
        let mut found = None;
        for name in names {
            if let Some((key, value)) = self.object.get_key_value(name) {
                self.consumed.insert(key.as_str());
                if found.is_none() && !value.is_null() {
                    found = Some(value);
                }
            }
        }
        found
    }

    fn string(&mut self, field: &Field) -> Option<String> {
        self.get(field).and_then(scalar_to_string)
    }

    fn text(&mut self, field: &Field) -> String {
        self.string(field).unwrap_or_default()
    }

    fn number(&mut self, field: &Field) -> u64 {
        self.get(field).and_then(value_to_u64).unwrap_or_default()
    }

    fn extra(&self) -> Extra {
        self.object
            .iter()
            .filter(|(key, _)| !self.consumed.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => Some(items.len() as u64),
        Value::Object(object) => object.get("totalCount").and_then(value_to_u64),
        _ => None,
    }
}

/// `"alice"`, `{"login": "alice"}` and `{"user": {"login": "alice"}}` all name a login.
fn login_of(value: &Value) -> Option<String> {
    match value {
        Value::String(login) if !login.trim().is_empty() => Some(login.trim().to_string()),
        Value::Object(object) => object
            .get("login")
            .and_then(login_of)
            .or_else(|| object.get("user").and_then(login_of)),
        _ => None,
    }
}

fn repository_of(value: &Value) -> Option<String> {
    match value {
        Value::Object(object) => ["nameWithOwner", "full_name", "name"]
            .iter()
            .find_map(|key| object.get(*key).and_then(scalar_to_string)),
        other => scalar_to_string(other),
    }
}

fn files_of(value: Option<&Value>, schema: SourceSchema) -> Result<Vec<FileChange>, String> {
    let Some(Value::Array(items)) = value else {
        return Ok(vec![]);
    };
    items
        .iter()
        .map(|item| {
            let object = item
                .as_object()
                .ok_or_else(|| "file entry is not an object".to_string())?;
            let mut fields = Fields::new(object, schema);
            let path = fields
                .string(&PATH)
                .ok_or_else(|| "file entry without a path".to_string())?;
            Ok(FileChange::new(
                path,
                fields.number(&ADDITIONS),
                fields.number(&DELETIONS),
            ))
        })
        .collect()
}

fn feedback_of(value: Option<&Value>) -> Vec<Feedback> {
    let Some(Value::Array(items)) = value else {
        return vec![];
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|object| Feedback {
            author: object.get("author").and_then(login_of),
            state: object.get("state").and_then(scalar_to_string),
            body: object
                .get("body")
                .and_then(scalar_to_string)
                .unwrap_or_default(),
        })
        .collect()
}

fn labels_of(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return vec![];
    };
    items
        .iter()
        .filter_map(|label| match label {
            Value::Object(object) => object.get("name").and_then(scalar_to_string),
            other => scalar_to_string(other),
        })
        .collect()
}

/// Turns one raw item into a canonical record.
///
/// `context_login` is the contributor the item was filed under. Snapshot documents
/// nest items below their contributor and leave the author implicit, so it stands
/// in when the item names no author of its own.
pub fn normalize(raw: &RawActivity, context_login: &str) -> Result<ActivityRecord, EngineError> {
    let object = raw
        .value
        .as_object()
        .ok_or_else(|| EngineError::schema(context_login, "?", "record is not an object"))?;
    let mut fields = Fields::new(object, raw.schema);

    let id = fields
        .string(&ID)
        .ok_or_else(|| EngineError::schema(context_login, "?", "missing id"))?;
    let id = match fields.get(&REPOSITORY).and_then(repository_of) {
        Some(repository) => format!("{repository}#{id}"),
        None => id,
    };

    let author_login = fields
        .get(&AUTHOR)
        .and_then(login_of)
        .or_else(|| (!context_login.trim().is_empty()).then(|| context_login.to_string()))
        .ok_or_else(|| EngineError::schema(context_login, &id, "missing author_login"))?;

    let created_at = timestamp_of(&mut fields, raw.kind, &author_login, &id)?;

    let record = match raw.kind {
        RecordKind::Commit => {
            let files = files_of(fields.get(&FILES), raw.schema)
                .map_err(|reason| EngineError::schema(&author_login, &id, reason))?;
            ActivityRecord::Commit(Commit {
                message: fields.text(&MESSAGE),
                additions: fields.number(&ADDITIONS),
                deletions: fields.number(&DELETIONS),
                files,
                extra: Extra::new(),
                id,
                author_login,
                created_at,
            })
        }
        RecordKind::PullRequest => {
            let files = files_of(fields.get(&FILES), raw.schema)
                .map_err(|reason| EngineError::schema(&author_login, &id, reason))?;
            ActivityRecord::PullRequest(PullRequest {
                title: fields.text(&TITLE),
                body: fields.text(&BODY),
                state: fields.text(&STATE),
                merged: fields
                    .get(&MERGED)
                    .and_then(Value::as_bool)
                    .unwrap_or_default(),
                files,
                reviews: feedback_of(fields.get(&REVIEWS)),
                comments: feedback_of(fields.get(&COMMENTS)),
                extra: Extra::new(),
                id,
                author_login,
                created_at,
            })
        }
        RecordKind::Issue => ActivityRecord::Issue(Issue {
            title: fields.text(&TITLE),
            body: fields.text(&BODY),
            state: fields.text(&STATE),
            labels: labels_of(fields.get(&LABELS)),
            comment_count: fields.number(&COMMENT_COUNT),
            extra: Extra::new(),
            id,
            author_login,
            created_at,
        }),
        RecordKind::Comment => ActivityRecord::Comment(Comment {
            body: fields.text(&BODY),
            extra: Extra::new(),
            id,
            author_login,
            created_at,
        }),
        RecordKind::Review => ActivityRecord::Review(Review {
            state: fields.text(&STATE),
            body: fields.text(&BODY),
            extra: Extra::new(),
            id,
            author_login,
            created_at,
        }),
    };

    Ok(with_extra(record, fields.extra()))
}

fn timestamp_value<'a>(fields: &mut Fields<'a>, kind: RecordKind) -> Option<&'a Value> {
    fields.get(&CREATED_AT).or_else(|| match kind {
        RecordKind::Commit => fields.get(&COMMIT_DATE),
        _ => None,
    })
}

/// Timestamp of a raw item, read with the same spellings [`normalize`] accepts.
pub fn timestamp(raw: &RawActivity) -> Option<DateTime<Utc>> {
    let object = raw.value.as_object()?;
    let mut fields = Fields::new(object, raw.schema);
    timestamp_value(&mut fields, raw.kind)?
        .as_str()
        .and_then(parse_timestamp)
}

fn timestamp_of(
    fields: &mut Fields<'_>,
    kind: RecordKind,
    login: &str,
    id: &str,
) -> Result<DateTime<Utc>, EngineError> {
    let value = timestamp_value(fields, kind)
        .ok_or_else(|| EngineError::schema(login, id, "missing created_at"))?;
    let text = value
        .as_str()
        .ok_or_else(|| EngineError::schema(login, id, format!("created_at is not a string: {value}")))?;
    parse_timestamp(text)
        .ok_or_else(|| EngineError::schema(login, id, format!("unparsable created_at {text:?}")))
}

fn with_extra(mut record: ActivityRecord, extra: Extra) -> ActivityRecord {
    match &mut record {
        ActivityRecord::Commit(r) => r.extra = extra,
        ActivityRecord::PullRequest(r) => r.extra = extra,
        ActivityRecord::Issue(r) => r.extra = extra,
        ActivityRecord::Comment(r) => r.extra = extra,
        ActivityRecord::Review(r) => r.extra = extra,
    }
    record
}

const ACTIVITY_SECTIONS: &[(&[&str], RecordKind)] = &[
    (&["code", "commits"], RecordKind::Commit),
    (&["code", "pull_requests"], RecordKind::PullRequest),
    (&["issues", "opened"], RecordKind::Issue),
    (&["engagement", "comments"], RecordKind::Comment),
    (&["engagement", "reviews"], RecordKind::Review),
];

/// Reads one contributor document of a snapshot file:
/// `{contributor, avatar_url, score, summary, activity: {code: {..}, issues: {..}, engagement: {..}}}`.
pub fn read_document(value: &Value, as_of: Option<NaiveDate>) -> Result<ContributorSnapshot, EngineError> {
    let object = value
        .as_object()
        .ok_or_else(|| EngineError::schema("?", "document", "contributor document is not an object"))?;
    let login = ["contributor", "login", "username"]
        .iter()
        .find_map(|key| object.get(*key).and_then(login_of))
        .ok_or_else(|| EngineError::schema("?", "document", "missing contributor"))?;

    let optional_text = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| object.get(*key).and_then(scalar_to_string))
    };

    let mut items = vec![];
    if let Some(activity) = object.get("activity") {
        for (path, kind) in ACTIVITY_SECTIONS {
            let section = path.iter().try_fold(activity, |node, key| node.get(*key));
            if let Some(Value::Array(entries)) = section {
                items.extend(
                    entries
                        .iter()
                        .map(|entry| RawActivity::new(*kind, SourceSchema::Snapshot, entry.clone())),
                );
            }
        }
    }

    Ok(ContributorSnapshot {
        avatar_url: optional_text(&["avatar_url", "avatarUrl"]),
        summary: optional_text(&["summary"]),
        score: object.get("score").and_then(value_to_u64),
        as_of,
        items,
        login,
    })
}

/// Normalizes every item of a snapshot into a partial profile. Broken items are
/// dropped and returned as errors; the rest of the contributor proceeds.
#[tracing::instrument(skip_all, fields(login = %snapshot.login))]
pub fn normalize_snapshot(snapshot: &ContributorSnapshot) -> (ContributorProfile, Vec<EngineError>) {
    let mut profile = ContributorProfile::new(snapshot.login.clone());
    profile.avatar_url = snapshot.avatar_url.clone().filter(|url| !url.is_empty());
    profile.score = snapshot.score.unwrap_or_default();
    if let Some(summary) = snapshot.summary.as_ref().filter(|s| !s.trim().is_empty()) {
        profile.summary = summary.clone();
        profile.summary_as_of = snapshot.as_of;
    }

    let mut errors = vec![];
    for item in &snapshot.items {
        let record = match normalize(item, &snapshot.login) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Dropping {} record: {e}", item.kind);
                errors.push(e);
                continue;
            }
        };
        let (kind, id) = (record.kind(), record.id().clone());
        if profile.insert_record(record) == InsertOutcome::Conflict {
            tracing::warn!("Conflicting copies of {kind} {id}, keeping the first");
            errors.push(EngineError::MergeConflict {
                login: snapshot.login.clone(),
                record_kind: kind,
                id,
            });
        }
    }
    (profile, errors)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn raw(kind: RecordKind, schema: SourceSchema, value: Value) -> RawActivity {
        RawActivity::new(kind, schema, value)
    }

    #[test]
    fn both_schemas_produce_the_same_pull_request() {
        let snapshot = raw(
            RecordKind::PullRequest,
            SourceSchema::Snapshot,
            json!({
                "number": 12,
                "title": "feat: add core loop",
                "state": "MERGED",
                "merged": true,
                "created_at": "2024-11-05T10:00:00Z",
                "files": [{"path": "src/core/x.ts", "additions": 50, "deletions": 10}],
            }),
        );
        let platform = raw(
            RecordKind::PullRequest,
            SourceSchema::Platform,
            json!({
                "number": 12,
                "author": {"login": "alice"},
                "title": "feat: add core loop",
                "state": "MERGED",
                "merged": true,
                "createdAt": "2024-11-05 10:00:00",
                "files": [{"filename": "src/core/x.ts", "additions": 50, "deletions": 10}],
            }),
        );

        let a = normalize(&snapshot, "alice").unwrap();
        let b = normalize(&platform, "").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id(), "12");
        assert_eq!(a.files()[0].lines_changed(), 60);
    }

    #[test]
    fn missing_or_broken_required_fields_are_schema_errors() {
        let no_id = raw(
            RecordKind::Commit,
            SourceSchema::Snapshot,
            json!({"message": "fix: x", "created_at": "2024-11-05T10:00:00Z"}),
        );
        assert!(matches!(
            normalize(&no_id, "alice"),
            Err(EngineError::Schema { .. })
        ));

        let bad_time = raw(
            RecordKind::Commit,
            SourceSchema::Snapshot,
            json!({"sha": "abc", "message": "fix: x", "created_at": "yesterday"}),
        );
        match normalize(&bad_time, "alice") {
            Err(EngineError::Schema {
                login, record_id, ..
            }) => {
                assert_eq!(login, "alice");
                assert_eq!(record_id, "abc");
            }
            other => panic!("unexpected {other:?}"),
        }

        let no_author = raw(
            RecordKind::Comment,
            SourceSchema::Platform,
            json!({"id": "c1", "createdAt": "2024-11-05T10:00:00Z"}),
        );
        assert!(normalize(&no_author, "").is_err());
    }

    #[test]
    fn collector_commits_carry_their_timestamp_under_date() {
        let commit = raw(
            RecordKind::Commit,
            SourceSchema::Snapshot,
            json!({"sha": "abc", "date": "2024-11-05T10:00:00Z", "message": "fix: x"}),
        );
        let record = normalize(&commit, "alice").unwrap();
        assert_eq!(record.id(), "abc");
        assert_eq!(
            record.created_at(),
            &parse_timestamp("2024-11-05T10:00:00Z").unwrap()
        );
        let ActivityRecord::Commit(commit) = &record else {
            panic!("expected a commit, got {record:?}");
        };
        assert!(!commit.extra.contains_key("date"));

        // only commits read `date`
        let issue = raw(
            RecordKind::Issue,
            SourceSchema::Snapshot,
            json!({"number": 3, "date": "2024-11-05T10:00:00Z", "title": "crash"}),
        );
        assert!(matches!(
            normalize(&issue, "alice"),
            Err(EngineError::Schema { .. })
        ));
    }

    #[test]
    fn raw_timestamps_use_every_spelling() {
        let cases = [
            (RecordKind::Commit, json!({"sha": "a", "committed_date": "2024-11-05T10:00:00Z"})),
            (RecordKind::Commit, json!({"sha": "b", "date": "2024-11-05T10:00:00Z"})),
            (RecordKind::Review, json!({"id": 1, "submitted_at": "2024-11-05 10:00:00"})),
            (RecordKind::Review, json!({"id": 2, "submittedAt": "2024-11-05T10:00:00Z"})),
        ];
        for (kind, value) in cases {
            let item = raw(kind, SourceSchema::Snapshot, value);
            assert_eq!(
                timestamp(&item),
                parse_timestamp("2024-11-05T10:00:00Z"),
                "{item:?}"
            );
        }
        assert_eq!(
            timestamp(&raw(RecordKind::Review, SourceSchema::Snapshot, json!({"id": 3}))),
            None
        );
    }

    #[test]
    fn unknown_fields_are_kept_and_repository_qualifies_the_id() {
        let item = raw(
            RecordKind::Issue,
            SourceSchema::Snapshot,
            json!({
                "number": 7,
                "repository": "org/app",
                "title": "crash",
                "created_at": "2024-11-05T10:00:00Z",
                "updated_at": "2024-11-06T10:00:00Z",
                "labels": [{"name": "bug", "color": "red"}],
                "comments": [{"body": "same here"}],
            }),
        );
        let ActivityRecord::Issue(issue) = normalize(&item, "bob").unwrap() else {
            panic!("expected an issue");
        };
        assert_eq!(issue.id, "org/app#7");
        assert_eq!(issue.labels, vec!["bug".to_string()]);
        assert_eq!(issue.comment_count, 1);
        assert!(issue.is_engaged());
        assert_eq!(issue.extra["updated_at"], "2024-11-06T10:00:00Z");
        assert!(!issue.extra.contains_key("title"));
    }

    #[test]
    fn snapshot_keeps_valid_records_and_reports_the_rest() {
        let document = json!({
            "contributor": "alice",
            "avatar_url": "https://avatars.example/alice",
            "score": 12,
            "summary": "alice fixed things",
            "activity": {
                "code": {
                    "commits": [
                        {"sha": "a1", "message": "fix: one", "created_at": "2024-11-05T10:00:00Z"},
                        {"sha": "a1", "message": "fix: other", "created_at": "2024-11-05T10:00:00Z"},
                        {"message": "no id", "created_at": "2024-11-05T10:00:00Z"}
                    ],
                    "pull_requests": []
                },
                "issues": {"opened": []},
                "engagement": {"comments": [], "reviews": []}
            }
        });
        let as_of = NaiveDate::from_ymd_opt(2024, 11, 5);
        let snapshot = read_document(&document, as_of).unwrap();
        assert_eq!(snapshot.items.len(), 3);

        let (profile, errors) = normalize_snapshot(&snapshot);
        assert_eq!(profile.total_commits(), 1);
        assert_eq!(profile.score, 12);
        assert_eq!(profile.summary_as_of, as_of);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind(), "merge_conflict");
        assert_eq!(errors[1].kind(), "schema");
    }

    #[test]
    fn document_without_contributor_is_rejected() {
        assert!(read_document(&json!({"activity": {}}), None).is_err());
        assert!(read_document(&json!([]), None).is_err());
    }
}
