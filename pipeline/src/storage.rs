use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use devboard_engine::BatchReport;
use serde::Serialize;
use serde_json::Value;
use shared::{EngineError, PeriodKey, TimePeriod};
use tracing::{debug, info, instrument, warn};

const SCORED_FILE: &str = "scored.json";
const ERRORS_FILE: &str = "errors.json";
const HISTORY_DIR: &str = "history";

/// Where each artifact of a run lives under the output directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn all_time(&self) -> PathBuf {
        self.root.join(SCORED_FILE)
    }

    pub fn errors(&self) -> PathBuf {
        self.root.join(ERRORS_FILE)
    }

    pub fn current(&self, granularity: TimePeriod) -> PathBuf {
        self.root.join(granularity.to_string()).join(SCORED_FILE)
    }

    pub fn history(&self, granularity: TimePeriod, key: &PeriodKey) -> PathBuf {
        self.root
            .join(granularity.to_string())
            .join(HISTORY_DIR)
            .join(format!("scored_{key}.json"))
    }
}

/// One file to be written. Canonical "current" files are replaced on every run;
/// dated copies are protected.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub replaceable: bool,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<Vec<u8>> {
    let mut content = serde_json::to_vec_pretty(value)?;
    content.push(b'\n');
    Ok(content)
}

/// Serializes everything up front, so nothing is written if any part fails.
pub fn plan(layout: &OutputLayout, report: &BatchReport) -> anyhow::Result<Vec<Artifact>> {
    let mut artifacts = vec![
        Artifact {
            path: layout.all_time(),
            content: to_json(&report.contributors)?,
            replaceable: true,
        },
        Artifact {
            path: layout.errors(),
            content: to_json(&report.errors)?,
            replaceable: true,
        },
    ];

    for period in &report.periods {
        artifacts.push(Artifact {
            path: layout.history(period.granularity, &period.key),
            content: to_json(&period.contributors)?,
            replaceable: false,
        });
    }

    let mut granularities: Vec<TimePeriod> = report.periods.iter().map(|p| p.granularity).collect();
    granularities.sort();
    granularities.dedup();
    for granularity in granularities {
        if let Some(latest) = report.latest(granularity) {
            artifacts.push(Artifact {
                path: layout.current(granularity),
                content: to_json(&latest.contributors)?,
                replaceable: true,
            });
        }
    }
    Ok(artifacts)
}

/// Fields of a period document that change between runs without any change in
/// activity. They never cause a collision.
const VOLATILE_FIELDS: &[&str] = &["summary", "summary_date"];

fn without_volatile(mut documents: Value) -> Value {
    if let Value::Array(items) = &mut documents {
        for fields in items.iter_mut().filter_map(Value::as_object_mut) {
            for field in VOLATILE_FIELDS {
                fields.remove(*field);
            }
        }
    }
    documents
}

/// Copies summaries from the persisted documents into contributors the new run
/// left without one. Returns whether anything was copied.
fn carry_summaries(existing: &Value, fresh: &mut Value) -> bool {
    let (Some(previous), Some(items)) = (existing.as_array(), fresh.as_array_mut()) else {
        return false;
    };

    let mut carried = false;
    for fields in items.iter_mut().filter_map(Value::as_object_mut) {
        let missing = fields
            .get("summary")
            .and_then(Value::as_str)
            .map_or(true, |summary| summary.trim().is_empty());
        if !missing {
            continue;
        }
        let Some(old) = previous
            .iter()
            .find(|old| old.get("contributor") == fields.get("contributor"))
        else {
            continue;
        };
        for field in VOLATILE_FIELDS {
            if let Some(value) = old.get(*field) {
                carried |= fields.get(*field) != Some(value);
                fields.insert(field.to_string(), value.clone());
            }
        }
    }
    carried
}

/// Resolves every protected artifact against what is already on disk.
///
/// A protected file collides when its activity differs from the new content and
/// `force` is off. Summary-only differences are not collisions: fresh summaries
/// replace the old ones, and summaries the new run did not produce are kept.
pub fn reconcile(artifacts: Vec<Artifact>, force: bool) -> anyhow::Result<Vec<Artifact>> {
    let mut resolved = Vec::with_capacity(artifacts.len());
    for mut artifact in artifacts {
        if artifact.replaceable {
            resolved.push(artifact);
            continue;
        }
        let existing = match fs::read(&artifact.path) {
            Ok(existing) if existing == artifact.content => {
                resolved.push(artifact);
                continue;
            }
            Ok(existing) => existing,
            Err(_) => {
                resolved.push(artifact);
                continue;
            }
        };

        let previous = serde_json::from_slice::<Value>(&existing).ok();
        let mut fresh: Value = serde_json::from_slice(&artifact.content)?;
        let same_activity = previous
            .as_ref()
            .is_some_and(|previous| without_volatile(previous.clone()) == without_volatile(fresh.clone()));

        match previous {
            Some(previous) if same_activity => {
                if carry_summaries(&previous, &mut fresh) {
                    debug!("Keeping persisted summaries of {}", artifact.path.display());
                    artifact.content = to_json(&fresh)?;
                }
            }
            _ if force => warn!("Overwriting {}", artifact.path.display()),
            _ => {
                return Err(EngineError::OutputCollision {
                    path: artifact.path.clone(),
                }
                .into())
            }
        }
        resolved.push(artifact);
    }
    Ok(resolved)
}

fn write_atomically(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let temp = dir.join(format!(".{file_name}.tmp"));
    fs::write(&temp, content).with_context(|| format!("failed to write {}", temp.display()))?;
    fs::rename(&temp, path).with_context(|| format!("failed to move {}", path.display()))?;
    Ok(())
}

/// Checks every destination first, then writes each artifact through a temporary
/// file and a rename.
#[instrument(skip_all, fields(artifacts = artifacts.len()))]
pub fn persist(artifacts: Vec<Artifact>, force: bool) -> anyhow::Result<()> {
    let artifacts = reconcile(artifacts, force)?;
    for artifact in &artifacts {
        debug!("Writing {}", artifact.path.display());
        write_atomically(&artifact.path, &artifact.content)?;
    }
    info!("Wrote {} files", artifacts.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use devboard_engine::{BatchStats, PeriodReport};
    use pretty_assertions::assert_eq;
    use shared::ContributorProfile;

    use super::*;

    fn report(period_keys: &[&str], score: u64) -> BatchReport {
        let mut alice = ContributorProfile::new("alice");
        alice.score = score;
        BatchReport {
            contributors: vec![alice.clone()],
            periods: period_keys
                .iter()
                .map(|key| PeriodReport {
                    granularity: TimePeriod::Week,
                    key: key.to_string(),
                    contributors: vec![alice.clone()],
                })
                .collect(),
            errors: vec![EngineError::schema("bob", "7", "missing created_at")],
            stats: BatchStats::default(),
        }
    }

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("out");
        assert_eq!(layout.all_time(), PathBuf::from("out/scored.json"));
        assert_eq!(
            layout.current(TimePeriod::Month),
            PathBuf::from("out/monthly/scored.json")
        );
        assert_eq!(
            layout.history(TimePeriod::Day, &"2024-11-05".to_string()),
            PathBuf::from("out/daily/history/scored_2024-11-05.json")
        );
    }

    #[test]
    fn writes_current_and_history_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let artifacts = plan(&layout, &report(&["2024-11-04", "2024-11-11"], 3)).unwrap();
        persist(artifacts.clone(), false).unwrap();

        let current: serde_json::Value =
            serde_json::from_slice(&fs::read(layout.current(TimePeriod::Week)).unwrap()).unwrap();
        assert_eq!(current[0]["contributor"], "alice");
        assert!(layout
            .history(TimePeriod::Week, &"2024-11-04".to_string())
            .exists());
        let errors: serde_json::Value =
            serde_json::from_slice(&fs::read(layout.errors()).unwrap()).unwrap();
        assert_eq!(errors[0]["kind"], "schema");

        // identical re-run is idempotent
        persist(artifacts, false).unwrap();
    }

    #[test]
    fn changed_history_needs_force_and_nothing_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        persist(plan(&layout, &report(&["2024-11-04"], 3)).unwrap(), false).unwrap();
        let before = fs::read(layout.all_time()).unwrap();

        let changed = plan(&layout, &report(&["2024-11-04", "2024-11-11"], 9)).unwrap();
        let error = persist(changed.clone(), false).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<EngineError>(),
            Some(EngineError::OutputCollision { .. })
        ));
        assert_eq!(fs::read(layout.all_time()).unwrap(), before);
        assert!(!layout
            .history(TimePeriod::Week, &"2024-11-11".to_string())
            .exists());

        persist(changed, true).unwrap();
        assert_ne!(fs::read(layout.all_time()).unwrap(), before);
    }

    fn summarized(report: &mut BatchReport, summary: &str) {
        for period in &mut report.periods {
            for contributor in &mut period.contributors {
                contributor.summary = summary.to_string();
            }
        }
    }

    #[test]
    fn summaries_alone_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let history = layout.history(TimePeriod::Week, &"2024-11-04".to_string());
        let summary_of = |path: &Path| -> serde_json::Value {
            let documents: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
            documents[0]["summary"].clone()
        };

        let mut latest = report(&["2024-11-04"], 3);
        summarized(&mut latest, "No activity found for alice in this period.");
        persist(plan(&layout, &latest).unwrap(), false).unwrap();

        // a later run no longer summarizes this period
        let older = report(&["2024-11-04", "2024-11-11"], 3);
        persist(plan(&layout, &older).unwrap(), false).unwrap();
        assert_eq!(
            summary_of(&history),
            "No activity found for alice in this period."
        );

        let mut regenerated = report(&["2024-11-04"], 3);
        summarized(&mut regenerated, "alice shipped the core loop");
        persist(plan(&layout, &regenerated).unwrap(), false).unwrap();
        assert_eq!(summary_of(&history), "alice shipped the core loop");

        // carried content is stable across further reruns
        persist(plan(&layout, &older).unwrap(), false).unwrap();
        persist(plan(&layout, &older).unwrap(), false).unwrap();
        assert_eq!(summary_of(&history), "alice shipped the core loop");
    }
}
