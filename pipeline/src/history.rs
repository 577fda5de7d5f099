use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use devboard_engine::{
    normalize::{self, read_document},
    ActivitySource, ContributorSnapshot, TimeWindow,
};
use serde_json::Value;
use shared::{date_from_file_stem, same_login, GithubHandle};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};

/// Dated contributor snapshots on disk (`contributors_2024-11-05.json`,
/// `contributors_2024_11_05.json`, ...), served as an activity source.
pub struct HistoryDir {
    dir: PathBuf,
    snapshots: OnceCell<Vec<ContributorSnapshot>>,
}

impl HistoryDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            snapshots: OnceCell::new(),
        }
    }

    /// Snapshot files sorted oldest first. Files without a trailing date are ignored.
    pub async fn snapshot_files(&self) -> anyhow::Result<Vec<(NaiveDate, PathBuf)>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to list {}", self.dir.display()))?;

        let mut files = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(date) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(date_from_file_stem)
            else {
                debug!("Skipping undated file {}", path.display());
                continue;
            };
            files.push((date, path));
        }
        files.sort();
        Ok(files)
    }

    async fn load_file(date: NaiveDate, path: &Path) -> anyhow::Result<Vec<ContributorSnapshot>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let documents: Vec<Value> = serde_json::from_str(&content)
            .with_context(|| format!("{} is not a JSON array of contributors", path.display()))?;

        Ok(documents
            .iter()
            .filter_map(|document| match read_document(document, Some(date)) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!("Skipping document in {}: {e}", path.display());
                    None
                }
            })
            .collect())
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn snapshots(&self) -> anyhow::Result<&[ContributorSnapshot]> {
        let snapshots = self
            .snapshots
            .get_or_try_init(|| async {
                let mut snapshots = vec![];
                for (date, path) in self.snapshot_files().await? {
                    match Self::load_file(date, &path).await {
                        Ok(mut loaded) => snapshots.append(&mut loaded),
                        Err(e) => error!("{e:#}"),
                    }
                }
                info!("Loaded {} contributor snapshots", snapshots.len());
                anyhow::Ok(snapshots)
            })
            .await?;
        Ok(snapshots.as_slice())
    }
}

/// Keeps items inside the window. Items without a readable timestamp stay, so
/// the normalizer can report them.
fn within(snapshot: &ContributorSnapshot, window: &TimeWindow) -> ContributorSnapshot {
    let mut bounded = snapshot.clone();
    bounded.items.retain(|item| {
        normalize::timestamp(item).map_or(true, |timestamp| window.contains(&timestamp))
    });
    bounded
}

#[async_trait::async_trait]
impl ActivitySource for HistoryDir {
    async fn contributors(&self) -> anyhow::Result<Vec<GithubHandle>> {
        let mut logins: Vec<GithubHandle> = vec![];
        for snapshot in self.snapshots().await? {
            if !logins.iter().any(|known| same_login(known, &snapshot.login)) {
                logins.push(snapshot.login.clone());
            }
        }
        Ok(logins)
    }

    async fn fetch(
        &self,
        login: &str,
        window: Option<TimeWindow>,
    ) -> anyhow::Result<Vec<ContributorSnapshot>> {
        Ok(self
            .snapshots()
            .await?
            .iter()
            .filter(|snapshot| same_login(&snapshot.login, login))
            .map(|snapshot| match &window {
                Some(window) => within(snapshot, window),
                None => snapshot.clone(),
            })
            .collect())
    }
}
