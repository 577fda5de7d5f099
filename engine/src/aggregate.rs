use std::collections::BTreeMap;

use shared::{
    login_key, ActivityRecord, ContributorProfile, EngineError, GithubHandle, InsertOutcome,
    PeriodKey, TimePeriod,
};

/// Activity of one granularity split into period buckets, each keyed by login.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodBuckets {
    pub granularity: TimePeriod,
    pub buckets: BTreeMap<PeriodKey, BTreeMap<String, ContributorProfile>>,
    pub errors: Vec<EngineError>,
}

impl PeriodBuckets {
    fn new(granularity: TimePeriod) -> Self {
        Self {
            granularity,
            buckets: BTreeMap::new(),
            errors: vec![],
        }
    }

    pub fn record_count(&self) -> usize {
        self.buckets
            .values()
            .flat_map(|logins| logins.values())
            .map(|profile| profile.records().count())
            .sum()
    }

    pub fn latest_key(&self) -> Option<&PeriodKey> {
        self.buckets.keys().next_back()
    }

    pub fn into_periods(self) -> impl Iterator<Item = (PeriodKey, Vec<ContributorProfile>)> {
        self.buckets
            .into_iter()
            .map(|(key, logins)| (key, logins.into_values().collect()))
    }

    fn insert(&mut self, login: &str, avatar_url: Option<&String>, record: ActivityRecord) {
        let created_at = *record.created_at();
        let Some(key) = self.granularity.time_string(&created_at) else {
            tracing::warn!(
                "No {} bucket for {} {} at {created_at}",
                self.granularity,
                record.kind(),
                record.id()
            );
            self.errors.push(EngineError::TimeParse {
                login: login.to_string(),
                record_id: record.id().clone(),
                value: created_at.to_rfc3339(),
            });
            return;
        };

        let profile = self
            .buckets
            .entry(key)
            .or_default()
            .entry(login_key(login))
            .or_insert_with(|| ContributorProfile::new(login));
        // the smallest spelling wins so bucket identity does not depend on input order
        if login < profile.login.as_str() {
            profile.login = login.to_string();
        }
        if profile.avatar_url.is_none() {
            profile.avatar_url = avatar_url.cloned();
        }

        let (kind, id) = (record.kind(), record.id().clone());
        if profile.insert_record(record) == InsertOutcome::Conflict {
            self.errors.push(EngineError::MergeConflict {
                login: login.to_string(),
                record_kind: kind,
                id,
            });
        }
    }
}

/// Buckets `(login, record)` pairs by the period their timestamp falls in.
/// Pure: permuting the input gives the same buckets.
#[tracing::instrument(skip(entries), fields(entries = entries.len()))]
pub fn aggregate(entries: &[(GithubHandle, ActivityRecord)], granularity: TimePeriod) -> PeriodBuckets {
    let mut buckets = PeriodBuckets::new(granularity);
    for (login, record) in entries {
        buckets.insert(login, None, record.clone());
    }
    buckets
}

/// Same as [`aggregate`] over merged profiles, carrying each contributor's avatar
/// into its period fragments.
#[tracing::instrument(skip(profiles), fields(profiles = profiles.len()))]
pub fn aggregate_profiles(profiles: &[ContributorProfile], granularity: TimePeriod) -> PeriodBuckets {
    let mut buckets = PeriodBuckets::new(granularity);
    for profile in profiles {
        for record in profile.records() {
            buckets.insert(&profile.login, profile.avatar_url.as_ref(), record.clone());
        }
    }
    buckets
}
