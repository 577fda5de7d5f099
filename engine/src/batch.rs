use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use futures::future::join_all;
use shared::{
    ContributorProfile, EngineError, GithubHandle, IntoEnumIterator, PeriodKey, RecordKind,
    TimePeriod,
};

use crate::{
    aggregate::aggregate_profiles,
    classify::TagClassifier,
    config::EngineConfig,
    merge::merge_by_login,
    normalize::normalize_snapshot,
    rank::{rank, BotFilter},
    scoring::Scorer,
    source::{ActivitySource, ContributorSnapshot, TimeWindow},
    summary::{summarize_all, SummaryOptions, TextGenerator},
};

#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Restricts the run; `None` asks the source for every contributor it knows.
    pub logins: Option<Vec<GithubHandle>>,
    pub window: Option<TimeWindow>,
    pub granularities: Vec<TimePeriod>,
    /// Summarize every period instead of only the latest one per granularity.
    pub summarize_history: bool,
    pub generator_timeout: Duration,
    pub generator_concurrency: usize,
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            logins: None,
            window: None,
            granularities: TimePeriod::iter().collect(),
            summarize_history: false,
            generator_timeout: Duration::from_secs(30),
            generator_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodReport {
    pub granularity: TimePeriod,
    pub key: PeriodKey,
    pub contributors: Vec<ContributorProfile>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStats {
    pub records: BTreeMap<RecordKind, usize>,
    pub fetch_failures: usize,
    pub stages: Vec<(&'static str, Duration)>,
}

/// Ranked results plus everything that went wrong along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub contributors: Vec<ContributorProfile>,
    pub periods: Vec<PeriodReport>,
    pub errors: Vec<EngineError>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn periods_of(&self, granularity: TimePeriod) -> impl Iterator<Item = &PeriodReport> {
        self.periods
            .iter()
            .filter(move |period| period.granularity == granularity)
    }

    pub fn latest(&self, granularity: TimePeriod) -> Option<&PeriodReport> {
        self.periods_of(granularity).max_by(|a, b| a.key.cmp(&b.key))
    }
}

pub struct Engine {
    config: EngineConfig,
    classifier: TagClassifier,
    bots: BotFilter,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            classifier: TagClassifier::new(&config.tags),
            bots: BotFilter::new(config.bot_logins.as_slice()),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &TagClassifier {
        &self.classifier
    }

    pub fn bots(&self) -> &BotFilter {
        &self.bots
    }

    pub fn scorer(&self) -> Scorer<'_> {
        Scorer::new(
            &self.config.weights,
            &self.classifier,
            self.config.focus_area_limit,
        )
    }

    /// Normalizes every snapshot, drops bots and merges what is left per login.
    #[tracing::instrument(skip_all, fields(snapshots = snapshots.len()))]
    pub fn ingest(&self, snapshots: &[ContributorSnapshot]) -> (Vec<ContributorProfile>, Vec<EngineError>) {
        let mut errors = vec![];
        let mut partials = vec![];
        for snapshot in snapshots {
            if self.bots.is_bot(&snapshot.login) {
                continue;
            }
            let (profile, mut snapshot_errors) = normalize_snapshot(snapshot);
            errors.append(&mut snapshot_errors);
            partials.push(profile);
        }

        let profiles = merge_by_login(partials)
            .into_iter()
            .map(|mut merged| {
                errors.append(&mut merged.conflicts);
                merged.profile
            })
            .collect();
        (profiles, errors)
    }

    /// Scores and ranks profiles. Contributors without a single valid record are
    /// left out, as are bots.
    pub fn score_profiles(&self, profiles: Vec<ContributorProfile>) -> Vec<ContributorProfile> {
        let scorer = self.scorer();
        let scored = self
            .bots
            .retain_humans(profiles)
            .into_iter()
            .filter(ContributorProfile::has_activity)
            .map(|mut profile| {
                scorer.score(&mut profile);
                profile
            })
            .collect();
        rank(scored)
    }

    /// Splits merged profiles into scored, ranked period snapshots.
    pub fn periods(
        &self,
        profiles: &[ContributorProfile],
        granularity: TimePeriod,
    ) -> (Vec<PeriodReport>, Vec<EngineError>) {
        let mut buckets = aggregate_profiles(profiles, granularity);
        let errors = std::mem::take(&mut buckets.errors);
        let reports = buckets
            .into_periods()
            .map(|(key, contributors)| PeriodReport {
                granularity,
                key,
                contributors: self.score_profiles(contributors),
            })
            .collect();
        (reports, errors)
    }

    /// Fetches every login concurrently. A failing login is logged and skipped.
    pub async fn fetch_all(
        &self,
        source: &dyn ActivitySource,
        logins: &[GithubHandle],
        window: Option<TimeWindow>,
    ) -> (Vec<ContributorSnapshot>, usize) {
        let results = join_all(logins.iter().map(|login| source.fetch(login, window))).await;

        let mut snapshots = vec![];
        let mut failures = 0;
        for (login, result) in logins.iter().zip(results) {
            match result {
                Ok(mut fetched) => snapshots.append(&mut fetched),
                Err(e) => {
                    tracing::error!("Failed to fetch activity of {login}: {e:#}");
                    failures += 1;
                }
            }
        }
        (snapshots, failures)
    }

    fn summary_options(&self, request: &BatchRequest) -> SummaryOptions {
        SummaryOptions {
            cap: self.config.summary_cap,
            example_titles: self.config.example_titles,
            timeout: request.generator_timeout,
            concurrency: request.generator_concurrency,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(
        &self,
        source: &dyn ActivitySource,
        request: &BatchRequest,
        generator: Option<&dyn TextGenerator>,
    ) -> anyhow::Result<BatchReport> {
        let mut stats = BatchStats::default();
        let mut errors = vec![];

        let started = Instant::now();
        let logins: Vec<GithubHandle> = match &request.logins {
            Some(logins) => logins.clone(),
            None => source.contributors().await?,
        }
        .into_iter()
        .filter(|login| !self.bots.is_bot(login))
        .collect();
        let (snapshots, fetch_failures) = self.fetch_all(source, &logins, request.window).await;
        stats.fetch_failures = fetch_failures;
        stats.stages.push(("fetch", started.elapsed()));
        tracing::info!(
            "Fetched {} snapshots for {} contributors",
            snapshots.len(),
            logins.len()
        );

        let started = Instant::now();
        let (merged, mut ingest_errors) = self.ingest(&snapshots);
        errors.append(&mut ingest_errors);
        for profile in &merged {
            for kind in RecordKind::iter() {
                *stats.records.entry(kind).or_default() += profile.total(kind);
            }
        }
        stats.stages.push(("ingest", started.elapsed()));

        let started = Instant::now();
        let mut contributors = self.score_profiles(merged.clone());
        stats.stages.push(("score", started.elapsed()));

        let started = Instant::now();
        let mut periods = vec![];
        for granularity in &request.granularities {
            let (mut reports, mut period_errors) = self.periods(&merged, *granularity);
            errors.append(&mut period_errors);
            periods.append(&mut reports);
        }
        stats.stages.push(("aggregate", started.elapsed()));

        let started = Instant::now();
        let options = self.summary_options(request);
        errors.append(&mut summarize_all(generator, &mut contributors, "all time", options).await);
        let latest: Vec<(TimePeriod, PeriodKey)> = request
            .granularities
            .iter()
            .filter_map(|granularity| {
                periods
                    .iter()
                    .filter(|period| period.granularity == *granularity)
                    .map(|period| (period.granularity, period.key.clone()))
                    .max_by(|a, b| a.1.cmp(&b.1))
            })
            .collect();
        for period in periods.iter_mut() {
            let wanted = request.summarize_history
                || latest.contains(&(period.granularity, period.key.clone()));
            if wanted {
                let label = format!("{} {}", period.granularity, period.key);
                let mut period_errors =
                    summarize_all(generator, &mut period.contributors, &label, options).await;
                errors.append(&mut period_errors);
            }
        }
        stats.stages.push(("summarize", started.elapsed()));

        tracing::info!(
            "Scored {} contributors with {} errors",
            contributors.len(),
            errors.len()
        );
        Ok(BatchReport {
            contributors,
            periods,
            errors,
            stats,
        })
    }
}
