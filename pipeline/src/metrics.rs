use std::path::Path;

use anyhow::Context;
use devboard_engine::BatchReport;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use shared::RecordKind;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Kind {
    Commit,
    PullRequest,
    Issue,
    Comment,
    Review,
}

impl From<RecordKind> for Kind {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Commit => Kind::Commit,
            RecordKind::PullRequest => Kind::PullRequest,
            RecordKind::Issue => Kind::Issue,
            RecordKind::Comment => Kind::Comment,
            RecordKind::Review => Kind::Review,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RecordLabel {
    pub kind: Kind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabel {
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StageLabel {
    pub stage: String,
}

pub struct PrometheusClient {
    registry: Registry,
    records: Family<RecordLabel, Counter>,
    errors: Family<ErrorLabel, Counter>,
    stage_duration: Family<StageLabel, Histogram>,
    contributors: Gauge,
    fetch_failures: Counter,
}

impl Default for PrometheusClient {
    fn default() -> Self {
        let mut registry = Registry::default();
        let records = Family::default();
        let errors = Family::default();
        let contributors = Gauge::default();
        let fetch_failures = Counter::default();
        let stage_duration: Family<StageLabel, Histogram> = Family::new_with_constructor(|| {
            Histogram::new([0.01, 0.05, 0.1, 0.5, 1., 5., 10., 30., 60., 300., f64::INFINITY].into_iter())
        });

        registry.register(
            "devboard_records",
            "Deduplicated activity records by kind",
            records.clone(),
        );
        registry.register(
            "devboard_errors",
            "Engine errors reported alongside the results",
            errors.clone(),
        );
        registry.register(
            "devboard_stage_duration_seconds",
            "Time spent per batch stage",
            stage_duration.clone(),
        );
        registry.register(
            "devboard_scored_contributors",
            "Contributors in the latest all-time ranking",
            contributors.clone(),
        );
        registry.register(
            "devboard_fetch_failures",
            "Contributors whose activity could not be fetched",
            fetch_failures.clone(),
        );
        Self {
            registry,
            records,
            errors,
            stage_duration,
            contributors,
            fetch_failures,
        }
    }
}

impl PrometheusClient {
    pub fn record(&self, report: &BatchReport) {
        for (kind, count) in &report.stats.records {
            self.records
                .get_or_create(&RecordLabel {
                    kind: (*kind).into(),
                })
                .inc_by(*count as u64);
        }
        for error in &report.errors {
            self.errors
                .get_or_create(&ErrorLabel {
                    kind: error.kind().to_string(),
                })
                .inc();
        }
        for (stage, duration) in &report.stats.stages {
            self.stage_duration
                .get_or_create(&StageLabel {
                    stage: stage.to_string(),
                })
                .observe(duration.as_secs_f64());
        }
        self.contributors.set(report.contributors.len() as i64);
        self.fetch_failures.inc_by(report.stats.fetch_failures as u64);
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.encode()?)
            .with_context(|| format!("failed to write metrics to {}", path.display()))
    }
}
