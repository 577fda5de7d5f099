use std::time::Duration;

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use serde::Serialize;
use shared::{ContributorProfile, EngineError, FocusArea, GithubHandle};

/// Bounded statistics handed to the text generator; never the raw activity.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ActivityDigest {
    pub login: GithubHandle,
    pub period: String,
    pub pull_requests: usize,
    pub merged_pull_requests: usize,
    pub commits: usize,
    pub issues: usize,
    pub reviews: usize,
    pub comments: usize,
    pub additions: u64,
    pub deletions: u64,
    pub top_tags: Vec<(String, f64)>,
    pub focus_areas: Vec<FocusArea>,
    pub example_titles: Vec<String>,
}

const TOP_TAGS: usize = 5;

impl ActivityDigest {
    /// Expects a scored profile: tags and focus areas are read, not derived.
    pub fn from_profile(profile: &ContributorProfile, period: &str, example_titles: usize) -> Self {
        let (additions, deletions) = profile
            .pull_requests()
            .map(|pr| (pr.additions(), pr.deletions()))
            .chain(profile.commits().map(|c| (c.additions, c.deletions)))
            .fold((0u64, 0u64), |(a, d), (pa, pd)| {
                (a.saturating_add(pa), d.saturating_add(pd))
            });

        let mut titles: Vec<String> = profile
            .pull_requests()
            .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
            .map(|pr| pr.title.clone())
            .filter(|title| !title.trim().is_empty())
            .take(example_titles)
            .collect();
        if titles.is_empty() {
            titles = profile
                .commits()
                .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
                .filter_map(|commit| commit.message.lines().next().map(str::to_string))
                .filter(|line| !line.trim().is_empty())
                .take(example_titles)
                .collect();
        }

        Self {
            login: profile.login.clone(),
            period: period.to_string(),
            pull_requests: profile.total_prs(),
            merged_pull_requests: profile.pull_requests().filter(|pr| pr.merged).count(),
            commits: profile.total_commits(),
            issues: profile.total_issues(),
            reviews: profile.total_reviews(),
            comments: profile.total_comments(),
            additions,
            deletions,
            top_tags: profile
                .tag_scores
                .iter()
                .sorted_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)))
                .take(TOP_TAGS)
                .map(|(name, points)| (name.clone(), *points))
                .collect(),
            focus_areas: profile.focus_areas.clone(),
            example_titles: titles,
        }
    }
}

/// Free-text capability: digest in, prose out. Results are best-effort.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, digest: &ActivityDigest, cap: usize) -> anyhow::Result<String>;
}

/// Keeps at most `cap` characters, replacing the tail with `...` when cut.
/// Texts over `cap` characters keep their first `cap - 3` characters plus `...`.
/// Whitespace counts like any other character.
pub fn truncate_summary(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let kept: String = text.chars().take(cap.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub fn no_activity_placeholder(login: &str) -> String {
    format!("No activity found for {login} in this period.")
}

/// Previous summary if there is one, the placeholder otherwise.
pub fn fallback_summary(profile: &ContributorProfile) -> String {
    if profile.summary.trim().is_empty() {
        no_activity_placeholder(&profile.login)
    } else {
        profile.summary.clone()
    }
}

/// Settings for one summarizing pass.
#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    pub cap: usize,
    pub example_titles: usize,
    pub timeout: Duration,
    /// Generator requests in flight at once.
    pub concurrency: usize,
}

/// Asks the generator for one profile. Any failure, timeout or empty answer
/// yields the fallback text together with the reason.
pub async fn summarize(
    generator: &dyn TextGenerator,
    profile: &ContributorProfile,
    period: &str,
    options: SummaryOptions,
) -> (String, Option<EngineError>) {
    if !profile.has_activity() {
        return (fallback_summary(profile), None);
    }

    let digest = ActivityDigest::from_profile(profile, period, options.example_titles);
    let failure = |reason: String| {
        tracing::warn!("Summary for {} fell back: {reason}", profile.login);
        (
            fallback_summary(profile),
            Some(EngineError::TextGeneration {
                login: profile.login.clone(),
                reason,
            }),
        )
    };

    match tokio::time::timeout(options.timeout, generator.generate(&digest, options.cap)).await {
        Ok(Ok(text)) if !text.trim().is_empty() => (truncate_summary(&text, options.cap), None),
        Ok(Ok(_)) => failure("generator returned empty text".to_string()),
        Ok(Err(e)) => failure(format!("{e:#}")),
        Err(_) => failure(format!("timed out after {:?}", options.timeout)),
    }
}

/// Summarizes profiles with at most `options.concurrency` requests in flight and
/// stores the texts in place. Without a generator each profile keeps its previous
/// summary or gets the placeholder.
#[tracing::instrument(skip_all, fields(period = %period, profiles = profiles.len()))]
pub async fn summarize_all(
    generator: Option<&dyn TextGenerator>,
    profiles: &mut [ContributorProfile],
    period: &str,
    options: SummaryOptions,
) -> Vec<EngineError> {
    let Some(generator) = generator else {
        for profile in profiles.iter_mut() {
            profile.summary = truncate_summary(&fallback_summary(profile), options.cap);
        }
        return vec![];
    };

    let results: Vec<_> = stream::iter(
        profiles
            .iter()
            .map(|profile| summarize(generator, profile, period, options)),
    )
    .buffered(options.concurrency.max(1))
    .collect()
    .await;

    let mut errors = vec![];
    for (profile, (text, error)) in profiles.iter_mut().zip(results) {
        profile.summary = text;
        errors.extend(error);
    }
    errors
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use shared::{ActivityRecord, Extra, PullRequest};

    use super::*;

    struct Fixed(String);

    #[async_trait::async_trait]
    impl TextGenerator for Fixed {
        async fn generate(&self, _: &ActivityDigest, _: usize) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _: &ActivityDigest, _: usize) -> anyhow::Result<String> {
            anyhow::bail!("upstream returned 503")
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl TextGenerator for Slow {
        async fn generate(&self, _: &ActivityDigest, _: usize) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn options() -> SummaryOptions {
        SummaryOptions {
            cap: 280,
            example_titles: 5,
            timeout: Duration::from_secs(30),
            concurrency: 4,
        }
    }

    fn active(login: &str) -> ContributorProfile {
        let mut profile = ContributorProfile::new(login);
        profile.insert_record(ActivityRecord::PullRequest(PullRequest {
            id: "1".into(),
            author_login: login.into(),
            created_at: Utc.with_ymd_and_hms(2024, 11, 5, 10, 0, 0).unwrap(),
            title: "feat: streaming export".into(),
            body: String::new(),
            state: "closed".into(),
            merged: true,
            files: vec![shared::FileChange::new("src/export.rs", 40, 2)],
            reviews: vec![],
            comments: vec![],
            extra: Extra::new(),
        }));
        profile
    }

    #[test]
    fn truncation_keeps_cap_minus_three_and_appends_dots() {
        let long = "a".repeat(300);
        let truncated = truncate_summary(&long, 280);
        assert_eq!(truncated.chars().count(), 280);
        assert_eq!(&truncated[..277], &long[..277]);
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate_summary("short", 280), "short");
        assert_eq!(truncate_summary(" padded ", 8), " padded ");
        let padded = format!("  {}  ", "c".repeat(277));
        let truncated = truncate_summary(&padded, 280);
        assert_eq!(truncated, format!("  {}...", "c".repeat(275)));
        assert_eq!(truncate_summary(&"é".repeat(281), 280).chars().count(), 280);
    }

    #[test]
    fn digest_collects_counts_and_titles() {
        let digest = ActivityDigest::from_profile(&active("alice"), "weekly 2024-11-04", 5);
        assert_eq!(digest.pull_requests, 1);
        assert_eq!(digest.merged_pull_requests, 1);
        assert_eq!(digest.additions, 40);
        assert_eq!(digest.example_titles, vec!["feat: streaming export".to_string()]);
    }

    #[tokio::test]
    async fn generated_text_is_capped() {
        let generator = Fixed("b".repeat(300));
        let (text, error) = summarize(&generator, &active("alice"), "all time", options()).await;
        assert_eq!(text.len(), 280);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn failure_keeps_previous_summary() {
        let mut profile = active("alice");
        profile.summary = "alice shipped the exporter".into();
        let (text, error) = summarize(&Failing, &profile, "all time", options()).await;
        assert_eq!(text, "alice shipped the exporter");
        assert!(matches!(error, Some(EngineError::TextGeneration { .. })));

        let (text, _) = summarize(&Failing, &active("bob"), "all time", options()).await;
        assert_eq!(text, "No activity found for bob in this period.");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_times_out() {
        let (text, error) = summarize(&Slow, &active("alice"), "all time", options()).await;
        assert_eq!(text, no_activity_placeholder("alice"));
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn summarize_all_without_generator_uses_fallbacks() {
        let mut profiles = vec![active("alice"), ContributorProfile::new("bob")];
        profiles[0].summary = "kept".into();
        let errors = summarize_all(None, &mut profiles, "all time", options()).await;
        assert!(errors.is_empty());
        assert_eq!(profiles[0].summary, "kept");
        assert_eq!(profiles[1].summary, no_activity_placeholder("bob"));

        let generator = Fixed("fresh".into());
        summarize_all(Some(&generator as &dyn TextGenerator), &mut profiles, "all time", options()).await;
        assert_eq!(profiles[0].summary, "fresh");
        assert_eq!(profiles[1].summary, no_activity_placeholder("bob"));
    }

    #[derive(Default)]
    struct Counting {
        in_flight: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TextGenerator for Counting {
        async fn generate(&self, digest: &ActivityDigest, _: usize) -> anyhow::Result<String> {
            use std::sync::atomic::Ordering::SeqCst;
            let now = self.in_flight.fetch_add(1, SeqCst) + 1;
            self.peak.fetch_max(now, SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.in_flight.fetch_sub(1, SeqCst);
            Ok(format!("{} did things", digest.login))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn generator_requests_are_bounded() {
        let mut profiles: Vec<_> = (0..10).map(|i| active(&format!("dev{i}"))).collect();
        let generator = Counting::default();
        let options = SummaryOptions {
            concurrency: 3,
            ..options()
        };

        let errors = summarize_all(Some(&generator as &dyn TextGenerator), &mut profiles, "all time", options).await;
        assert!(errors.is_empty());
        assert_eq!(generator.peak.load(std::sync::atomic::Ordering::SeqCst), 3);
        for (i, profile) in profiles.iter().enumerate() {
            assert_eq!(profile.summary, format!("dev{i} did things"));
        }
    }
}
