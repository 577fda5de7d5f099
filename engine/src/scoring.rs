use std::collections::BTreeMap;

use shared::{ContributorProfile, Tag, TagLevel};

use crate::{
    classify::{tagged_text, TagClassifier},
    config::ScoreWeights,
    focus::focus_areas,
};

pub const LEVEL_BASE: f64 = 1.5;

/// Cumulative points needed to reach `level`.
pub fn points_at(level: u32) -> f64 {
    LEVEL_BASE.powf(level as f64) - 1.0
}

/// Places a point total on the bonding curve: `level = floor(log_1.5(points + 1))`.
pub fn level_for(points: f64) -> TagLevel {
    let points = if points.is_finite() && points > 0.0 {
        points
    } else if points == f64::INFINITY {
        f64::MAX
    } else {
        0.0
    };

    let mut level = (points + 1.0).log(LEVEL_BASE).floor() as u32;
    // the logarithm can land a hair off at exact thresholds
    while level > 0 && points_at(level) > points {
        level -= 1;
    }
    while points_at(level + 1) <= points {
        level += 1;
    }

    let floor = points_at(level);
    let span = points_at(level + 1) - floor;
    let progress = if span.is_finite() && span > 0.0 {
        ((points - floor) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    TagLevel {
        level,
        progress,
        points,
    }
}

/// Contribution of one touched file to a path-matched tag.
pub fn file_points(lines_changed: u64, weight: f64) -> f64 {
    (lines_changed as f64 + 1.0).log2() * weight
}

pub const MERGED_PRS: &str = "merged_prs";
pub const REVIEWS: &str = "reviews";
pub const ISSUES: &str = "issues";
pub const COMMENTS: &str = "comments";
pub const COMMITS: &str = "commits";

/// Recomputes every derived field of a profile from its deduplicated activity.
pub struct Scorer<'a> {
    weights: &'a ScoreWeights,
    classifier: &'a TagClassifier,
    focus_area_limit: usize,
}

impl<'a> Scorer<'a> {
    pub fn new(weights: &'a ScoreWeights, classifier: &'a TagClassifier, focus_area_limit: usize) -> Self {
        Self {
            weights,
            classifier,
            focus_area_limit,
        }
    }

    /// Points per tag over the whole activity set. File paths scale with
    /// `log2(lines + 1)`, text matches add the flat tag weight.
    pub fn tag_points(&self, profile: &ContributorProfile) -> BTreeMap<Tag, f64> {
        let mut points: BTreeMap<Tag, f64> = BTreeMap::new();
        for record in profile.records() {
            for file in record.files() {
                for rule in self.classifier.path_matches(&file.path) {
                    *points.entry(rule.tag()).or_default() +=
                        file_points(file.lines_changed(), rule.weight);
                }
            }
            if let Some(text) = tagged_text(record) {
                for rule in self.classifier.text_matches(text) {
                    *points.entry(rule.tag()).or_default() += rule.weight;
                }
            }
        }
        points
    }

    pub fn breakdown(&self, profile: &ContributorProfile) -> BTreeMap<String, f64> {
        let merged_prs = profile.pull_requests().filter(|pr| pr.merged).count();
        let engaged_issues = profile.issues().filter(|issue| issue.is_engaged()).count();

        [
            (MERGED_PRS, merged_prs, self.weights.merged_pr),
            (REVIEWS, profile.total_reviews(), self.weights.review_given),
            (ISSUES, engaged_issues, self.weights.issue_engagement),
            (COMMENTS, profile.total_comments(), self.weights.comment),
            (COMMITS, profile.total_commits(), self.weights.commit),
        ]
        .into_iter()
        .map(|(name, count, weight)| (name.to_string(), count as f64 * weight))
        .collect()
    }

    pub fn score(&self, profile: &mut ContributorProfile) {
        profile.clear_derived();

        for (tag, points) in self.tag_points(profile) {
            profile.tag_scores.insert(tag.name.clone(), points);
            profile.tag_levels.insert(tag.name.clone(), level_for(points));
            profile.tags.insert(tag);
        }

        profile.score_breakdown = self.breakdown(profile);
        let total: f64 = profile.score_breakdown.values().sum();
        profile.score = total.floor() as u64;
        profile.score_level = level_for(total);
        profile.focus_areas = focus_areas(profile, self.focus_area_limit);
    }
}
