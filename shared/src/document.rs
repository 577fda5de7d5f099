use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::*;

/// Serialized shape of a contributor: the layout snapshot documents already use,
/// enriched with the derived scores.
#[derive(Serialize, Debug, Clone)]
pub struct ProfileDocument {
    pub contributor: GithubHandle,
    pub avatar_url: Option<String>,
    pub score: u64,
    pub score_breakdown: BTreeMap<String, f64>,
    pub score_level: TagLevel,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_date: Option<NaiveDate>,
    pub activity: ActivityDocument,
    pub tags: Vec<String>,
    pub tag_scores: BTreeMap<String, f64>,
    pub tag_levels: BTreeMap<String, TagLevel>,
    pub focus_areas: Vec<FocusArea>,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct ActivityDocument {
    pub code: CodeDocument,
    pub issues: IssuesDocument,
    pub engagement: EngagementDocument,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct CodeDocument {
    pub total_commits: usize,
    pub total_prs: usize,
    pub commits: Vec<Commit>,
    pub pull_requests: Vec<PullRequest>,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct IssuesDocument {
    pub total_opened: usize,
    pub opened: Vec<Issue>,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct EngagementDocument {
    pub total_comments: usize,
    pub total_reviews: usize,
    pub comments: Vec<Comment>,
    pub reviews: Vec<Review>,
}

impl From<ContributorProfile> for ProfileDocument {
    fn from(profile: ContributorProfile) -> Self {
        let mut activity = ActivityDocument::default();
        for record in profile.records().cloned() {
            match record {
                ActivityRecord::Commit(commit) => activity.code.commits.push(commit),
                ActivityRecord::PullRequest(pr) => activity.code.pull_requests.push(pr),
                ActivityRecord::Issue(issue) => activity.issues.opened.push(issue),
                ActivityRecord::Comment(comment) => activity.engagement.comments.push(comment),
                ActivityRecord::Review(review) => activity.engagement.reviews.push(review),
            }
        }
        activity.code.total_commits = activity.code.commits.len();
        activity.code.total_prs = activity.code.pull_requests.len();
        activity.issues.total_opened = activity.issues.opened.len();
        activity.engagement.total_comments = activity.engagement.comments.len();
        activity.engagement.total_reviews = activity.engagement.reviews.len();

        Self {
            contributor: profile.login,
            avatar_url: profile.avatar_url,
            score: profile.score,
            score_breakdown: profile.score_breakdown,
            score_level: profile.score_level,
            summary: profile.summary,
            summary_date: profile.summary_as_of,
            activity,
            tags: profile.tags.iter().map(ToString::to_string).collect(),
            tag_scores: profile.tag_scores,
            tag_levels: profile.tag_levels,
            focus_areas: profile.focus_areas,
        }
    }
}
