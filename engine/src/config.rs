use std::{collections::HashSet, fs, path::Path};

use serde::{Deserialize, Serialize};
use shared::{EngineError, TagNamespace, TagRule};

/// Points per counted activity. Each entry becomes one line of `score_breakdown`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScoreWeights {
    pub merged_pr: f64,
    pub review_given: f64,
    pub issue_engagement: f64,
    pub comment: f64,
    pub commit: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            merged_pr: 7.0,
            review_given: 5.0,
            issue_engagement: 1.0,
            comment: 0.5,
            commit: 1.0,
        }
    }
}

impl ScoreWeights {
    fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("merged_pr", self.merged_pr),
            ("review_given", self.review_given),
            ("issue_engagement", self.issue_engagement),
            ("comment", self.comment),
            ("commit", self.commit),
        ]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: ScoreWeights,
    pub tags: Vec<TagRule>,
    /// Exact logins to drop, compared case-insensitively. `[bot]` suffixes are
    /// always dropped.
    pub bot_logins: Vec<String>,
    pub summary_cap: usize,
    pub focus_area_limit: usize,
    pub example_titles: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            tags: default_tag_rules(),
            bot_logins: DEFAULT_BOT_LOGINS.iter().map(|s| s.to_string()).collect(),
            summary_cap: 280,
            focus_area_limit: 3,
            example_titles: 5,
        }
    }
}

impl EngineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::trace!("Loaded engine config: {:#?}", config);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(content).map_err(|e| EngineError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, weight) in self.weights.entries() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(EngineError::config(format!(
                    "weight {name} must be a finite non-negative number, got {weight}"
                )));
            }
        }

        let mut names = HashSet::new();
        for rule in &self.tags {
            if !names.insert(rule.name.as_str()) {
                return Err(EngineError::config(format!(
                    "tag {} is defined more than once",
                    rule.name
                )));
            }
            if rule.patterns.iter().all(|p| p.is_empty()) {
                return Err(EngineError::config(format!(
                    "tag {} has no patterns",
                    rule.name
                )));
            }
            if !rule.weight.is_finite() || rule.weight < 0.0 {
                return Err(EngineError::config(format!(
                    "tag {} has invalid weight {}",
                    rule.name, rule.weight
                )));
            }
        }

        if self.summary_cap < 4 {
            return Err(EngineError::config("summary_cap must leave room for \"...\""));
        }
        Ok(())
    }
}

pub const DEFAULT_BOT_LOGINS: &[&str] = &[
    "dependabot",
    "dependabot-preview",
    "renovate",
    "renovate-bot",
    "github-actions",
    "github-bot",
    "codecov",
    "codecov-io",
    "semantic-release-bot",
    "copilot-pull-request-reviewer",
    "imgbot",
    "coderabbitai",
    "codefactor-io",
    "graphite-app",
    "cursor",
];

pub fn default_tag_rules() -> Vec<TagRule> {
    use TagNamespace::*;

    vec![
        TagRule::new(Area, "core", &["core/", "src/core", "packages/core"], 2.5),
        TagRule::new(Area, "client", &["client/", "packages/client-"], 1.6),
        TagRule::new(Area, "plugin", &["plugin/", "packages/plugin-"], 1.6),
        TagRule::new(Area, "docs", &["docs/", "README", ".md"], 1.5),
        TagRule::new(
            Area,
            "infra",
            &[".github/", "Dockerfile", "docker-", ".yaml", ".yml"],
            1.8,
        ),
        TagRule::new(
            Area,
            "test",
            &["test/", "tests/", ".test.", ".spec.", "jest", "vitest"],
            2.0,
        ),
        TagRule::new(Area, "security", &["security", "auth", "authentication"], 2.5),
        TagRule::new(Area, "ui", &["ui/", "components/", "pages/"], 1.8),
        TagRule::new(Role, "architect", &["feat:", "refactor:", "breaking:"], 2.5),
        TagRule::new(Role, "maintainer", &["fix:", "chore:", "bump:", "update:"], 2.0),
        TagRule::new(Role, "feature-dev", &["feat:", "feature:", "add:"], 2.0),
        TagRule::new(Role, "bug-fix", &["fix:", "bugfix:", "hotfix:"], 2.2),
        TagRule::new(Role, "docs-writer", &["docs:", "documentation:"], 1.2),
        TagRule::new(Role, "reviewer", &["review:", "feedback:"], 1.8),
        TagRule::new(Role, "devops", &["ci:", "cd:", "deploy:", "build:"], 2.2),
        TagRule::new(Technology, "typescript", &[".ts", ".tsx", "tsconfig"], 1.5),
        TagRule::new(Technology, "rust", &[".rs", "cargo.toml"], 1.5),
        TagRule::new(
            Technology,
            "python",
            &[".py", "requirements.txt", "pyproject.toml"],
            1.5,
        ),
        TagRule::new(
            Technology,
            "blockchain",
            &["web3", "chain", "token", "wallet", "contract"],
            1.6,
        ),
        TagRule::new(
            Technology,
            "ai",
            &["llm", "model", "inference", "embedding", "generation"],
            1.6,
        ),
        TagRule::new(
            Technology,
            "database",
            &["database", "sql", "postgres", "sqlite"],
            1.7,
        ),
        TagRule::new(Technology, "api", &["api", "rest", "graphql", "endpoint"], 1.6),
    ]
}
