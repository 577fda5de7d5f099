use std::collections::BTreeSet;

use shared::{ActivityRecord, Tag, TagNamespace, TagRule};

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: TagRule,
    lowered: Vec<String>,
}

impl CompiledRule {
    fn new(rule: &TagRule) -> Self {
        Self {
            lowered: rule
                .patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
            rule: rule.clone(),
        }
    }

    fn matches_exact(&self, haystack: &str) -> bool {
        self.rule
            .patterns
            .iter()
            .any(|p| !p.is_empty() && haystack.contains(p.as_str()))
    }

    fn matches_folded(&self, lowered_haystack: &str) -> bool {
        self.lowered.iter().any(|p| lowered_haystack.contains(p.as_str()))
    }
}

/// Evaluates a declarative tag table against records.
///
/// Area tags look at file paths only and are case-sensitive. Technology tags look
/// at paths and text, Role tags at text only; both ignore case.
#[derive(Debug, Clone)]
pub struct TagClassifier {
    rules: Vec<CompiledRule>,
}

impl TagClassifier {
    pub fn new(rules: &[TagRule]) -> Self {
        Self {
            rules: rules.iter().map(CompiledRule::new).collect(),
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = &TagRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    pub fn path_matches<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a TagRule> + 'a {
        let lowered = path.to_lowercase();
        let path = path.to_string();
        self.rules
            .iter()
            .filter(move |compiled| match compiled.rule.namespace {
                TagNamespace::Area => compiled.matches_exact(&path),
                TagNamespace::Technology => compiled.matches_folded(&lowered),
                TagNamespace::Role => false,
            })
            .map(|compiled| &compiled.rule)
    }

    pub fn text_matches<'a>(&'a self, text: &str) -> impl Iterator<Item = &'a TagRule> + 'a {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .filter(move |compiled| match compiled.rule.namespace {
                TagNamespace::Role | TagNamespace::Technology => {
                    compiled.matches_folded(&lowered)
                }
                TagNamespace::Area => false,
            })
            .map(|compiled| &compiled.rule)
    }

    /// Every tag a single record earns, across all namespaces.
    pub fn classify(&self, record: &ActivityRecord) -> BTreeSet<Tag> {
        let mut tags: BTreeSet<Tag> = record
            .files()
            .iter()
            .flat_map(|file| self.path_matches(&file.path))
            .map(TagRule::tag)
            .collect();
        if let Some(text) = tagged_text(record) {
            tags.extend(self.text_matches(text).map(TagRule::tag));
        }
        tags
    }
}

/// Title or commit message; comment and review bodies are not classified.
pub fn tagged_text(record: &ActivityRecord) -> Option<&str> {
    match record {
        ActivityRecord::Commit(_) | ActivityRecord::PullRequest(_) | ActivityRecord::Issue(_) => {
            Some(record.text())
        }
        ActivityRecord::Comment(_) | ActivityRecord::Review(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use shared::{Commit, Extra, FileChange};

    use super::*;
    use crate::config::default_tag_rules;

    fn commit(message: &str, paths: &[&str]) -> ActivityRecord {
        ActivityRecord::Commit(Commit {
            id: "c".into(),
            author_login: "alice".into(),
            created_at: Utc::now(),
            message: message.into(),
            additions: 0,
            deletions: 0,
            files: paths.iter().map(|p| FileChange::new(*p, 1, 0)).collect(),
            extra: Extra::new(),
        })
    }

    fn names(tags: &BTreeSet<Tag>) -> Vec<String> {
        tags.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn namespaces_look_at_their_own_inputs() {
        let classifier = TagClassifier::new(&default_tag_rules());
        let tags = classifier.classify(&commit("Fix: crash in parser", &["src/core/x.rs"]));

        assert_eq!(
            names(&tags),
            vec![
                "Area:core".to_string(),
                "Role:bug-fix".to_string(),
                "Role:maintainer".to_string(),
                "Technology:rust".to_string(),
            ]
        );
    }

    #[test]
    fn area_matching_is_case_sensitive() {
        let classifier = TagClassifier::new(&default_tag_rules());
        assert!(classifier.path_matches("SRC/CORE/x.txt").next().is_none());
        assert_eq!(
            classifier
                .path_matches("crates/api/Cargo.toml")
                .map(|rule| rule.name.as_str())
                .collect::<Vec<_>>(),
            vec!["rust", "api"]
        );
    }

    #[test]
    fn role_tags_never_come_from_paths() {
        let classifier = TagClassifier::new(&default_tag_rules());
        let tags = classifier.classify(&commit("update readme", &["feat:/notes.txt"]));
        assert!(tags.iter().all(|tag| tag.namespace != TagNamespace::Role));
    }

    #[test]
    fn comments_are_not_classified() {
        let classifier = TagClassifier::new(&default_tag_rules());
        let comment = ActivityRecord::Comment(shared::Comment {
            id: "1".into(),
            author_login: "alice".into(),
            created_at: Utc::now(),
            body: "fix: use the rest api".into(),
            extra: Extra::new(),
        });
        assert!(classifier.classify(&comment).is_empty());
    }
}
