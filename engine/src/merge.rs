use std::collections::BTreeMap;

use shared::{login_key, ContributorProfile, EngineError, InsertOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub profile: ContributorProfile,
    pub conflicts: Vec<EngineError>,
}

/// Union of two partial profiles of the same login.
///
/// Activity is unioned by record key, so counters are set sizes rather than sums.
/// The score is the larger provisional value, the summary the freshest non-empty
/// one and the avatar the first non-empty one. Derived tag data is dropped; it is
/// recomputed from the merged set.
pub fn merge_pair(left: &ContributorProfile, right: &ContributorProfile) -> Merged {
    let mut profile = left.clone();
    profile.clear_derived();
    profile.score = left.score.max(right.score);

    if profile.avatar_url.as_deref().map_or(true, str::is_empty) {
        profile.avatar_url = right.avatar_url.clone().filter(|url| !url.is_empty());
    }

    if let Some((summary, as_of)) = freshest_summary(left, right) {
        profile.summary = summary;
        profile.summary_as_of = as_of;
    }

    let mut conflicts = vec![];
    for record in right.records() {
        if profile.insert_record(record.clone()) == InsertOutcome::Conflict {
            tracing::warn!(
                "{} {} of {} differs between sources, keeping the first",
                record.kind(),
                record.id(),
                profile.login
            );
            conflicts.push(EngineError::MergeConflict {
                login: profile.login.clone(),
                record_kind: record.kind(),
                id: record.id().clone(),
            });
        }
    }

    Merged { profile, conflicts }
}

/// Summaries compete by recency marker; equal markers fall back to the text so the
/// choice does not depend on argument order.
fn freshest_summary(
    left: &ContributorProfile,
    right: &ContributorProfile,
) -> Option<(String, Option<chrono::NaiveDate>)> {
    [left, right]
        .into_iter()
        .filter(|p| !p.summary.trim().is_empty())
        .max_by(|a, b| {
            (a.summary_as_of, &a.summary).cmp(&(b.summary_as_of, &b.summary))
        })
        .map(|p| (p.summary.clone(), p.summary_as_of))
}

/// Folds any number of partial profiles of one login, starting from an empty one.
pub fn merge(profiles: &[ContributorProfile]) -> Option<Merged> {
    let (first, rest) = profiles.split_first()?;
    let seed = merge_pair(&ContributorProfile::new(first.login.clone()), first);
    Some(rest.iter().fold(seed, |acc, next| {
        let mut merged = merge_pair(&acc.profile, next);
        let mut conflicts = acc.conflicts;
        conflicts.append(&mut merged.conflicts);
        Merged {
            profile: merged.profile,
            conflicts,
        }
    }))
}

/// Groups partial profiles by case-insensitive login and merges each group.
/// Output is ordered by login key.
#[tracing::instrument(skip_all, fields(partials = profiles.len()))]
pub fn merge_by_login(profiles: Vec<ContributorProfile>) -> Vec<Merged> {
    let mut groups: BTreeMap<String, Vec<ContributorProfile>> = BTreeMap::new();
    for profile in profiles {
        groups
            .entry(login_key(&profile.login))
            .or_default()
            .push(profile);
    }
    groups
        .into_values()
        .filter_map(|group| merge(&group))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use shared::{ActivityRecord, Commit, Extra};

    use super::*;

    fn commit(id: &str, message: &str) -> ActivityRecord {
        ActivityRecord::Commit(Commit {
            id: id.to_string(),
            author_login: "alice".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 11, 5, 10, 0, 0).unwrap(),
            message: message.to_string(),
            additions: 1,
            deletions: 0,
            files: vec![],
            extra: Extra::new(),
        })
    }

    fn profile_with(ids: &[&str]) -> ContributorProfile {
        let mut profile = ContributorProfile::new("alice");
        for id in ids {
            profile.insert_record(commit(id, &format!("commit {id}")));
        }
        profile
    }

    #[test]
    fn overlapping_windows_are_not_double_counted() {
        let a = profile_with(&["1", "2", "3"]);
        let b = profile_with(&["2", "3", "4"]);

        let merged = merge(&[a, b]).unwrap();
        assert_eq!(merged.profile.total_commits(), 4);
        assert!(merged.conflicts.is_empty());
    }

    #[test]
    fn scalar_fields_follow_their_rules() {
        let mut a = profile_with(&["1"]);
        a.score = 10;
        a.summary = "old".into();
        a.summary_as_of = NaiveDate::from_ymd_opt(2024, 11, 1);

        let mut b = profile_with(&["2"]);
        b.score = 4;
        b.avatar_url = Some("https://avatars.example/alice".into());
        b.summary = "new".into();
        b.summary_as_of = NaiveDate::from_ymd_opt(2024, 11, 2);

        let mut c = profile_with(&[]);
        c.avatar_url = Some("https://avatars.example/other".into());
        c.summary = String::new();
        c.summary_as_of = NaiveDate::from_ymd_opt(2024, 12, 1);

        let merged = merge(&[a, b, c]).unwrap().profile;
        assert_eq!(merged.score, 10);
        assert_eq!(merged.summary, "new");
        assert_eq!(
            merged.avatar_url.as_deref(),
            Some("https://avatars.example/alice")
        );
    }

    #[test]
    fn conflicting_content_keeps_first_and_reports() {
        let mut a = ContributorProfile::new("alice");
        a.insert_record(commit("1", "feat: first"));
        let mut b = ContributorProfile::new("alice");
        b.insert_record(commit("1", "feat: second"));

        let merged = merge_pair(&a, &b);
        assert_eq!(merged.conflicts.len(), 1);
        assert_eq!(merged.profile.records().next().unwrap().text(), "feat: first");
    }

    #[test]
    fn groups_logins_case_insensitively() {
        let upper = ContributorProfile::new("Alice");
        let mut lower = profile_with(&["9"]);
        lower.login = "alice".into();
        let other = profile_with(&["9"]);
        let mut bob = other.clone();
        bob.login = "bob".into();

        let merged = merge_by_login(vec![upper, lower, bob]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].profile.login, "Alice");
        assert_eq!(merged[0].profile.total_commits(), 1);
        assert_eq!(merged[1].profile.login, "bob");
    }

    fn ids() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(0u8..32, 0..24)
    }

    fn build(ids: &[u8]) -> ContributorProfile {
        let ids: Vec<String> = ids.iter().map(u8::to_string).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        profile_with(&refs)
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(a in ids(), b in ids()) {
            let (a, b) = (build(&a), build(&b));
            let ab = merge_pair(&a, &b).profile;
            let again = merge_pair(&ab, &b).profile;
            prop_assert_eq!(again, ab);
        }

        #[test]
        fn merge_is_commutative_for_sets(a in ids(), b in ids()) {
            let (a, b) = (build(&a), build(&b));
            let ab = merge_pair(&a, &b).profile;
            let ba = merge_pair(&b, &a).profile;
            prop_assert_eq!(ab.record_keys().collect::<Vec<_>>(), ba.record_keys().collect::<Vec<_>>());
            prop_assert_eq!(ab.total_commits(), ba.total_commits());
        }

        #[test]
        fn totals_equal_distinct_ids(a in ids(), b in ids()) {
            let distinct: std::collections::BTreeSet<u8> = a.iter().chain(b.iter()).copied().collect();
            let merged = merge(&[build(&a), build(&b)]).unwrap().profile;
            prop_assert_eq!(merged.total_commits(), distinct.len());
        }
    }
}
