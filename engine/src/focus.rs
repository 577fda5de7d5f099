use std::collections::BTreeMap;

use itertools::Itertools;
use shared::{ContributorProfile, FocusArea};

/// Top-level directories touched most often by a contributor's pull requests and
/// commits. Files at the repository root do not count; ties go to the name.
pub fn focus_areas(profile: &ContributorProfile, limit: usize) -> Vec<FocusArea> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in profile.records() {
        for dir in record.files().iter().filter_map(|file| file.top_level_dir()) {
            *counts.entry(dir).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .sorted_by(|(a_dir, a_count), (b_dir, b_count)| {
            b_count.cmp(a_count).then_with(|| a_dir.cmp(b_dir))
        })
        .take(limit)
        .map(|(area, count)| FocusArea {
            area: area.to_string(),
            count,
        })
        .collect()
}
