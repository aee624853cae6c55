//! Multi-reviewer aggregation for a publication.
//!
//! Only completed reviews contribute. A review counts as completed when it
//! is flagged complete and carries a completion time.

use crate::category::DroughtCategory;
use crate::publication::progress;
use crate::values::{CategoryValue, Suggestion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Public profile of a reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub technical_working_group: Option<String>,
}

/// A review as seen by the aggregation logic.
#[derive(Debug, Clone)]
pub struct ReviewSnapshot {
    pub id: i64,
    pub user: ReviewerInfo,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub suggestion_values: Vec<Suggestion>,
}

impl ReviewSnapshot {
    pub fn is_complete(&self) -> bool {
        self.is_completed && self.completed_at.is_some()
    }
}

/// One reviewer's suggestion for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub user_id: i64,
    pub administration_id: i64,
    pub category: Option<DroughtCategory>,
    pub comment: Option<String>,
}

/// Query flags for [`aggregate_reviews`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    /// Keep only regions every completed reviewer rated with the same category.
    pub non_disputed: bool,
    /// Drop regions that already have a validated category.
    pub non_validated: bool,
}

/// Aggregated review state returned to administrators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub id: i64,
    pub validated_values: Option<Vec<CategoryValue>>,
    pub reviews: Vec<ReviewEntry>,
    pub users: Vec<ReviewerInfo>,
}

/// `"{completed}/{total}"` over all reviews of a publication.
pub fn publication_progress(reviews: &[ReviewSnapshot]) -> String {
    let completed = reviews.iter().filter(|r| r.is_completed).count();
    progress(completed, reviews.len())
}

/// `"{reviewed}/{total}"` for one review. `total_administrations` of zero
/// falls back to the number of suggestions.
pub fn review_progress(suggestions: &[Suggestion], total_administrations: usize) -> String {
    let reviewed = suggestions.iter().filter(|s| s.reviewed).count();
    let total = if total_administrations == 0 {
        suggestions.len()
    } else {
        total_administrations
    };
    progress(reviewed, total)
}

/// True once every review is complete. A publication without reviews never is.
pub fn all_reviews_complete(reviews: &[ReviewSnapshot]) -> bool {
    !reviews.is_empty() && reviews.iter().all(ReviewSnapshot::is_complete)
}

/// Flatten completed reviews into per-region entries, in review order.
pub fn completed_entries(reviews: &[ReviewSnapshot]) -> Vec<ReviewEntry> {
    let mut ordered: Vec<&ReviewSnapshot> = reviews.iter().filter(|r| r.is_complete()).collect();
    ordered.sort_by_key(|r| r.id);
    ordered
        .into_iter()
        .flat_map(|r| {
            r.suggestion_values.iter().map(move |s| ReviewEntry {
                user_id: r.user.id,
                administration_id: s.administration_id,
                category: s.category,
                comment: s.comment.clone(),
            })
        })
        .collect()
}

/// Category the completed reviewers agree on, per region.
///
/// A region qualifies only when every completed review rates it with a
/// category and those categories are all equal. A region that some completed
/// reviewer skipped, or left without a category, is disputed.
pub fn unanimous_categories(reviews: &[ReviewSnapshot]) -> BTreeMap<i64, DroughtCategory> {
    let completed: Vec<&ReviewSnapshot> = reviews.iter().filter(|r| r.is_complete()).collect();

    let mut votes: BTreeMap<i64, Vec<Option<DroughtCategory>>> = BTreeMap::new();
    for review in &completed {
        let mut rated = HashSet::new();
        for s in &review.suggestion_values {
            if rated.insert(s.administration_id) {
                votes.entry(s.administration_id).or_default().push(s.category);
            }
        }
    }

    votes
        .into_iter()
        .filter(|(_, cats)| cats.len() == completed.len())
        .filter_map(|(id, cats)| {
            let first = cats.first().copied().flatten()?;
            cats.iter().all(|c| *c == Some(first)).then_some((id, first))
        })
        .collect()
}

fn validated_ids(validated: Option<&[CategoryValue]>) -> HashSet<i64> {
    validated
        .unwrap_or_default()
        .iter()
        .filter(|v| v.category.is_some())
        .map(|v| v.administration_id)
        .collect()
}

/// Aggregate the completed reviews of a publication.
pub fn aggregate_reviews(
    publication_id: i64,
    validated_values: Option<&[CategoryValue]>,
    reviews: &[ReviewSnapshot],
    filter: ReviewFilter,
) -> ReviewSummary {
    let mut entries = completed_entries(reviews);

    if filter.non_disputed {
        let agreed = unanimous_categories(reviews);
        entries.retain(|e| agreed.contains_key(&e.administration_id));
    }
    if filter.non_validated {
        let validated = validated_ids(validated_values);
        entries.retain(|e| !validated.contains(&e.administration_id));
    }

    let mut completed: Vec<&ReviewSnapshot> = reviews.iter().filter(|r| r.is_complete()).collect();
    completed.sort_by_key(|r| r.id);
    let mut user_ids = HashSet::new();
    let users = completed
        .into_iter()
        .filter(|r| user_ids.insert(r.user.id))
        .map(|r| r.user.clone())
        .collect();

    ReviewSummary {
        id: publication_id,
        validated_values: validated_values.map(<[CategoryValue]>::to_vec),
        reviews: entries,
        users,
    }
}

/// Copy unanimous reviewer categories into the validated values.
///
/// Only the requested regions that are non-disputed are touched. Existing
/// validated entries for other regions are kept. Returns the new values and
/// the regions that were set.
pub fn apply_bulk_validation(
    validated_values: Option<&[CategoryValue]>,
    initial_values: &[CategoryValue],
    reviews: &[ReviewSnapshot],
    administration_ids: &[i64],
) -> (Vec<CategoryValue>, Vec<i64>) {
    let unanimous = unanimous_categories(reviews);
    let initial: HashMap<i64, &CategoryValue> =
        initial_values.iter().map(|v| (v.administration_id, v)).collect();

    let mut values: Vec<CategoryValue> = validated_values.map(<[CategoryValue]>::to_vec).unwrap_or_default();
    let mut applied = Vec::new();

    for id in administration_ids {
        let Some(category) = unanimous.get(id).copied() else {
            continue;
        };
        match values.iter_mut().find(|v| v.administration_id == *id) {
            Some(existing) => existing.category = Some(category),
            None => values.push(CategoryValue::new(
                *id,
                initial.get(id).and_then(|v| v.value),
                Some(category),
            )),
        }
        applied.push(*id);
    }

    values.sort_by_key(|v| v.administration_id);
    (values, applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviewer(id: i64) -> ReviewerInfo {
        ReviewerInfo {
            id,
            name: format!("Reviewer {}", id),
            email: format!("r{}@example.com", id),
            technical_working_group: None,
        }
    }

    fn snapshot(id: i64, user: i64, done: bool, cats: &[(i64, i32)]) -> ReviewSnapshot {
        ReviewSnapshot {
            id,
            user: reviewer(user),
            is_completed: done,
            completed_at: done.then(Utc::now),
            suggestion_values: cats
                .iter()
                .map(|(adm, code)| Suggestion {
                    administration_id: *adm,
                    value: None,
                    category: DroughtCategory::from_code(*code as i64),
                    comment: None,
                    reviewed: true,
                })
                .collect(),
        }
    }

    #[test]
    fn test_completed_requires_timestamp() {
        let mut r = snapshot(1, 1, true, &[]);
        r.completed_at = None;
        assert!(!r.is_complete());
    }

    #[test]
    fn test_publication_progress() {
        let reviews = vec![snapshot(1, 1, true, &[]), snapshot(2, 2, false, &[])];
        assert_eq!(publication_progress(&reviews), "1/2");
        assert!(!all_reviews_complete(&reviews));
        assert!(!all_reviews_complete(&[]));
    }

    #[test]
    fn test_unanimous_requires_every_reviewer() {
        let reviews = vec![
            snapshot(1, 1, true, &[(10, 2), (11, 3), (12, 5)]),
            snapshot(2, 2, true, &[(10, 2), (11, 4)]),
            snapshot(3, 3, false, &[(10, 1)]),
        ];
        let agreed = unanimous_categories(&reviews);
        // 11 disagrees, 12 was skipped by reviewer 2; the pending review is ignored
        assert_eq!(agreed, BTreeMap::from([(10, DroughtCategory::D1)]));
    }
}
