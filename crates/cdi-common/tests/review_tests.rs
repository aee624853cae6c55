//! Review aggregation scenarios with several reviewers.

use cdi_common::review::{
    aggregate_reviews, apply_bulk_validation, publication_progress, review_progress,
    ReviewFilter, ReviewSnapshot, ReviewerInfo,
};
use cdi_common::{CategoryValue, DroughtCategory, Suggestion};
use chrono::Utc;
use test_utils::strip_initial_values;

fn reviewer(id: i64) -> ReviewerInfo {
    ReviewerInfo {
        id,
        name: format!("Reviewer {}", id),
        email: format!("reviewer{}@example.com", id),
        technical_working_group: Some("Agriculture".into()),
    }
}

fn suggestion(adm: i64, cat: DroughtCategory, comment: Option<&str>) -> Suggestion {
    Suggestion {
        administration_id: adm,
        value: None,
        category: Some(cat),
        comment: comment.map(str::to_string),
        reviewed: true,
    }
}

fn review(id: i64, user: i64, completed: bool, suggestions: Vec<Suggestion>) -> ReviewSnapshot {
    ReviewSnapshot {
        id,
        user: reviewer(user),
        is_completed: completed,
        completed_at: completed.then(Utc::now),
        suggestion_values: suggestions,
    }
}

/// Reviewers 10 and 11 agree on regions 1 and 3 but not on 2; reviewer 12 is pending.
fn scenario() -> Vec<ReviewSnapshot> {
    vec![
        review(
            1,
            10,
            true,
            vec![
                suggestion(1, DroughtCategory::D4, None),
                suggestion(2, DroughtCategory::D1, Some("looks wetter")),
                suggestion(3, DroughtCategory::Normal, None),
            ],
        ),
        review(
            2,
            11,
            true,
            vec![
                suggestion(1, DroughtCategory::D4, None),
                suggestion(2, DroughtCategory::D2, None),
                suggestion(3, DroughtCategory::Normal, None),
            ],
        ),
        review(3, 12, false, vec![suggestion(1, DroughtCategory::D0, None)]),
    ]
}

// ============================================================================
// Progress
// ============================================================================

#[test]
fn test_progress_strings() {
    assert_eq!(publication_progress(&scenario()), "2/3");

    let s = vec![
        suggestion(1, DroughtCategory::D4, None),
        Suggestion {
            reviewed: false,
            ..suggestion(2, DroughtCategory::D1, None)
        },
    ];
    assert_eq!(review_progress(&s, 3), "1/3");
    assert_eq!(review_progress(&s, 0), "1/2");
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_aggregate_uses_completed_reviews_only() {
    let summary = aggregate_reviews(7, None, &scenario(), ReviewFilter::default());
    assert_eq!(summary.id, 7);
    assert_eq!(summary.reviews.len(), 6);
    assert!(summary.reviews.iter().all(|e| e.user_id != 12));
    let user_ids: Vec<i64> = summary.users.iter().map(|u| u.id).collect();
    assert_eq!(user_ids, vec![10, 11]);
    assert_eq!(summary.reviews[1].comment.as_deref(), Some("looks wetter"));
}

#[test]
fn test_aggregate_without_completed_reviews_is_empty() {
    let pending = vec![review(1, 10, false, vec![suggestion(1, DroughtCategory::D4, None)])];
    let summary = aggregate_reviews(7, None, &pending, ReviewFilter::default());
    assert!(summary.reviews.is_empty());
    assert!(summary.users.is_empty());
}

#[test]
fn test_non_disputed_filter() {
    let filter = ReviewFilter {
        non_disputed: true,
        non_validated: false,
    };
    let summary = aggregate_reviews(7, None, &scenario(), filter);
    assert_eq!(summary.reviews.len(), 4);
    assert!(summary.reviews.iter().all(|e| e.administration_id != 2));
}

#[test]
fn test_non_validated_filter() {
    let validated = vec![
        CategoryValue::new(1, Some(0.01), Some(DroughtCategory::D4)),
        CategoryValue::new(3, Some(0.5), None),
    ];
    let filter = ReviewFilter {
        non_disputed: false,
        non_validated: true,
    };
    let summary = aggregate_reviews(7, Some(&validated), &scenario(), filter);
    // Region 3 has an entry but no category yet, so it stays
    let ids: Vec<i64> = summary.reviews.iter().map(|e| e.administration_id).collect();
    assert_eq!(ids, vec![2, 3, 2, 3]);
    assert_eq!(summary.validated_values.unwrap().len(), 2);
}

#[test]
fn test_both_filters() {
    let validated = vec![CategoryValue::new(1, None, Some(DroughtCategory::D4))];
    let filter = ReviewFilter {
        non_disputed: true,
        non_validated: true,
    };
    let summary = aggregate_reviews(7, Some(&validated), &scenario(), filter);
    let ids: Vec<i64> = summary.reviews.iter().map(|e| e.administration_id).collect();
    assert_eq!(ids, vec![3, 3]);
}

// ============================================================================
// Bulk validation
// ============================================================================

#[test]
fn test_bulk_validation_copies_unanimous_categories() {
    let initial = strip_initial_values();
    let (values, applied) = apply_bulk_validation(None, &initial, &scenario(), &[1, 2, 3]);
    assert_eq!(applied, vec![1, 3]);
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].category, Some(DroughtCategory::D4));
    assert_eq!(values[0].value, Some(0.01));
    assert_eq!(values[1].administration_id, 3);
}

#[test]
fn test_bulk_validation_keeps_existing_entries() {
    let initial = strip_initial_values();
    let existing = vec![
        CategoryValue::new(2, Some(0.15), Some(DroughtCategory::D2)),
        CategoryValue::new(3, Some(0.5), Some(DroughtCategory::D0)),
    ];
    let (values, applied) = apply_bulk_validation(Some(&existing), &initial, &scenario(), &[3]);
    assert_eq!(applied, vec![3]);
    let ids: Vec<i64> = values.iter().map(|v| v.administration_id).collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(values[0].category, Some(DroughtCategory::D2));
    assert_eq!(values[1].category, Some(DroughtCategory::Normal));
}

// ============================================================================
// Partial coverage
// ============================================================================

/// Reviewer 10 rates regions 1 and 2, reviewer 11 only region 2.
fn partial_scenario() -> Vec<ReviewSnapshot> {
    vec![
        review(
            1,
            10,
            true,
            vec![
                suggestion(1, DroughtCategory::D4, None),
                suggestion(2, DroughtCategory::D0, None),
            ],
        ),
        review(2, 11, true, vec![suggestion(2, DroughtCategory::D0, None)]),
    ]
}

#[test]
fn test_region_rated_by_one_reviewer_is_disputed() {
    let filter = ReviewFilter {
        non_disputed: true,
        non_validated: false,
    };
    let summary = aggregate_reviews(7, None, &partial_scenario(), filter);
    let ids: Vec<i64> = summary.reviews.iter().map(|e| e.administration_id).collect();
    assert_eq!(ids, vec![2, 2]);

    let initial = strip_initial_values();
    let (values, applied) = apply_bulk_validation(None, &initial, &partial_scenario(), &[1, 2]);
    assert_eq!(applied, vec![2]);
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].administration_id, 2);
    assert_eq!(values[0].category, Some(DroughtCategory::D0));
}

#[test]
fn test_region_without_categories_is_disputed() {
    let blank = |adm| Suggestion {
        category: None,
        ..suggestion(adm, DroughtCategory::Normal, Some("no opinion"))
    };
    let reviews = vec![
        review(1, 10, true, vec![blank(2), suggestion(3, DroughtCategory::D1, None)]),
        review(2, 11, true, vec![blank(2), suggestion(3, DroughtCategory::D1, None)]),
    ];
    let filter = ReviewFilter {
        non_disputed: true,
        non_validated: false,
    };
    let summary = aggregate_reviews(7, None, &reviews, filter);
    assert!(summary.reviews.iter().all(|e| e.administration_id == 3));
    assert_eq!(summary.reviews.len(), 2);

    let (_, applied) = apply_bulk_validation(None, &strip_initial_values(), &reviews, &[2, 3]);
    assert_eq!(applied, vec![3]);
}
