//! Overdue review reminders.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{info, instrument};

use storage::{JobType, Store};

use crate::jobs::enqueue_notification;
use crate::notify::{NotificationTemplates, TemplateVars};

/// Queue one reminder per overdue review and flag each as notified.
///
/// A review is overdue when its publication's due date is before `today`
/// and it is neither completed nor already reminded.
#[instrument(skip(store, templates))]
pub async fn check_overdue(
    store: &Store,
    templates: &NotificationTemplates,
    today: NaiveDate,
) -> Result<usize> {
    let overdue = store.overdue_reviews(today).await?;

    for review in &overdue {
        let vars = TemplateVars {
            reviewer_name: review.reviewer.name.clone(),
            year_month: review.year_month,
            due_date: review.due_date,
            review_id: review.review_id,
        };
        let message = templates.review_overdue(&review.reviewer.email, &vars);
        enqueue_notification(store, JobType::ReviewOverdue, &message).await?;
        store.mark_overdue_notified(review.review_id).await?;
    }

    info!(count = overdue.len(), "Overdue check complete");
    Ok(overdue.len())
}
