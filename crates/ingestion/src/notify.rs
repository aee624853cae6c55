//! Reviewer notifications.
//!
//! Messages are rendered from templates with `{{placeholder}}` variables
//! and handed to a [`Notifier`]. The stock [`LogNotifier`] only records the
//! message through `tracing`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

use cdi_common::YearMonth;

/// A rendered message for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<i64>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        counter!("cdi_notifications_total").increment(1);
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            review_id = ?notification.review_id,
            body = %notification.body,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier lock poisoned"))?
            .push(notification.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationTemplates {
    pub review_request_subject: String,
    pub review_request_body: String,
    pub review_overdue_subject: String,
    pub review_overdue_body: String,
}

impl Default for NotificationTemplates {
    fn default() -> Self {
        Self {
            review_request_subject: "CDI map review request: {{year_month}}".to_string(),
            review_request_body: "Dear {{reviewer_name}},\n\n\
                The CDI map for {{year_month}} is ready for your review. \
                Please submit your suggestions (review #{{review_id}}) before {{due_date}}.\n"
                .to_string(),
            review_overdue_subject: "Overdue CDI map review: {{year_month}}".to_string(),
            review_overdue_body: "Dear {{reviewer_name}},\n\n\
                Your review #{{review_id}} of the CDI map for {{year_month}} was due on \
                {{due_date}} and has not been completed yet.\n"
                .to_string(),
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    pub reviewer_name: String,
    pub year_month: YearMonth,
    pub due_date: NaiveDate,
    pub review_id: i64,
}

impl TemplateVars {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "reviewer_name" => Some(self.reviewer_name.clone()),
            "year_month" => Some(self.year_month.label()),
            "due_date" => Some(self.due_date.format("%d %B %Y").to_string()),
            "review_id" => Some(self.review_id.to_string()),
            _ => None,
        }
    }
}

/// Replace `{{name}}` placeholders. Unknown names are left as written.
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match vars.lookup(key) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl NotificationTemplates {
    pub fn review_request(&self, recipient: &str, vars: &TemplateVars) -> Notification {
        Notification {
            recipient: recipient.to_string(),
            subject: render_template(&self.review_request_subject, vars),
            body: render_template(&self.review_request_body, vars),
            review_id: Some(vars.review_id),
        }
    }

    pub fn review_overdue(&self, recipient: &str, vars: &TemplateVars) -> Notification {
        Notification {
            recipient: recipient.to_string(),
            subject: render_template(&self.review_overdue_subject, vars),
            body: render_template(&self.review_overdue_body, vars),
            review_id: Some(vars.review_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars {
            reviewer_name: "Thandi".to_string(),
            year_month: YearMonth::new(2025, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
            review_id: 42,
        }
    }

    #[test]
    fn test_render_all_placeholders() {
        let text = render_template(
            "{{reviewer_name}} / {{ year_month }} / {{due_date}} / #{{review_id}}",
            &vars(),
        );
        assert_eq!(text, "Thandi / January 2025 / 14 February 2025 / #42");
    }

    #[test]
    fn test_unknown_and_unclosed_placeholders_kept() {
        assert_eq!(render_template("Hi {{nobody}}!", &vars()), "Hi {{nobody}}!");
        assert_eq!(render_template("Hi {{reviewer_name", &vars()), "Hi {{reviewer_name");
    }

    #[test]
    fn test_default_templates() {
        let templates = NotificationTemplates::default();
        let message = templates.review_overdue("thandi@example.org", &vars());
        assert_eq!(message.subject, "Overdue CDI map review: January 2025");
        assert!(message.body.starts_with("Dear Thandi,"));
        assert!(message.body.contains("due on 14 February 2025"));
        assert_eq!(message.review_id, Some(42));
    }

    #[tokio::test]
    async fn test_memory_notifier_records() {
        let notifier = MemoryNotifier::default();
        let message = NotificationTemplates::default().review_request("a@b.c", &vars());
        notifier.send(&message).await.unwrap();
        LogNotifier.send(&message).await.unwrap();
        assert_eq!(notifier.sent(), vec![message]);
    }
}
