//! Built-in transactional email templates rendered with `{{variable}}`
//! substitution. Values are HTML-escaped before insertion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every email the platform sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    Welcome,
    PasswordReset,
    ScheduleReminder,
    ScheduleOverdue,
    ActionPlanOverdue,
    PaymentReceipt,
    SubscriptionExpiring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub template: EmailTemplate,
    pub subject: String,
    pub html: String,
}

impl EmailTemplate {
    pub fn name(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::PasswordReset => "password_reset",
            Self::ScheduleReminder => "schedule_reminder",
            Self::ScheduleOverdue => "schedule_overdue",
            Self::ActionPlanOverdue => "action_plan_overdue",
            Self::PaymentReceipt => "payment_receipt",
            Self::SubscriptionExpiring => "subscription_expiring",
        }
    }

    /// Variables the template refers to. Missing values render empty.
    pub fn variables(self) -> &'static [&'static str] {
        match self {
            Self::Welcome => &["name", "organization", "email", "temporary_password", "login_url"],
            Self::PasswordReset => &["name", "reset_url", "expires_minutes"],
            Self::ScheduleReminder => &["name", "title", "due_date", "days_left", "link"],
            Self::ScheduleOverdue => &["name", "title", "due_date", "link"],
            Self::ActionPlanOverdue => &["name", "title", "due_date", "link"],
            Self::PaymentReceipt => &[
                "organization",
                "plan",
                "amount",
                "currency",
                "provider",
                "receipt",
                "period_end",
            ],
            Self::SubscriptionExpiring => &["organization", "plan", "period_end", "days_left", "billing_url"],
        }
    }

    fn subject_template(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome to ComplianceHub, {{name}}",
            Self::PasswordReset => "Reset your ComplianceHub password",
            Self::ScheduleReminder => "Reminder: {{title}} is due on {{due_date}}",
            Self::ScheduleOverdue => "Overdue: {{title}} was due on {{due_date}}",
            Self::ActionPlanOverdue => "Action plan overdue: {{title}}",
            Self::PaymentReceipt => "Payment received for {{organization}}",
            Self::SubscriptionExpiring => "Your {{plan}} subscription ends on {{period_end}}",
        }
    }

    fn body_template(self) -> &'static str {
        match self {
            Self::Welcome => {
                "<p>Hello {{name}},</p>\
                 <p>An account has been created for you in <strong>{{organization}}</strong>.</p>\
                 <p>Sign in as <code>{{email}}</code> with the temporary password \
                 <code>{{temporary_password}}</code> and change it after your first login.</p>\
                 <p><a href=\"{{login_url}}\">Sign in</a></p>"
            }
            Self::PasswordReset => {
                "<p>Hello {{name}},</p>\
                 <p>We received a request to reset your password. The link below is valid \
                 for {{expires_minutes}} minutes.</p>\
                 <p><a href=\"{{reset_url}}\">Reset password</a></p>\
                 <p>If you did not request this, you can ignore this email.</p>"
            }
            Self::ScheduleReminder => {
                "<p>Hello {{name}},</p>\
                 <p>The compliance task <strong>{{title}}</strong> is due on {{due_date}} \
                 ({{days_left}} day(s) left).</p>\
                 <p><a href=\"{{link}}\">Open schedule</a></p>"
            }
            Self::ScheduleOverdue => {
                "<p>Hello {{name}},</p>\
                 <p>The compliance task <strong>{{title}}</strong> was due on {{due_date}} \
                 and has not been completed.</p>\
                 <p><a href=\"{{link}}\">Open schedule</a></p>"
            }
            Self::ActionPlanOverdue => {
                "<p>Hello {{name}},</p>\
                 <p>The remediation action <strong>{{title}}</strong> passed its due date \
                 of {{due_date}}.</p>\
                 <p><a href=\"{{link}}\">Open action plan</a></p>"
            }
            Self::PaymentReceipt => {
                "<p>Thank you. We received {{currency}} {{amount}} via {{provider}} for the \
                 <strong>{{plan}}</strong> plan of {{organization}}.</p>\
                 <p>Receipt: {{receipt}}</p>\
                 <p>Your subscription is active until {{period_end}}.</p>"
            }
            Self::SubscriptionExpiring => {
                "<p>The <strong>{{plan}}</strong> subscription of {{organization}} ends on \
                 {{period_end}} ({{days_left}} day(s) left).</p>\
                 <p><a href=\"{{billing_url}}\">Renew now</a> to keep access to your data.</p>"
            }
        }
    }

    pub fn render(self, variables: &HashMap<String, String>) -> RenderedEmail {
        let subject = substitute(self.subject_template(), variables, self.variables(), false);
        let body = substitute(self.body_template(), variables, self.variables(), true);
        RenderedEmail {
            template: self,
            subject,
            html: layout(&body),
        }
    }
}

impl std::fmt::Display for EmailTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Build a variable map from `(name, value)` pairs.
pub fn template_vars<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

fn substitute(
    template: &str,
    variables: &HashMap<String, String>,
    names: &[&str],
    escape: bool,
) -> String {
    let mut result = template.to_string();
    for name in names {
        let placeholder = format!("{{{{{}}}}}", name);
        let value = variables.get(*name).cloned().unwrap_or_default();
        let value = if escape { escape_html(&value) } else { value };
        result = result.replace(&placeholder, &value);
    }
    result
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;color:#1f2937\">\
         <div style=\"max-width:600px;margin:0 auto\">\
         <h2 style=\"color:#1e3a8a\">ComplianceHub</h2>{body}\
         <hr/><p style=\"font-size:12px;color:#6b7280\">This is an automated message.</p>\
         </div></body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_subject_and_body() {
        let vars = template_vars([
            ("name", "Amina"),
            ("title", "Quarterly AML return"),
            ("due_date", "2026-10-31"),
            ("days_left", "3"),
            ("link", "http://localhost:3000/schedules/1"),
        ]);
        let rendered = EmailTemplate::ScheduleReminder.render(&vars);
        assert_eq!(
            rendered.subject,
            "Reminder: Quarterly AML return is due on 2026-10-31"
        );
        assert!(rendered.html.contains("Hello Amina"));
        assert!(rendered.html.contains("(3 day(s) left)"));
        assert!(!rendered.html.contains("{{"));
    }

    #[test]
    fn test_missing_variables_render_empty() {
        let rendered = EmailTemplate::PasswordReset.render(&HashMap::new());
        assert!(rendered.html.contains("Hello ,"));
        assert!(!rendered.html.contains("{{reset_url}}"));
    }

    #[test]
    fn test_values_are_escaped_in_body() {
        let vars = template_vars([("name", "<script>alert(1)</script>")]);
        let rendered = EmailTemplate::Welcome.render(&vars);
        assert!(rendered.html.contains("&lt;script&gt;"));
        assert!(!rendered.html.contains("<script>"));
    }
}
