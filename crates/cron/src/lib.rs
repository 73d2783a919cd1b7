//! Periodic compliance jobs: overdue schedules, reminders, overdue action
//! plans and subscription expiry.
//!
//! Every job remembers what it already handled (per due date or per
//! subscription period), so running it several times a day sends each
//! notice once.

use chrono::{DateTime, Utc};
use compliance_billing::{BillingEngine, Subscription, SubscriptionStatus};
use compliance_channels::{template_vars, DeliveryStatus, EmailService, EmailTemplate};
use compliance_core::calendar::days_between;
use compliance_core::config::CronConfig;
use compliance_core::Role;
use compliance_management::models::{NewNotification, NotificationKind, OrganizationStatus, UserRecord};
use compliance_management::{ComplianceStore, ManagementState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

/// Counts of what one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronReport {
    pub schedules_overdue: u64,
    pub schedule_reminders: u64,
    pub action_plans_overdue: u64,
    pub subscriptions_warned: u64,
    pub subscriptions_ended: u64,
    pub notifications: u64,
    pub emails: u64,
}

impl CronReport {
    pub fn is_empty(&self) -> bool {
        *self == CronReport::default()
    }
}

pub struct CronRunner {
    store: Arc<ComplianceStore>,
    billing: Arc<BillingEngine>,
    mailer: Arc<EmailService>,
    config: CronConfig,
}

impl CronRunner {
    pub fn new(state: &ManagementState) -> Self {
        Self {
            store: state.store.clone(),
            billing: state.billing.clone(),
            mailer: state.mailer.clone(),
            config: state.config.cron.clone(),
        }
    }

    /// Spawn the background loop. The first run happens immediately.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        info!(interval_secs = period.as_secs(), "Cron loop started");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let report = self.run_once(Utc::now()).await;
                if !report.is_empty() {
                    info!(?report, "Cron run finished");
                }
            }
        })
    }

    /// Run every job once.
    pub async fn run_once(&self, now: DateTime<Utc>) -> CronReport {
        let mut report = CronReport::default();
        self.overdue_schedules(now, &mut report).await;
        self.schedule_reminders(now, &mut report).await;
        self.overdue_action_plans(now, &mut report).await;
        self.subscription_warnings(now, &mut report).await;
        self.end_subscriptions(now, &mut report);
        metrics::counter!("cron.runs").increment(1);
        report
    }

    /// The responsible user when active, else the organization's admins.
    fn recipients(&self, org: Uuid, responsible: Option<Uuid>) -> Vec<UserRecord> {
        if let Some(user) = responsible
            .and_then(|id| self.store.user(org, id).ok())
            .filter(|u| u.is_active)
        {
            return vec![user];
        }
        self.store.users_with_role(org, Role::Admin)
    }

    async fn deliver(
        &self,
        org: Uuid,
        users: &[UserRecord],
        notification: NewNotification,
        template: EmailTemplate,
        vars: HashMap<String, String>,
        report: &mut CronReport,
    ) {
        for user in users {
            self.store.notify(org, user.id, notification.clone());
            report.notifications += 1;

            let mut vars = vars.clone();
            vars.insert("name".into(), user.full_name());
            let sent = self.mailer.send_template(&user.email, template, vars).await;
            if sent.status == DeliveryStatus::Sent {
                report.emails += 1;
            }
        }
    }

    async fn overdue_schedules(&self, now: DateTime<Utc>, report: &mut CronReport) {
        for schedule in self.store.take_newly_overdue_schedules(now.date_naive()) {
            report.schedules_overdue += 1;
            let link = self.mailer.link(&format!("schedules/{}", schedule.id));
            let users = self.recipients(schedule.organization_id, schedule.responsible_user_id);
            self.deliver(
                schedule.organization_id,
                &users,
                NewNotification {
                    kind: NotificationKind::ScheduleOverdue,
                    title: format!("Overdue: {}", schedule.title),
                    message: format!("{} was due on {}", schedule.title, schedule.due_date),
                    link: Some(link.clone()),
                },
                EmailTemplate::ScheduleOverdue,
                template_vars([
                    ("title", schedule.title.clone()),
                    ("due_date", schedule.due_date.to_string()),
                    ("link", link),
                ]),
                report,
            )
            .await;
        }
    }

    async fn schedule_reminders(&self, now: DateTime<Utc>, report: &mut CronReport) {
        let today = now.date_naive();
        for schedule in self
            .store
            .take_schedules_due_for_reminder(today, self.config.reminder_days_ahead)
        {
            report.schedule_reminders += 1;
            let days_left = days_between(today, schedule.due_date);
            let link = self.mailer.link(&format!("schedules/{}", schedule.id));
            let users = self.recipients(schedule.organization_id, schedule.responsible_user_id);
            self.deliver(
                schedule.organization_id,
                &users,
                NewNotification {
                    kind: NotificationKind::ScheduleReminder,
                    title: format!("Due soon: {}", schedule.title),
                    message: format!("{} is due on {} ({days_left} day(s) left)", schedule.title, schedule.due_date),
                    link: Some(link.clone()),
                },
                EmailTemplate::ScheduleReminder,
                template_vars([
                    ("title", schedule.title.clone()),
                    ("due_date", schedule.due_date.to_string()),
                    ("days_left", days_left.to_string()),
                    ("link", link),
                ]),
                report,
            )
            .await;
        }
    }

    async fn overdue_action_plans(&self, now: DateTime<Utc>, report: &mut CronReport) {
        for plan in self.store.mark_overdue_action_plans(now.date_naive()) {
            report.action_plans_overdue += 1;
            let link = self.mailer.link(&format!("action-plans/{}", plan.id));
            let responsible = plan.responsible_user_id.or(Some(plan.created_by));
            let users = self.recipients(plan.organization_id, responsible);
            self.deliver(
                plan.organization_id,
                &users,
                NewNotification {
                    kind: NotificationKind::ActionPlanOverdue,
                    title: format!("Action plan overdue: {}", plan.title),
                    message: format!("{} passed its due date of {}", plan.title, plan.due_date),
                    link: Some(link.clone()),
                },
                EmailTemplate::ActionPlanOverdue,
                template_vars([
                    ("title", plan.title.clone()),
                    ("due_date", plan.due_date.to_string()),
                    ("link", link),
                ]),
                report,
            )
            .await;
        }
    }

    async fn subscription_warnings(&self, now: DateTime<Utc>, report: &mut CronReport) {
        let days = self.config.subscription_warning_days;
        for sub in self.billing.subscriptions_needing_warning(now, days) {
            let Ok(org) = self.store.organization(sub.organization_id) else {
                warn!(organization_id = %sub.organization_id, "Subscription without organization");
                self.billing.mark_warned(sub.organization_id);
                continue;
            };
            report.subscriptions_warned += 1;
            let days_left = days_between(now.date_naive(), sub.current_period_end.date_naive());
            let period_end = sub.current_period_end.format("%Y-%m-%d").to_string();
            let admins = self.store.users_with_role(org.id, Role::Admin);
            self.deliver(
                org.id,
                &admins,
                NewNotification {
                    kind: NotificationKind::SubscriptionExpiring,
                    title: "Subscription ending soon".into(),
                    message: format!("Your {} subscription ends on {period_end}", plan_name(&sub)),
                    link: Some(self.mailer.link("billing")),
                },
                EmailTemplate::SubscriptionExpiring,
                template_vars([
                    ("organization", org.name.clone()),
                    ("plan", plan_name(&sub).to_string()),
                    ("period_end", period_end.clone()),
                    ("days_left", days_left.to_string()),
                    ("billing_url", self.mailer.link("billing")),
                ]),
                report,
            )
            .await;
            self.billing.mark_warned(org.id);
        }
    }

    /// End lapsed subscriptions and suspend (or cancel) their organizations.
    fn end_subscriptions(&self, now: DateTime<Utc>, report: &mut CronReport) {
        for sub in self.billing.expire_ended(now) {
            report.subscriptions_ended += 1;
            let status = match sub.status {
                SubscriptionStatus::Cancelled => OrganizationStatus::Cancelled,
                _ => OrganizationStatus::Suspended,
            };
            if let Err(e) = self.store.set_organization_status(sub.organization_id, None, status) {
                warn!(organization_id = %sub.organization_id, error = %e, "Could not update organization status");
                continue;
            }
            let admins: Vec<Uuid> = self
                .store
                .users_with_role(sub.organization_id, Role::Admin)
                .into_iter()
                .map(|u| u.id)
                .collect();
            report.notifications += self.store.notify_many(
                sub.organization_id,
                &admins,
                NewNotification {
                    kind: NotificationKind::SubscriptionExpired,
                    title: "Subscription ended".into(),
                    message: format!(
                        "Your {} subscription has ended. Renew to restore access.",
                        plan_name(&sub)
                    ),
                    link: Some(self.mailer.link("billing")),
                },
            );
        }
    }
}

fn plan_name(sub: &Subscription) -> &'static str {
    match sub.status {
        SubscriptionStatus::Trialing => "trial",
        _ => sub.plan.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone};
    use compliance_core::{AppConfig, Frequency};
    use compliance_management::demo::{seed_demo, DEMO_ADMIN_EMAIL};
    use compliance_management::models::{CreateScheduleRequest, ScheduleStatus, UpdateUserRequest};

    fn state() -> ManagementState {
        let config = AppConfig::default();
        ManagementState::new(
            Arc::new(config.clone()),
            Arc::new(BillingEngine::new(config.billing.clone())),
            Arc::new(EmailService::new(config.email.clone())),
        )
    }

    fn at(date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_hms_opt(6, 0, 0).unwrap())
    }

    fn schedule(due: NaiveDate, reminder: Option<u32>, responsible: Uuid) -> CreateScheduleRequest {
        CreateScheduleRequest {
            title: "Monthly AML return".into(),
            description: None,
            frequency: Frequency::Monthly,
            custom_interval_days: None,
            due_date: due,
            responsible_user_id: Some(responsible),
            branch_id: None,
            clause_id: None,
            reminder_days_before: reminder,
        }
    }

    #[tokio::test]
    async fn test_schedule_jobs_run_once_per_due_date() {
        let state = state();
        let demo = seed_demo(&state).unwrap();
        let runner = CronRunner::new(&state);
        let today = Utc::now().date_naive() + ChronoDuration::days(400);

        // Far in the future every seeded schedule is overdue.
        let first = runner.run_once(at(today)).await;
        assert_eq!(first.schedules_overdue, 2);
        assert!(first.notifications >= 2);
        assert_eq!(first.action_plans_overdue, 1);

        let second = runner.run_once(at(today)).await;
        assert_eq!(second.schedules_overdue, 0);
        assert_eq!(second.action_plans_overdue, 0);

        let overdue = state.store.overdue_schedules(demo.organization_id, today);
        assert!(overdue.iter().all(|s| s.status == ScheduleStatus::Overdue));
    }

    #[tokio::test]
    async fn test_reminder_goes_to_responsible_user_by_email() {
        let state = state();
        let demo = seed_demo(&state).unwrap();
        let runner = CronRunner::new(&state);
        let today = Utc::now().date_naive() + ChronoDuration::days(500);
        let req = schedule(today + ChronoDuration::days(2), Some(3), demo.admin_id);
        state.store.create_schedule(demo.organization_id, demo.admin_id, req).unwrap();

        let report = runner.run_once(at(today)).await;
        assert_eq!(report.schedule_reminders, 1);
        let mails = state.mailer.sent_to(DEMO_ADMIN_EMAIL);
        assert!(mails.iter().any(|m| m.template == EmailTemplate::ScheduleReminder));
        assert_eq!(runner.run_once(at(today)).await.schedule_reminders, 0);
    }

    #[tokio::test]
    async fn test_inactive_responsible_user_falls_back_to_admins() {
        let state = state();
        let demo = seed_demo(&state).unwrap();
        let runner = CronRunner::new(&state);
        let officer = state
            .store
            .insert_user(UserRecord {
                id: Uuid::new_v4(),
                organization_id: demo.organization_id,
                branch_id: None,
                email: "officer@demo-bank.example".into(),
                first_name: "Compliance".into(),
                last_name: "Officer".into(),
                phone: None,
                role: Role::ComplianceOfficer,
                password_hash: String::new(),
                is_active: true,
                last_login_at: None,
                reset_token_hash: None,
                reset_token_expires_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();
        state
            .store
            .update_user(
                demo.organization_id,
                demo.admin_id,
                officer.id,
                UpdateUserRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let recipients = runner.recipients(demo.organization_id, Some(officer.id));
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].id, demo.admin_id);
    }

    #[tokio::test]
    async fn test_subscription_warning_then_expiry_suspends_organization() {
        let state = state();
        let demo = seed_demo(&state).unwrap();
        let runner = CronRunner::new(&state);
        let trial_end = state.billing.subscription(demo.organization_id).unwrap().current_period_end;

        let warn_at = trial_end - ChronoDuration::days(1);
        assert_eq!(runner.run_once(warn_at).await.subscriptions_warned, 1);
        assert_eq!(runner.run_once(warn_at).await.subscriptions_warned, 0);

        let report = runner.run_once(trial_end + ChronoDuration::hours(1)).await;
        assert_eq!(report.subscriptions_ended, 1);
        let org = state.store.organization(demo.organization_id).unwrap();
        assert_eq!(org.status, OrganizationStatus::Suspended);
        assert_eq!(
            state.billing.subscription(demo.organization_id).unwrap().status,
            SubscriptionStatus::Expired
        );
    }
}
