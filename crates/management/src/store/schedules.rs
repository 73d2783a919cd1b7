use super::{get_scoped, list_scoped, set, set_opt, today, update_scoped, ComplianceStore};
use crate::models::*;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use compliance_core::calendar::{calculate_next_due_date, days_between, validate_interval};
use compliance_core::types::percentage;
use compliance_core::{ComplianceError, ComplianceResult};
use tracing::info;
use uuid::Uuid;

fn status_for(due_date: NaiveDate, today: NaiveDate) -> ScheduleStatus {
    if due_date < today {
        ScheduleStatus::Overdue
    } else {
        ScheduleStatus::Pending
    }
}

impl ComplianceStore {
    pub fn create_schedule(&self, org: Uuid, actor: Uuid, req: CreateScheduleRequest) -> ComplianceResult<Schedule> {
        req.validate()?;
        if let Some(user) = req.responsible_user_id {
            self.user(org, user)?;
        }
        if let Some(branch) = req.branch_id {
            self.branch(org, branch)?;
        }
        if let Some(clause) = req.clause_id {
            self.clause(org, clause)?;
        }
        let now = Utc::now();
        let schedule = Schedule {
            id: Uuid::new_v4(),
            organization_id: org,
            title: req.title.trim().to_string(),
            description: req.description,
            frequency: req.frequency,
            custom_interval_days: req.custom_interval_days,
            due_date: req.due_date,
            responsible_user_id: req.responsible_user_id,
            branch_id: req.branch_id,
            clause_id: req.clause_id,
            reminder_days_before: req.reminder_days_before,
            status: status_for(req.due_date, now.date_naive()),
            is_active: true,
            last_completed_at: None,
            last_reminder_for: None,
            last_overdue_notice_for: None,
            created_by: actor,
            created_at: now,
            updated_at: now,
        };
        self.schedules.insert(schedule.id, schedule.clone());
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Create,
            "schedule",
            schedule.id,
            serde_json::json!({ "frequency": schedule.frequency, "dueDate": schedule.due_date }),
        );
        Ok(schedule)
    }

    pub fn schedule(&self, org: Uuid, id: Uuid) -> ComplianceResult<Schedule> {
        get_scoped(&self.schedules, org, id)
    }

    pub fn list_schedules(&self, org: Uuid, filter: &ScheduleFilter) -> Vec<Schedule> {
        let mut schedules = list_scoped(&self.schedules, org, |s| {
            filter.status.map_or(true, |st| s.status == st)
                && filter.frequency.map_or(true, |f| s.frequency == f)
                && filter.responsible_user_id.map_or(true, |u| s.responsible_user_id == Some(u))
                && filter.branch_id.map_or(true, |b| s.branch_id == Some(b))
                && filter.is_active.map_or(true, |a| s.is_active == a)
        });
        schedules.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        schedules
    }

    pub fn update_schedule(&self, org: Uuid, actor: Uuid, id: Uuid, req: UpdateScheduleRequest) -> ComplianceResult<Schedule> {
        if matches!(&req.title, Some(t) if t.trim().is_empty()) {
            return Err(ComplianceError::validation("title must not be empty"));
        }
        if let Some(user) = req.responsible_user_id {
            self.user(org, user)?;
        }
        if let Some(branch) = req.branch_id {
            self.branch(org, branch)?;
        }
        if let Some(clause) = req.clause_id {
            self.clause(org, clause)?;
        }
        let today = today();
        let schedule = update_scoped(&self.schedules, org, id, |s| {
            let frequency = req.frequency.unwrap_or(s.frequency);
            let custom = req.custom_interval_days.or(s.custom_interval_days);
            validate_interval(frequency, custom)?;

            s.frequency = frequency;
            s.custom_interval_days = custom;
            set(&mut s.title, req.title.map(|t| t.trim().to_string()));
            set_opt(&mut s.description, req.description);
            set_opt(&mut s.responsible_user_id, req.responsible_user_id);
            set_opt(&mut s.branch_id, req.branch_id);
            set_opt(&mut s.clause_id, req.clause_id);
            set_opt(&mut s.reminder_days_before, req.reminder_days_before);
            set(&mut s.is_active, req.is_active);
            if let Some(due) = req.due_date {
                s.due_date = due;
                if s.status != ScheduleStatus::Completed {
                    s.status = status_for(due, today);
                }
            }
            s.updated_at = Utc::now();
            Ok(s.clone())
        })?;
        self.log_audit(org, Some(actor), AuditAction::Update, "schedule", id, serde_json::json!({ "dueDate": schedule.due_date }));
        Ok(schedule)
    }

    /// Delete a schedule and its completion history.
    pub fn delete_schedule(&self, org: Uuid, actor: Uuid, id: Uuid) -> ComplianceResult<()> {
        super::remove_scoped(&self.schedules, org, id)?;
        self.completions.retain(|_, c| c.schedule_id != id);
        self.log_audit(org, Some(actor), AuditAction::Delete, "schedule", id, serde_json::json!({}));
        Ok(())
    }

    /// Record a completion. Recurring schedules advance from the due date
    /// just satisfied; one-off schedules become completed and inactive.
    pub fn complete_schedule(
        &self,
        org: Uuid,
        actor: Uuid,
        id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> ComplianceResult<CompleteScheduleResponse> {
        let today = now.date_naive();
        let (schedule, completion, next_due_date) = update_scoped(&self.schedules, org, id, |s| {
            if !s.is_active {
                return Err(ComplianceError::Conflict("schedule is not active".into()));
            }
            let next = calculate_next_due_date(s.due_date, s.frequency, s.custom_interval_days)?;
            let completion = ScheduleCompletion {
                id: Uuid::new_v4(),
                organization_id: org,
                schedule_id: s.id,
                due_date: s.due_date,
                completed_by: actor,
                completed_at: now,
                notes,
                on_time: today <= s.due_date,
            };
            match next {
                Some(next) => {
                    s.due_date = next;
                    s.status = status_for(next, today);
                }
                None => {
                    s.status = ScheduleStatus::Completed;
                    s.is_active = false;
                }
            }
            s.last_completed_at = Some(now);
            s.updated_at = now;
            Ok((s.clone(), completion, next))
        })?;

        self.completions.insert(completion.id, completion.clone());
        info!(
            schedule_id = %id,
            organization_id = %org,
            on_time = completion.on_time,
            next_due_date = ?next_due_date,
            "Schedule completed"
        );
        self.log_audit(
            org,
            Some(actor),
            AuditAction::Complete,
            "schedule",
            id,
            serde_json::json!({ "dueDate": completion.due_date, "nextDueDate": next_due_date }),
        );
        Ok(CompleteScheduleResponse {
            schedule,
            completion,
            next_due_date,
        })
    }

    /// Completion history of a schedule, newest first.
    pub fn schedule_history(&self, org: Uuid, id: Uuid) -> ComplianceResult<Vec<ScheduleCompletion>> {
        self.schedule(org, id)?;
        let mut history = list_scoped(&self.completions, org, |c| c.schedule_id == id);
        history.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(history)
    }

    /// Active schedules due between today and `days` ahead.
    pub fn upcoming_schedules(&self, org: Uuid, today: NaiveDate, days: u32) -> Vec<Schedule> {
        let horizon = today + Duration::days(days as i64);
        let mut schedules = list_scoped(&self.schedules, org, |s| {
            s.is_active && s.due_date >= today && s.due_date <= horizon
        });
        schedules.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        schedules
    }

    /// Active schedules whose due date has passed.
    pub fn overdue_schedules(&self, org: Uuid, today: NaiveDate) -> Vec<Schedule> {
        let mut schedules = list_scoped(&self.schedules, org, |s| s.is_active && s.due_date < today);
        schedules.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        schedules
    }

    pub fn schedule_stats(&self, org: Uuid, now: DateTime<Utc>) -> ScheduleStats {
        let today = now.date_naive();
        let mut stats = ScheduleStats::default();
        for s in list_scoped(&self.schedules, org, |_| true) {
            stats.total += 1;
            if s.is_active {
                stats.active += 1;
            }
            match s.status {
                ScheduleStatus::Completed => stats.completed += 1,
                _ if s.is_active && s.due_date < today => stats.overdue += 1,
                _ => stats.pending += 1,
            }
        }
        let completions = list_scoped(&self.completions, org, |_| true);
        let cutoff = now - Duration::days(30);
        stats.completed_last_30_days = completions.iter().filter(|c| c.completed_at >= cutoff).count() as u64;
        let on_time = completions.iter().filter(|c| c.on_time).count() as u64;
        stats.on_time_rate = percentage(on_time, completions.len() as u64);
        stats
    }

    // ─── Cron support (all organizations) ──────────────────────────────────

    /// Active schedules past due that have not had an overdue notice for
    /// their current due date. Marks them overdue and records the notice.
    pub fn take_newly_overdue_schedules(&self, today: NaiveDate) -> Vec<Schedule> {
        let mut changed = Vec::new();
        for mut s in self.schedules.iter_mut() {
            if s.is_active && s.due_date < today && s.last_overdue_notice_for != Some(s.due_date) {
                s.status = ScheduleStatus::Overdue;
                s.last_overdue_notice_for = Some(s.due_date);
                s.updated_at = Utc::now();
                changed.push(s.clone());
            }
        }
        changed
    }

    /// Active open schedules inside their reminder window that have not
    /// been reminded for their current due date. Records the reminder.
    pub fn take_schedules_due_for_reminder(&self, today: NaiveDate, default_days: u32) -> Vec<Schedule> {
        let mut due = Vec::new();
        for mut s in self.schedules.iter_mut() {
            let window = s.reminder_days_before.unwrap_or(default_days) as i64;
            let days_left = days_between(today, s.due_date);
            if s.is_active
                && s.status != ScheduleStatus::Completed
                && (0..=window).contains(&days_left)
                && s.last_reminder_for != Some(s.due_date)
            {
                s.last_reminder_for = Some(s.due_date);
                due.push(s.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::TimeZone;
    use compliance_core::Frequency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(d: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&d.and_hms_opt(12, 0, 0).unwrap())
    }

    fn schedule_req(frequency: Frequency, due: NaiveDate) -> CreateScheduleRequest {
        CreateScheduleRequest {
            title: "Liquidity return".into(),
            description: None,
            frequency,
            custom_interval_days: None,
            due_date: due,
            responsible_user_id: None,
            branch_id: None,
            clause_id: None,
            reminder_days_before: None,
        }
    }

    #[test]
    fn test_recurring_completion_advances_from_previous_due_date() {
        let (store, org, admin) = store_with_org();
        let s = store.create_schedule(org, admin, schedule_req(Frequency::Monthly, date(2026, 1, 31))).unwrap();

        // Completed late: next due date still follows the old due date.
        let result = store.complete_schedule(org, admin, s.id, Some("filed".into()), noon(date(2026, 2, 3))).unwrap();
        assert_eq!(result.next_due_date, Some(date(2026, 2, 28)));
        assert!(!result.completion.on_time);
        assert_eq!(result.completion.due_date, date(2026, 1, 31));
        assert_eq!(result.schedule.status, ScheduleStatus::Pending);
        assert!(result.schedule.is_active);

        let history = store.schedule_history(org, s.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].notes.as_deref(), Some("filed"));
    }

    #[test]
    fn test_completion_far_behind_stays_overdue() {
        let (store, org, admin) = store_with_org();
        let s = store.create_schedule(org, admin, schedule_req(Frequency::Weekly, date(2026, 1, 1))).unwrap();
        let result = store.complete_schedule(org, admin, s.id, None, noon(date(2026, 3, 1))).unwrap();
        assert_eq!(result.next_due_date, Some(date(2026, 1, 8)));
        assert_eq!(result.schedule.status, ScheduleStatus::Overdue);
    }

    #[test]
    fn test_one_off_completion_deactivates() {
        let (store, org, admin) = store_with_org();
        let s = store.create_schedule(org, admin, schedule_req(Frequency::Once, date(2026, 5, 1))).unwrap();
        let result = store.complete_schedule(org, admin, s.id, None, noon(date(2026, 4, 30))).unwrap();
        assert_eq!(result.next_due_date, None);
        assert_eq!(result.schedule.status, ScheduleStatus::Completed);
        assert!(!result.schedule.is_active);
        assert!(result.completion.on_time);

        let err = store.complete_schedule(org, admin, s.id, None, noon(date(2026, 5, 1))).unwrap_err();
        assert!(matches!(err, ComplianceError::Conflict(_)));
    }

    #[test]
    fn test_custom_frequency_requires_interval() {
        let (store, org, admin) = store_with_org();
        let mut req = schedule_req(Frequency::Custom, date(2026, 5, 1));
        assert!(store.create_schedule(org, admin, req.clone()).is_err());
        req.custom_interval_days = Some(10);
        let s = store.create_schedule(org, admin, req).unwrap();
        let next = store.complete_schedule(org, admin, s.id, None, noon(date(2026, 5, 1))).unwrap();
        assert_eq!(next.next_due_date, Some(date(2026, 5, 11)));

        let bad = UpdateScheduleRequest {
            frequency: Some(Frequency::Custom),
            custom_interval_days: Some(0),
            ..Default::default()
        };
        assert!(store.update_schedule(org, admin, s.id, bad).is_err());
    }

    #[test]
    fn test_upcoming_overdue_and_stats() {
        let (store, org, admin) = store_with_org();
        let today = date(2026, 6, 15);
        store.create_schedule(org, admin, schedule_req(Frequency::Monthly, date(2026, 6, 10))).unwrap();
        store.create_schedule(org, admin, schedule_req(Frequency::Monthly, date(2026, 6, 20))).unwrap();
        store.create_schedule(org, admin, schedule_req(Frequency::Yearly, date(2026, 12, 31))).unwrap();

        assert_eq!(store.upcoming_schedules(org, today, 30).len(), 1);
        assert_eq!(store.overdue_schedules(org, today).len(), 1);

        let stats = store.schedule_stats(org, noon(today));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.on_time_rate, 0);
    }

    #[test]
    fn test_cron_selections_fire_once_per_due_date() {
        let (store, org, admin) = store_with_org();
        let today = date(2026, 6, 15);
        let mut reminder = schedule_req(Frequency::Quarterly, date(2026, 6, 18));
        reminder.reminder_days_before = Some(5);
        store.create_schedule(org, admin, reminder).unwrap();
        store.create_schedule(org, admin, schedule_req(Frequency::Quarterly, date(2026, 6, 1))).unwrap();

        assert_eq!(store.take_schedules_due_for_reminder(today, 3).len(), 1);
        assert!(store.take_schedules_due_for_reminder(today, 3).is_empty());

        let overdue = store.take_newly_overdue_schedules(today);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].status, ScheduleStatus::Overdue);
        assert!(store.take_newly_overdue_schedules(today).is_empty());
    }
}
