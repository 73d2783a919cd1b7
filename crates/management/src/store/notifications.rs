use super::{list_scoped, ComplianceStore};
use crate::models::*;
use chrono::Utc;
use compliance_core::{ComplianceError, ComplianceResult};
use uuid::Uuid;

impl ComplianceStore {
    pub fn notify(&self, org: Uuid, user_id: Uuid, n: NewNotification) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            organization_id: org,
            user_id,
            kind: n.kind,
            title: n.title,
            message: n.message,
            link: n.link,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        self.notifications.insert(notification.id, notification.clone());
        metrics::counter!("management.notifications.created").increment(1);
        notification
    }

    /// Deliver one notification to each user. Returns the number delivered.
    pub fn notify_many(&self, org: Uuid, user_ids: &[Uuid], n: NewNotification) -> u64 {
        for user in user_ids {
            self.notify(org, *user, n.clone());
        }
        user_ids.len() as u64
    }

    /// A user's notifications, newest first.
    pub fn list_notifications(&self, org: Uuid, user_id: Uuid, unread_only: bool) -> Vec<Notification> {
        let mut list = list_scoped(&self.notifications, org, |n| n.user_id == user_id && (!unread_only || !n.is_read));
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn unread_count(&self, org: Uuid, user_id: Uuid) -> u64 {
        self.notifications
            .iter()
            .filter(|n| n.organization_id == org && n.user_id == user_id && !n.is_read)
            .count() as u64
    }

    fn with_own_notification<R>(
        &self,
        org: Uuid,
        user_id: Uuid,
        id: Uuid,
        f: impl FnOnce(&mut Notification) -> R,
    ) -> ComplianceResult<R> {
        match self.notifications.get_mut(&id) {
            Some(mut n) if n.organization_id == org && n.user_id == user_id => Ok(f(&mut n)),
            _ => Err(ComplianceError::NotFound(format!("Notification {id}"))),
        }
    }

    pub fn mark_read(&self, org: Uuid, user_id: Uuid, id: Uuid) -> ComplianceResult<Notification> {
        self.with_own_notification(org, user_id, id, |n| {
            if !n.is_read {
                n.is_read = true;
                n.read_at = Some(Utc::now());
            }
            n.clone()
        })
    }

    /// Mark every unread notification of a user as read. Returns how many changed.
    pub fn mark_all_read(&self, org: Uuid, user_id: Uuid) -> u64 {
        let now = Utc::now();
        let mut changed = 0;
        for mut n in self.notifications.iter_mut() {
            if n.organization_id == org && n.user_id == user_id && !n.is_read {
                n.is_read = true;
                n.read_at = Some(now);
                changed += 1;
            }
        }
        changed
    }

    pub fn delete_notification(&self, org: Uuid, user_id: Uuid, id: Uuid) -> ComplianceResult<()> {
        self.notifications
            .remove_if(&id, |_, n| n.organization_id == org && n.user_id == user_id)
            .map(|_| ())
            .ok_or_else(|| ComplianceError::NotFound(format!("Notification {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use compliance_core::Role;

    fn note(title: &str) -> NewNotification {
        NewNotification {
            kind: NotificationKind::System,
            title: title.into(),
            message: "body".into(),
            link: None,
        }
    }

    #[test]
    fn test_read_state_and_counts() {
        let (store, org, admin) = store_with_org();
        let first = store.notify(org, admin, note("one"));
        store.notify(org, admin, note("two"));
        assert_eq!(store.unread_count(org, admin), 2);

        let read = store.mark_read(org, admin, first.id).unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());
        assert_eq!(store.list_notifications(org, admin, true).len(), 1);
        assert_eq!(store.list_notifications(org, admin, false).len(), 2);

        assert_eq!(store.mark_all_read(org, admin), 1);
        assert_eq!(store.unread_count(org, admin), 0);
    }

    #[test]
    fn test_other_users_notifications_are_hidden() {
        let (store, org, admin) = store_with_org();
        let other = store.insert_user(new_user(org, "officer@testbank.example", Role::ComplianceOfficer)).unwrap();
        let theirs = store.notify(org, other.id, note("private"));

        assert!(matches!(store.mark_read(org, admin, theirs.id), Err(ComplianceError::NotFound(_))));
        assert!(store.delete_notification(org, admin, theirs.id).is_err());
        assert!(store.delete_notification(org, other.id, theirs.id).is_ok());
        assert_eq!(store.unread_count(org, other.id), 0);
    }

    #[test]
    fn test_notify_many_counts_deliveries() {
        let (store, org, admin) = store_with_org();
        let other = store.insert_user(new_user(org, "auditor@testbank.example", Role::Auditor)).unwrap();
        assert_eq!(store.notify_many(org, &[admin, other.id], note("hello")), 2);
        assert_eq!(store.unread_count(org, other.id), 1);
    }
}
