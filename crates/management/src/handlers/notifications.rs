use super::ManagementState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use compliance_platform::Permission;
use tracing::info;
use uuid::Uuid;

/// GET /api/v1/notifications — The caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer" = [])),
    params(NotificationFilter),
    responses((status = 200, description = "Notifications", body = Vec<Notification>))
)]
pub async fn list_notifications(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Query(filter): Query<NotificationFilter>,
) -> Json<Vec<Notification>> {
    Json(
        state
            .store
            .list_notifications(caller.org(), caller.user_id(), filter.unread_only),
    )
}

/// GET /api/v1/notifications/unread-count
#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    tag = "Notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Unread notifications", body = UnreadCount))
)]
pub async fn unread_count(State(state): State<ManagementState>, caller: AuthUser) -> Json<UnreadCount> {
    Json(UnreadCount {
        count: state.store.unread_count(caller.org(), caller.user_id()),
    })
}

/// POST /api/v1/notifications/:id/read
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    tag = "Notifications",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked read", body = Notification),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn mark_read(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.store.mark_read(caller.org(), caller.user_id(), id)?))
}

/// POST /api/v1/notifications/read-all
#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "Notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Number of notifications marked read", body = UnreadCount))
)]
pub async fn mark_all_read(State(state): State<ManagementState>, caller: AuthUser) -> Json<UnreadCount> {
    Json(UnreadCount {
        count: state.store.mark_all_read(caller.org(), caller.user_id()),
    })
}

/// DELETE /api/v1/notifications/:id
#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    tag = "Notifications",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 204, description = "Notification deleted"))
)]
pub async fn delete_notification(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_notification(caller.org(), caller.user_id(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notifications/broadcast — To listed users, or every
/// active user of the organization when none are listed.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/broadcast",
    tag = "Notifications",
    security(("bearer" = [])),
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Notifications delivered", body = BroadcastResponse),
        (status = 404, description = "A listed user is not in the organization", body = crate::error::ErrorResponse),
    )
)]
pub async fn broadcast(
    State(state): State<ManagementState>,
    caller: AuthUser,
    Json(req): Json<BroadcastRequest>,
) -> ApiResult<Json<BroadcastResponse>> {
    caller.require(Permission::NotificationBroadcast)?;
    req.validate()?;
    let org = caller.org();
    let recipients = match req.user_ids {
        Some(ids) => {
            for id in &ids {
                state.store.user(org, *id)?;
            }
            ids
        }
        None => state.store.active_user_ids(org),
    };
    let delivered = state.store.notify_many(
        org,
        &recipients,
        NewNotification {
            kind: NotificationKind::Broadcast,
            title: req.title.trim().to_string(),
            message: req.message,
            link: req.link,
        },
    );
    info!(organization_id = %org, delivered, "Broadcast sent");
    Ok(Json(BroadcastResponse { delivered }))
}
