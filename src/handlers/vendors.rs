use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::vendor_notification,
    errors::ServiceError,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct NotificationListQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VendorNotificationResponse {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<vendor_notification::Model> for VendorNotificationResponse {
    fn from(model: vendor_notification::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            title: model.title,
            body: model.body,
            read: model.read,
            payload: model.payload,
            created_at: model.created_at,
        }
    }
}

// GET /api/v1/vendors/{id}/notifications
#[utoipa::path(
    get,
    path = "/api/v1/vendors/{id}/notifications",
    params(
        ("id" = Uuid, Path, description = "Vendor ID"),
        ("limit" = u64, Query, description = "Maximum number of notifications to return")
    ),
    responses(
        (status = 200, description = "Latest in-app notifications for the vendor")
    ),
    tag = "Vendors"
)]
pub async fn list_vendor_notifications(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<ApiResponse<Vec<VendorNotificationResponse>>>, ServiceError> {
    let rows = vendor_notification::Entity::find()
        .filter(vendor_notification::Column::VendorId.eq(vendor_id))
        .order_by_desc(vendor_notification::Column::CreatedAt)
        .limit(query.limit)
        .all(&*state.db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(VendorNotificationResponse::from).collect(),
    )))
}
