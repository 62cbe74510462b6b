use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Row change event emitted by the database webhook on `orders`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderWebhookPayload {
    #[serde(rename = "type")]
    pub event_type: String,
    pub table: Option<String>,
    pub record: OrderRecord,
    pub old_record: Option<OrderRecord>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderRecord {
    pub id: Uuid,
    pub status: String,
}
