use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

/// Fields default to empty strings so an omitted field is rejected by the
/// service with a 400 rather than failing JSON extraction.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub payment_method: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Customer fields surfaced on admin order views.
#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerInfo {
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<CustomerInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrderList {
    pub items: Vec<AdminOrderSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineDetail {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    /// Unit price snapshot stored on the order item.
    pub price: i64,
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub customer: Option<CustomerInfo>,
    pub items: Vec<OrderLineDetail>,
}
