use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        AdminOrderList, AdminOrderSummary, CustomerInfo, OrderDetail, OrderLineDetail, OrderList,
        PlaceOrderRequest, UpdateOrderStatusRequest,
    },
    entity::{
        self, CartItems, Carts, OrderItems, Orders, ProductImages, Products, Users,
        cart_items::Column as CartItemCol,
        carts::Column as CartCol,
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Model as OrderModel},
        product_images::Column as ImageCol,
        products::Column as ProdCol,
        users::Model as UserModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, order_status},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::notification_service::{self, NewOrderLine, StatusNotification},
    state::AppState,
};

/// Convert the caller's cart into an order.
///
/// The order row, its line items (carrying unit-price snapshots) and the cart
/// clearing commit in one transaction; any failure before the commit leaves
/// nothing behind. Notification emails are spawned fire-and-forget after the
/// commit and can never fail the order.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let required = [
        payload.shipping_address.trim(),
        payload.contact_phone.trim(),
        payload.full_name.trim(),
        payload.payment_method.trim(),
    ];
    if required.iter().any(|field| field.is_empty()) {
        return Err(AppError::BadRequest(
            "All delivery and payment details are required.".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?;
    let cart = match cart {
        Some(c) => c,
        None => return Err(AppError::EmptyCart),
    };

    #[derive(Debug, FromQueryResult)]
    struct CartLineRow {
        product_id: Uuid,
        quantity: i32,
        price: i64,
        name: String,
    }

    let rows = CartItems::find()
        .select_only()
        .column(CartItemCol::ProductId)
        .column(CartItemCol::Quantity)
        .column_as(ProdCol::Price, "price")
        .column_as(ProdCol::Name, "name")
        .join(
            JoinType::InnerJoin,
            entity::cart_items::Relation::Products.def(),
        )
        .filter(CartItemCol::CartId.eq(cart.id))
        .lock(LockType::Update)
        .into_model::<CartLineRow>()
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let total_amount = order_total(rows.iter().map(|row| (row.price, row.quantity)));

    let order_model = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        shipping_address: Set(payload.shipping_address),
        contact_phone: Set(payload.contact_phone),
        customer_name: Set(payload.full_name),
        payment_method: Set(payload.payment_method),
        status: Set(order_status::PENDING.to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let item_models: Vec<OrderItemActive> = rows
        .iter()
        .map(|row| OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_model.id),
            product_id: Set(row.product_id),
            quantity: Set(row.quantity),
            price: Set(row.price),
            created_at: NotSet,
        })
        .collect();
    OrderItems::insert_many(item_models).exec(&txn).await?;

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let order = order_from_entity(order_model);
    let lines: Vec<NewOrderLine> = rows
        .into_iter()
        .map(|row| NewOrderLine {
            name: row.name,
            quantity: row.quantity,
            price: row.price,
        })
        .collect();

    // Detached: the response does not wait on email delivery.
    tokio::spawn(notification_service::send_new_order_emails(
        state.orm.clone(),
        state.mailer.clone(),
        order.clone(),
        lines,
        total_amount,
    ));

    Ok(ApiResponse::success("Order placed successfully!", order, None))
}

/// Storefront view of the caller's own orders, newest first.
pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&*state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&*state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Admin listing of all orders, newest first, enriched with the owning user's
/// email and display name.
pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<AdminOrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&*state.orm).await? as i64;

    let items = finder
        .find_also_related(Users)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&*state.orm)
        .await?
        .into_iter()
        .map(|(order, owner)| AdminOrderSummary {
            order: order_from_entity(order),
            customer: owner.map(customer_info),
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        AdminOrderList { items },
        Some(meta),
    ))
}

/// Admin order detail: line items with product name and image URLs, plus the
/// customer's email and display name.
pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    ensure_admin(user)?;

    let order = Orders::find_by_id(id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let customer = Users::find_by_id(order.user_id)
        .one(&*state.orm)
        .await?
        .map(customer_info);

    let item_rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .find_also_related(Products)
        .all(&*state.orm)
        .await?;

    let product_ids: Vec<Uuid> = item_rows.iter().map(|(item, _)| item.product_id).collect();
    let mut images: HashMap<Uuid, Vec<String>> = HashMap::new();
    if !product_ids.is_empty() {
        for image in ProductImages::find()
            .filter(ImageCol::ProductId.is_in(product_ids))
            .all(&*state.orm)
            .await?
        {
            images.entry(image.product_id).or_default().push(image.url);
        }
    }

    let items = item_rows
        .into_iter()
        .map(|(item, product)| OrderLineDetail {
            id: item.id,
            product_id: item.product_id,
            product_name: product.map(|p| p.name),
            quantity: item.quantity,
            price: item.price,
            images: images.remove(&item.product_id).unwrap_or_default(),
        })
        .collect();

    let data = OrderDetail {
        order: order_from_entity(order),
        customer,
        items,
    };
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

/// Persist a new status value and dispatch the matching notification.
///
/// Transitions are deliberately not validated against a state machine; any
/// non-empty status string is stored as-is and the last write wins. Only
/// SHIPPED/DELIVERED/CANCELLED trigger an email.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    if payload.status.trim().is_empty() {
        return Err(AppError::BadRequest("Status is required.".into()));
    }

    let existing = Orders::find_by_id(id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: OrderActive = existing.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&*state.orm).await?;

    let order = order_from_entity(updated);
    if let Some(kind) = StatusNotification::for_status(&order.status) {
        tokio::spawn(notification_service::send_status_email(
            state.orm.clone(),
            state.mailer.clone(),
            order.clone(),
            kind,
        ));
    }

    Ok(ApiResponse::success(
        format!("Order status updated to {}.", order.status),
        order,
        Some(Meta::empty()),
    ))
}

/// Sum of unit price x quantity over the cart lines, in minor units.
fn order_total<I>(lines: I) -> i64
where
    I: IntoIterator<Item = (i64, i32)>,
{
    lines
        .into_iter()
        .map(|(price, quantity)| price * i64::from(quantity))
        .sum()
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        shipping_address: model.shipping_address,
        contact_phone: model.contact_phone,
        customer_name: model.customer_name,
        payment_method: model.payment_method,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn customer_info(user: UserModel) -> CustomerInfo {
    CustomerInfo {
        email: user.email,
        full_name: user.full_name,
    }
}

#[cfg(test)]
mod tests {
    use super::order_total;

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        // Product A: 10.00 x 2, Product B: 5.50 x 1 => 25.50
        assert_eq!(order_total([(1000, 2), (550, 1)]), 2550);
    }

    #[test]
    fn total_of_no_lines_is_zero() {
        assert_eq!(order_total(std::iter::empty::<(i64, i32)>()), 0);
    }

    #[test]
    fn total_does_not_overflow_i32_quantities() {
        assert_eq!(order_total([(1_000_000, 3000)]), 3_000_000_000);
    }
}
