use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use joyvinco_api::{
    config::EmailConfig,
    dto::orders::PlaceOrderRequest,
    entity::{carts, orders},
    error::AppError,
    middleware::auth::AuthUser,
    services::{mailer::Mailer, order_service},
    state::AppState,
};
use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr, Value};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

// A storage fault after the order and its items have been written but before
// the cart is cleared must abort the whole transaction: the caller sees the
// error, the cart is never touched, and nothing partial survives the rollback.
//
// A mock connection stands in for Postgres here: it answers the cart lookup,
// the cart-line select and the order insert, then fails the order-item insert.
#[tokio::test]
async fn storage_fault_mid_checkout_rolls_back_without_touching_cart() -> anyhow::Result<()> {
    let user_id = Uuid::new_v4();
    let cart_id = Uuid::new_v4();
    let order_id = Uuid::new_v4();
    let now = Utc::now();

    let cart_line = BTreeMap::from([
        ("product_id", Value::from(Uuid::new_v4())),
        ("quantity", Value::from(2i32)),
        ("price", Value::from(1000i64)),
        ("name", Value::from("Joyvinco Tote Bag")),
    ]);

    let orm = Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![carts::Model {
                id: cart_id,
                user_id,
                created_at: now.into(),
            }]])
            .append_query_results([vec![cart_line]])
            .append_query_results([vec![orders::Model {
                id: order_id,
                user_id,
                total_amount: 2000,
                shipping_address: "1 Analytical Way".into(),
                contact_phone: "555-0100".into(),
                customer_name: "Ada Lovelace".into(),
                payment_method: "card".into(),
                status: "PENDING".into(),
                created_at: now.into(),
                updated_at: now.into(),
            }]])
            .append_query_errors([DbErr::Query(RuntimeErr::Internal(
                "order_items insert failed".into(),
            ))])
            .into_connection(),
    );

    let state = AppState {
        // Lazy pool: never connected, the order path only uses the ORM handle.
        pool: PgPoolOptions::new().connect_lazy("postgres://localhost:5432/unused")?,
        orm: orm.clone(),
        mailer: Mailer::new(&EmailConfig {
            smtp_host: "localhost".into(),
            smtp_port: 2525,
            smtp_username: "test".into(),
            smtp_password: SecretString::from("test".to_string()),
            from_address: "Joyvinco <noreply@joyvinco.test>".into(),
        })?,
    };

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };

    let err = order_service::place_order(
        &state,
        &auth_user,
        PlaceOrderRequest {
            shipping_address: "1 Analytical Way".into(),
            contact_phone: "555-0100".into(),
            full_name: "Ada Lovelace".into(),
            payment_method: "card".into(),
        },
    )
    .await
    .unwrap_err();

    // The fault surfaces as a 500-mapped error, not a silent partial success.
    assert!(matches!(err, AppError::OrmError(_)));

    // The transaction got as far as the order-item insert, then rolled back
    // without ever issuing the cart-item delete.
    drop(state);
    let orm = Arc::into_inner(orm).expect("no other connection handles remain");
    let log = format!("{:?}", orm.into_transaction_log());
    assert!(log.contains("orders"), "order insert should have been attempted");
    assert!(
        log.contains("order_items"),
        "order-item insert should have been attempted"
    );
    assert!(
        !log.contains("DELETE"),
        "cart must not be touched once the transaction has failed"
    );

    Ok(())
}
