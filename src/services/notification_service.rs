//! Best-effort notification dispatch for order lifecycle emails.
//!
//! Every public function here is meant to run as a detached task spawned after
//! the triggering operation has already committed: failures are logged and
//! swallowed, never surfaced to the order path. One attempt, no retry.

use askama::Template;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::OrmConn,
    entity::{Users, users::Column as UserCol},
    models::{Order, order_status},
    services::mailer::{MailError, Mailer},
};

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("customer {0} not found for order email")]
    CustomerNotFound(Uuid),

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Line snapshot handed over by the order transaction for the new-order emails,
/// so the dispatcher never re-reads the (already emptied) cart.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub name: String,
    pub quantity: i32,
    pub price: i64,
}

/// Which status-transition notice to send. Statuses outside this set trigger nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusNotification {
    Shipped,
    Delivered,
    Cancelled,
}

impl StatusNotification {
    pub fn for_status(status: &str) -> Option<Self> {
        match status {
            order_status::SHIPPED => Some(Self::Shipped),
            order_status::DELIVERED => Some(Self::Delivered),
            order_status::CANCELLED => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Human-readable order reference used in subject lines: the last six
/// characters of the order id.
pub fn order_ref(id: Uuid) -> String {
    let s = id.to_string();
    s[s.len().saturating_sub(6)..].to_string()
}

/// Render minor units as a decimal amount, e.g. `2550` -> `"25.50"`.
pub fn format_amount(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, minor % 100)
}

struct LineView {
    name: String,
    quantity: i32,
    unit_price: String,
    line_total: String,
}

#[derive(Template)]
#[template(path = "email/new_order_customer.html")]
struct NewOrderCustomerEmail<'a> {
    customer_name: &'a str,
    order_ref: &'a str,
    shipping_address: &'a str,
    payment_method: &'a str,
    lines: &'a [LineView],
    total: String,
}

#[derive(Template)]
#[template(path = "email/new_order_admin.html")]
struct NewOrderAdminEmail<'a> {
    customer_name: &'a str,
    customer_email: &'a str,
    order_ref: &'a str,
    shipping_address: &'a str,
    contact_phone: &'a str,
    payment_method: &'a str,
    lines: &'a [LineView],
    total: String,
}

#[derive(Template)]
#[template(path = "email/order_shipped.html")]
struct ShippedEmail<'a> {
    customer_name: &'a str,
    order_ref: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_delivered.html")]
struct DeliveredEmail<'a> {
    customer_name: &'a str,
    order_ref: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_cancelled.html")]
struct CancelledEmail<'a> {
    customer_name: &'a str,
    order_ref: &'a str,
}

/// Send the order confirmation to the customer plus a notice to all admins.
/// Spawned fire-and-forget after the order transaction commits.
pub async fn send_new_order_emails(
    orm: OrmConn,
    mailer: Mailer,
    order: Order,
    lines: Vec<NewOrderLine>,
    total_amount: i64,
) {
    if let Err(err) = new_order_emails(&orm, &mailer, &order, &lines, total_amount).await {
        tracing::error!(
            order_id = %order.id,
            error = %err,
            "failed to send new order notification emails"
        );
    }
}

/// Send the notice matching a status transition. Spawned fire-and-forget.
pub async fn send_status_email(
    orm: OrmConn,
    mailer: Mailer,
    order: Order,
    kind: StatusNotification,
) {
    if let Err(err) = status_email(&orm, &mailer, &order, kind).await {
        tracing::error!(
            order_id = %order.id,
            status = %order.status,
            error = %err,
            "failed to send status notification email"
        );
    }
}

async fn new_order_emails(
    orm: &OrmConn,
    mailer: &Mailer,
    order: &Order,
    lines: &[NewOrderLine],
    total_amount: i64,
) -> Result<(), NotificationError> {
    let customer = Users::find_by_id(order.user_id)
        .one(&**orm)
        .await?
        .ok_or(NotificationError::CustomerNotFound(order.user_id))?;

    let reference = order_ref(order.id);
    let line_views: Vec<LineView> = lines
        .iter()
        .map(|line| LineView {
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price: format_amount(line.price),
            line_total: format_amount(line.price * i64::from(line.quantity)),
        })
        .collect();

    let customer_html = NewOrderCustomerEmail {
        customer_name: &order.customer_name,
        order_ref: &reference,
        shipping_address: &order.shipping_address,
        payment_method: &order.payment_method,
        lines: &line_views,
        total: format_amount(total_amount),
    }
    .render()?;

    mailer
        .send_html(
            std::slice::from_ref(&customer.email),
            &format!("Your Joyvinco Order is Confirmed! #{reference}"),
            customer_html,
        )
        .await?;

    let admin_emails: Vec<String> = Users::find()
        .filter(UserCol::Role.eq(ADMIN_ROLE))
        .all(&**orm)
        .await?
        .into_iter()
        .map(|admin| admin.email)
        .collect();

    // No admins configured is not an error; just skip the admin notice.
    if admin_emails.is_empty() {
        return Ok(());
    }

    let admin_html = NewOrderAdminEmail {
        customer_name: &order.customer_name,
        customer_email: &customer.email,
        order_ref: &reference,
        shipping_address: &order.shipping_address,
        contact_phone: &order.contact_phone,
        payment_method: &order.payment_method,
        lines: &line_views,
        total: format_amount(total_amount),
    }
    .render()?;

    mailer
        .send_html(
            &admin_emails,
            &format!("[ADMIN] New Order Received! #{reference}"),
            admin_html,
        )
        .await?;

    Ok(())
}

async fn status_email(
    orm: &OrmConn,
    mailer: &Mailer,
    order: &Order,
    kind: StatusNotification,
) -> Result<(), NotificationError> {
    let customer = Users::find_by_id(order.user_id)
        .one(&**orm)
        .await?
        .ok_or(NotificationError::CustomerNotFound(order.user_id))?;

    let reference = order_ref(order.id);
    let (subject, html) = match kind {
        StatusNotification::Shipped => (
            format!("Your Joyvinco Order Has Shipped! #{reference}"),
            ShippedEmail {
                customer_name: &order.customer_name,
                order_ref: &reference,
            }
            .render()?,
        ),
        StatusNotification::Delivered => (
            format!("Your Joyvinco Order #{reference} Has Been Delivered!"),
            DeliveredEmail {
                customer_name: &order.customer_name,
                order_ref: &reference,
            }
            .render()?,
        ),
        StatusNotification::Cancelled => (
            format!("Your Joyvinco Order #{reference} Has Been Cancelled"),
            CancelledEmail {
                customer_name: &order.customer_name,
                order_ref: &reference,
            }
            .render()?,
        ),
    };

    mailer
        .send_html(std::slice::from_ref(&customer.email), &subject, html)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ref_is_last_six_chars_of_id() {
        let id: Uuid = "c96ad15c-7a7f-4f8e-9f3a-8d2e11ab34cd".parse().unwrap();
        assert_eq!(order_ref(id), "ab34cd");
    }

    #[test]
    fn format_amount_renders_minor_units() {
        assert_eq!(format_amount(2550), "25.50");
        assert_eq!(format_amount(1000), "10.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(0), "0.00");
    }

    #[test]
    fn status_mapping_covers_exactly_the_notified_statuses() {
        assert_eq!(
            StatusNotification::for_status("SHIPPED"),
            Some(StatusNotification::Shipped)
        );
        assert_eq!(
            StatusNotification::for_status("DELIVERED"),
            Some(StatusNotification::Delivered)
        );
        assert_eq!(
            StatusNotification::for_status("CANCELLED"),
            Some(StatusNotification::Cancelled)
        );
        assert_eq!(StatusNotification::for_status("PENDING"), None);
        assert_eq!(StatusNotification::for_status("PROCESSING"), None);
        assert_eq!(StatusNotification::for_status(""), None);
        // Dispatch is case-sensitive, matching the stored enumeration.
        assert_eq!(StatusNotification::for_status("shipped"), None);
    }

    #[test]
    fn new_order_customer_template_renders_lines_and_total() {
        let lines = vec![
            LineView {
                name: "Widget A".into(),
                quantity: 2,
                unit_price: "10.00".into(),
                line_total: "20.00".into(),
            },
            LineView {
                name: "Widget B".into(),
                quantity: 1,
                unit_price: "5.50".into(),
                line_total: "5.50".into(),
            },
        ];
        let html = NewOrderCustomerEmail {
            customer_name: "Ada Lovelace",
            order_ref: "ab34cd",
            shipping_address: "1 Analytical Way",
            payment_method: "card",
            lines: &lines,
            total: "25.50".into(),
        }
        .render()
        .unwrap();

        assert!(html.contains("Ada Lovelace"));
        assert!(html.contains("#ab34cd"));
        assert!(html.contains("Widget A"));
        assert!(html.contains("25.50"));
    }

    #[test]
    fn status_templates_render() {
        let shipped = ShippedEmail {
            customer_name: "Ada",
            order_ref: "ab34cd",
        }
        .render()
        .unwrap();
        assert!(shipped.contains("#ab34cd"));

        let delivered = DeliveredEmail {
            customer_name: "Ada",
            order_ref: "ab34cd",
        }
        .render()
        .unwrap();
        assert!(delivered.contains("delivered"));

        let cancelled = CancelledEmail {
            customer_name: "Ada",
            order_ref: "ab34cd",
        }
        .render()
        .unwrap();
        assert!(cancelled.contains("cancelled"));
    }
}
