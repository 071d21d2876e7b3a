use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    api::order_objects::OrderQueryFilter,
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatusEvent, OrderStatusType},
    traits::SettlementError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order
/// already exists.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), SettlementError> {
    let inserted = match fetch_order_by_code(&order.order_code, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.order_code, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order and its line items using the given connection. This is not atomic on its
/// own. You can embed this call inside a transaction and pass `&mut *tx` as the connection
/// argument.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SettlementError> {
    let inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_code,
                customer_id,
                partner_id,
                subtotal,
                discount_total,
                device_fingerprint,
                ship_address,
                ip_address,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order.order_code)
    .bind(order.customer_id)
    .bind(order.partner_id)
    .bind(order.subtotal)
    .bind(order.discount_total)
    .bind(order.device_fingerprint)
    .bind(order.ship_address)
    .bind(order.ip_address)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, variant_id, product_id, category_id, quantity, unit_price) VALUES \
             ($1, $2, $3, $4, $5, $6)",
        )
        .bind(inserted.id)
        .bind(item.variant_id)
        .bind(item.product_id)
        .bind(item.category_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(inserted)
}

/// Returns the order with the given human-readable order code, if any.
pub async fn fetch_order_by_code(
    order_code: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_code = $1")
        .bind(order_code.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_line_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_code) = query.order_code {
        where_clause.push("order_code = ");
        where_clause.push_bind_unseparated(order_code.0);
    }
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(partner_id) = query.partner_id {
        where_clause.push("partner_id = ");
        where_clause.push_bind_unseparated(partner_id.0);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// Applies the status change as a compare-and-swap against the status the caller read. Returns
/// `None` when the order's status moved under us, in which case nothing was written.
pub(crate) async fn transition_status(
    id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    tracking_number: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let result = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = $1,
                tracking_number = COALESCE($2, tracking_number),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(to.to_string())
    .bind(tracking_number)
    .bind(id)
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Appends the immutable audit record for a transition.
pub(crate) async fn append_status_event(
    order_id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    note: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<OrderStatusEvent, sqlx::Error> {
    let event = sqlx::query_as(
        "INSERT INTO order_status_events (order_id, from_status, to_status, note) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(order_id)
    .bind(from.to_string())
    .bind(to.to_string())
    .bind(note)
    .fetch_one(conn)
    .await?;
    Ok(event)
}

pub async fn fetch_status_events(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM order_status_events WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
