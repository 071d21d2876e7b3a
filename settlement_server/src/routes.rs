//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat
//! and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current
//! thread will cause the current worker to stop processing new requests. For this reason, any
//! long, non-cpu-bound operation (e.g. I/O, database operations, etc.) must be expressed as
//! futures or asynchronous functions, which the handlers below are.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use settlement_engine::{
    db_types::{OrderId, PartnerId},
    order_objects::OrderQueryFilter,
    LedgerManagement,
    OrderFlowApi,
    RiskApi,
    SettlementApi,
    SettlementDatabase,
    WalletApi,
};

use crate::{
    data_objects::{LedgerQueryParams, OrderSearchParams, TransitionParams},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!`
// macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Orders  ----------------------------------------------------
route!(transition_order => Post "/orders/{order_code}/transition" impl SettlementDatabase);
/// Route handler for the order transition endpoint.
///
/// The body names the target status plus an optional note and tracking number. On success the
/// updated order is returned. An edge that is not in the transition graph yields `409 Conflict`
/// with both the current and the requested status in the error message, so operators can correct
/// the request.
pub async fn transition_order<B: SettlementDatabase + 'static>(
    path: web::Path<String>,
    params: web::Json<TransitionParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_code = OrderId::from(path.into_inner());
    let TransitionParams { target_status, note, tracking_number } = params.into_inner();
    debug!("💻️ Transition request: order [{order_code}] to {target_status}");
    let outcome = api.transition(&order_code, target_status, note, tracking_number).await?;
    Ok(HttpResponse::Ok().json(outcome.order))
}

route!(order_by_code => Get "/orders/{order_code}" impl SettlementDatabase);
pub async fn order_by_code<B: SettlementDatabase + 'static>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_code = OrderId::from(path.into_inner());
    trace!("💻️ Fetching order [{order_code}]");
    let order = api
        .db()
        .fetch_order_by_code(&order_code)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_code}")))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(orders_search => Get "/orders" impl SettlementDatabase);
pub async fn orders_search<B: SettlementDatabase + 'static>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = query.into_inner();
    let mut filter = OrderQueryFilter::default();
    if let Some(status) = params.status {
        filter = filter.with_status(status);
    }
    if let Some(partner_id) = params.partner_id {
        filter = filter.with_partner_id(PartnerId::from(partner_id));
    }
    if let Some(customer_id) = params.customer_id {
        filter = filter.with_customer_id(customer_id);
    }
    filter.since = params.since;
    filter.until = params.until;
    trace!("💻️ Order search: {filter}");
    let orders = api.db().search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------  Settlement  ----------------------------------------------------
route!(run_sweep => Post "/settlement/sweep" impl SettlementDatabase);
/// Triggers a settlement sweep on demand. The background worker runs the same operation on a
/// timer; the sweep is idempotent per commission, so overlap is harmless.
pub async fn run_sweep<B: SettlementDatabase + 'static>(
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ On-demand settlement sweep requested");
    let summary = api.run_sweep().await?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------  Partners  ----------------------------------------------------
route!(partner_ledger => Get "/partners/{partner_id}/ledger" impl LedgerManagement);
pub async fn partner_ledger<B: LedgerManagement + 'static>(
    path: web::Path<String>,
    query: web::Query<LedgerQueryParams>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let partner_id = PartnerId::from(path.into_inner());
    trace!("💻️ Ledger request for partner {partner_id}");
    let ledger = api.ledger(&partner_id, query.pagination()).await?;
    Ok(HttpResponse::Ok().json(ledger))
}

route!(partner_risk => Get "/partners/{partner_id}/risk" impl SettlementDatabase);
pub async fn partner_risk<B: SettlementDatabase + 'static>(
    path: web::Path<String>,
    api: web::Data<RiskApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let partner_id = PartnerId::from(path.into_inner());
    trace!("💻️ Risk signal request for partner {partner_id}");
    let signal = api.risk_signal(&partner_id).await?;
    Ok(HttpResponse::Ok().json(signal))
}
