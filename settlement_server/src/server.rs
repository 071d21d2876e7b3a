use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use settlement_engine::{events::EventProducers, OrderFlowApi, RiskApi, SettlementApi, SqliteDatabase, WalletApi};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        OrderByCodeRoute,
        OrdersSearchRoute,
        PartnerLedgerRoute,
        PartnerRiskRoute,
        RunSweepRoute,
        TransitionOrderRoute,
    },
    sweep_worker::start_sweep_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let producers = EventProducers::default();
    let worker = start_sweep_worker(db.clone(), producers.clone(), &config);
    let srv = create_server_instance(config, db, producers)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    worker.abort();
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let hold_window = config.hold_window;
    let risk = config.risk.clone();
    let tiers = config.tiers.clone();
    let srv = HttpServer::new(move || {
        let order_flow_api = OrderFlowApi::new(db.clone(), producers.clone(), hold_window);
        let settlement_api = SettlementApi::new(db.clone(), producers.clone(), risk.clone(), tiers.clone());
        let wallet_api = WalletApi::new(db.clone());
        let risk_api = RiskApi::new(db.clone(), risk.clone());
        let api_scope = web::scope("/api")
            .service(TransitionOrderRoute::<SqliteDatabase>::new())
            .service(OrderByCodeRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new())
            .service(RunSweepRoute::<SqliteDatabase>::new())
            .service(PartnerLedgerRoute::<SqliteDatabase>::new())
            .service(PartnerRiskRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("csl::access_log"))
            .app_data(web::Data::new(order_flow_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(risk_api))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
