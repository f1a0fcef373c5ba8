use anyhow::Result;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use aula_common::EnvVars;
use aula_service_api::{payout_routes, refund_routes, setup_tracing, ApiServerEnv, GlobalState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let cors = CorsLayer::very_permissive();
    let trace = TraceLayer::new_for_http();

    let state = GlobalState::new().await?;

    let app = Router::new()
        .merge(refund_routes())
        .merge(payout_routes())
        .layer(cors)
        .layer(trace)
        .with_state(state);

    let env = ApiServerEnv::load();
    let port_raw = env.get_env_var("PORT");
    let port: u16 = if port_raw.is_empty() {
        3043
    } else {
        port_raw.parse().expect("failed to convert to number")
    };

    let listener = tokio::net::TcpListener::bind(format!(":::{port}")).await?;

    tracing::info!("LISTENING ON {port}");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
