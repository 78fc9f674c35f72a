//! The musicroom HTTP API and per-room WebSocket gateway.

mod actor;
mod connections;
mod context;
mod docs;
mod errors;
mod gateway;
mod members;
mod messages;
mod queue;
mod rooms;
mod schemas;
mod serialized;
mod tracks;

use std::net::{Ipv6Addr, SocketAddr};

use axum::routing::get;
use log::info;
use musicroom_collab::Collab;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use actor::{Actor, USER_ID_HEADER};
pub use connections::{ConnectionHandle, ConnectionRegistry, ServerEvent};
pub use context::ServerContext;
pub use docs::ApiDoc;
pub use errors::{ServerError, ServerResult};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Builds the full router, with every route under `/v1` and the OpenAPI document at `/api.json`
pub fn app(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/tracks", tracks::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the musicroom server, forwarding collab events to connected clients
pub async fn run_server(collab: Collab, port: u16) -> std::io::Result<()> {
    let context = ServerContext::new(collab);
    context.connections.forward(context.collab.events());

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);
    axum::serve(listener, app(context)).await
}
