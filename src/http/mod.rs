//! The HTTP server, handler and routes.
//!
//! This file itself contains fairly little business logic and just sets up
//! the `hyper` server and catches errors. The main logic is in `handlers.rs`.

use deadpool_postgres::Pool;
use hyper::service::service_fn;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tokio::net::TcpListener;

use crate::{api, config::Config, prelude::*};
use self::handlers::handle;


mod handlers;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(env = "LADLE_PORT", default = 8000)]
    pub(crate) port: u16,

    /// The bind address to listen on.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,

    /// Whether to serve the interactive GraphQL explorer under `/graphiql`.
    /// Intended for development setups; leave disabled in production.
    #[config(env = "LADLE_GRAPHIQL", default = false)]
    pub(crate) graphiql: bool,
}


/// Context that the request handler has access to.
struct Context {
    api_root: Arc<api::RootNode>,
    db_pool: Pool,
    config: Arc<Config>,
}


/// Starts the HTTP server. The future returned by this function must be
/// awaited to actually run it. Returns once an interrupt signal is received.
pub(crate) async fn serve(
    config: Config,
    api_root: api::RootNode,
    db: Pool,
) -> Result<()> {
    let http_config = config.http.clone();
    let ctx = Arc::new(Context {
        api_root: Arc::new(api_root),
        db_pool: db,
        config: Arc::new(config),
    });

    let addr = SocketAddr::new(http_config.address, http_config.port);
    let listener = TcpListener::bind(addr).await
        .context(format!("failed to bind to {addr}"))?;
    info!("Listening on http://{}", addr);

    loop {
        let (tcp, _) = tokio::select! {
            conn = listener.accept() => conn.context("failed to accept TCP connection")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt signal: shutting down");
                return Ok(());
            }
        };

        // Each connection is served by its own task. All request handling
        // logic lives in `handle`; here we only thread the context through.
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let ctx = Arc::clone(&ctx);
                async move { Ok::<_, Infallible>(handle(req, ctx).await) }
            });

            let result = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(tcp), service)
                .await;
            if let Err(e) = result {
                debug!("Error serving HTTP connection: {e}");
            }
        });
    }
}
