use futures::FutureExt;
use hyper::{Method, Request, Response, StatusCode, body::Incoming};
use std::{
    mem,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{api, db::Transaction, prelude::*};
use super::Context;


/// This is the main HTTP entry point, called for each incoming request. Wraps
/// the actual handler to catch panics: that way we always answer with `500`
/// instead of just crashing the connection's task.
pub(super) async fn handle(req: Request<Incoming>, ctx: Arc<Context>) -> Response<String> {
    match AssertUnwindSafe(handle_inner(req, ctx)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            // The `panic` value is just an `Any` representing the value the
            // panic was invoked with. For most panics, this is `&str` or
            // `String`.
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().copied());

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{}'", msg),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            internal_server_error()
        }
    }
}

async fn handle_inner(req: Request<Incoming>, ctx: Arc<Context>) -> Response<String> {
    trace!(
        "Incoming HTTP {:?} request to '{}{}'",
        req.method(),
        req.uri().path(),
        req.uri().query().map(|q| format!("?{}", q)).unwrap_or_default(),
    );

    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/');

    match path {
        // The GraphQL endpoint: every query and mutation goes through here.
        "/graphql" if method == Method::GET || method == Method::POST => {
            handle_api(req, &ctx).await
        }

        // The interactive GraphQL explorer/IDE, only served if enabled in
        // the configuration.
        "/graphiql" if method == Method::GET && ctx.config.http.graphiql => {
            juniper_hyper::graphiql("/graphql", None).await
        }

        _ if method != Method::GET && method != Method::HEAD => {
            Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header("Content-Type", "text/plain; charset=UTF-8")
                .body("405 Method not allowed".into())
                .unwrap()
        }

        _ => {
            debug!("Responding with 404 to {:?} '{}'", method, path);
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .header("Content-Type", "text/plain; charset=UTF-8")
                .body("404 Not found".into())
                .unwrap()
        }
    }
}

/// Handles a request to `/graphql`.
///
/// Each API request is executed inside its own database transaction, which is
/// only committed after all resolvers ran. In particular, multi-step
/// mutations (the delete cascades and the `addDish` reverse-link append)
/// either take full effect or none at all.
async fn handle_api(req: Request<Incoming>, ctx: &Context) -> Response<String> {
    let before = Instant::now();

    // Get a connection for this request.
    let mut connection = match ctx.db_pool.get().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to obtain DB connection for API request: {}", e);
            return service_unavailable();
        }
    };

    let acquire_conn_time = before.elapsed();
    if acquire_conn_time > Duration::from_millis(5) {
        warn!("Acquiring DB connection from pool took {:.2?}", acquire_conn_time);
    }

    let tx = match connection.transaction().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("Failed to start transaction for API request: {}", e);
            return internal_server_error();
        }
    };

    // `juniper` does not support contexts with a lifetime parameter, but the
    // transaction type borrows from the DB connection and thus has one. We
    // use `unsafe` to get rid of that lifetime and pretend it's `'static`.
    // For this to be sound the transaction must not outlive the borrowed
    // connection. We put it into an `Arc`, which lets us check below that no
    // handler stored an extra handle somewhere: the transaction is not
    // `Clone` and `Arc` only hands out immutable references, so even a buggy
    // handler could not move it out.
    //
    // `connection` is not treated as borrowed after this unsafe block, so we
    // must not access it at all until the transaction is gone (by committing
    // it below).
    type PgTx<'a> = deadpool_postgres::Transaction<'a>;
    let tx = unsafe {
        let static_tx = mem::transmute::<PgTx<'_>, PgTx<'static>>(tx);
        Arc::new(static_tx)
    };

    let api_context = Arc::new(api::Context {
        db: Transaction::new(tx.clone()),
        config: ctx.config.clone(),
    });
    let out = juniper_hyper::graphql(ctx.api_root.clone(), api_context.clone(), req).await;
    let num_queries = api_context.db.num_queries();
    drop(api_context);

    // Check whether we own the last remaining handle of this Arc.
    let out = match Arc::try_unwrap(tx) {
        Err(_) => {
            // There are still other handles, meaning that an API handler
            // incorrectly stored the transaction somewhere with a longer
            // lifetime. This must NEVER happen: after this function exits we
            // would have a dangling borrow of the connection. Panicking only
            // brings down the current task, so we have to reach for more
            // drastic measures.
            error!("FATAL BUG: API handler kept reference to transaction. Ending process.");
            std::process::abort();
        }
        Ok(tx) => {
            match tx.commit().await {
                // If the transaction succeeded we can return the generated response.
                Ok(_) => out,

                Err(e) => {
                    error!("Failed to commit transaction for API request: {}", e);
                    service_unavailable()
                }
            }
        }
    };

    debug!(
        "Finished /graphql request in {:.2?} (with {} DB queries)",
        before.elapsed(),
        num_queries,
    );

    out
}

fn service_unavailable() -> Response<String> {
    Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .body("Server error: service unavailable. Potentially try again later.".into())
        .unwrap()
}

fn internal_server_error() -> Response<String> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body("Internal server error".into())
        .unwrap()
}
