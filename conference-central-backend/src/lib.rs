pub mod announcements;
pub mod cache;
pub mod error;
pub mod forms;
pub mod identity;
pub mod mail;
pub mod routes;
pub mod tasks;

use core::future::Future;
use core::time::Duration;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use conference_central_config::Config;
use conference_central_database::{get_database_connection, MemoryStore, PgStore, Store};
use error::AppError;
use futures_util::pin_mut;
use headers::HeaderMapExt as _;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use identity::XRequestId;
use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt as _;
use tracing::{error, info, info_span, warn, Instrument as _};

use crate::cache::{Cache, MemoryCache};
use crate::mail::{LogMailer, Mailer};
use crate::tasks::{spawn_worker, RetryPolicy, TaskQueue, TaskRunner};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn Cache>,
    pub tasks: TaskQueue,
    pub runner: TaskRunner,
    /// Shared secret of the internal endpoints.
    pub internal_token: Option<String>,
}

impl AppState {
    /// Also starts the background task worker.
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        mailer: Arc<dyn Mailer>,
        policy: RetryPolicy,
        internal_token: Option<String>,
    ) -> (Self, JoinHandle<()>) {
        let runner = TaskRunner {
            store: Arc::clone(&store),
            cache: Arc::clone(&cache),
            mailer,
        };
        let (tasks, worker) = spawn_worker(runner.clone(), policy);
        (
            Self {
                store,
                cache,
                tasks,
                runner,
                internal_token,
            },
            worker,
        )
    }
}

/// Runs the rest of the request inside a `request` span and echoes the request
/// id on the response.
async fn request_span(request: Request, next: Next) -> Response {
    let request_id = XRequestId::from_headers(request.headers());
    let span = info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id.0,
    );
    let mut response = next.run(request).instrument(span).await;
    response.headers_mut().typed_insert(request_id);
    response
}

pub async fn setup_server(config: &Config) -> Result<Router, AppError> {
    info!("starting up server...");

    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            let pool = get_database_connection(database_url, config.database_max_connections)?;
            let store = PgStore::new(pool);
            store.apply_schema().await?;
            Arc::new(store)
        }
        None => {
            warn!("no database_url configured, data is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    let (state, _worker) = AppState::new(
        store,
        Arc::new(MemoryCache::default()),
        Arc::new(LogMailer::new(config.mail_sender.clone())),
        RetryPolicy {
            attempts: config.task_attempts,
            delay: Duration::from_millis(config.task_retry_delay_ms),
        },
        config.internal_token.clone(),
    );
    if state.internal_token.is_none() {
        warn!("no internal_token configured, cron and task endpoints refuse every request");
    }
    Ok(routes::router(state))
}

#[allow(clippy::cognitive_complexity)]
pub async fn run_server(
    config: Config,
) -> Result<impl Future<Output = Result<(), AppError>>, AppError> {
    let router = setup_server(&config).await?;

    let listener = TcpListener::bind(config.listen_address).await?;

    // tell the connections to shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let shutdown_tx = Arc::new(shutdown_tx);

    // wait for the connections to finish shutdown
    let (closed_tx, closed_rx) = watch::channel(());

    info!(address = %config.listen_address, "started up server...");

    Ok(async move {
        #[allow(clippy::redundant_pub_crate)]
        loop {
            select! {
                accept = listener.accept() => {
                    let (socket, remote_addr) = match accept {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            error!("failed to accept connection: {err}");
                            continue;
                        }
                    };

                    let router = router.clone();
                    let shutdown_tx = Arc::clone(&shutdown_tx);
                    let closed_rx = closed_rx.clone();

                    let fut = async move {
                        let socket = TokioIo::new(socket);

                        let hyper_service =
                            hyper::service::service_fn(move |request: http::Request<Incoming>| {
                                router.clone().oneshot(request)
                            });

                        let builder = Builder::new(TokioExecutor::new());
                        let connection = builder.serve_connection(socket, hyper_service);
                        pin_mut!(connection);

                        let mut shutting_down = false;
                        loop {
                            select! {
                                connection_result = connection.as_mut() => {
                                    if let Err(err) = connection_result {
                                        error!("failed to serve connection: {err:#}");
                                    }
                                    break;
                                }
                                () = shutdown_tx.closed(), if !shutting_down => {
                                    connection.as_mut().graceful_shutdown();
                                    shutting_down = true;
                                }
                            }
                        }

                        drop(closed_rx);
                    };

                    tokio::spawn(fut.instrument(info_span!("connection", %remote_addr)));
                }
                () = shutdown_signal() => {
                    warn!("shutting down, waiting for open connections");
                    drop(shutdown_rx); // initiate shutdown
                    drop(closed_rx);
                    drop(listener);
                    closed_tx.closed().await;
                    break;
                }
            }
        }

        info!("server stopped");
        Ok(())
    })
}

#[allow(clippy::redundant_pub_crate)]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            core::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {err}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
