use mastery_backend::config::Config;
use mastery_backend::logging::init_tracing;
use mastery_backend::{app, build_state, db};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level);

    let store = match db::connect_store(&config.db).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(
                error = %err,
                mode = config.db.mode.label(),
                "failed to open mastery store"
            );
            std::process::exit(1);
        }
    };

    match &config.remote_bkt {
        Some(remote) => tracing::info!(
            url = %remote.base_url,
            timeout_ms = remote.timeout.as_millis() as u64,
            "remote BKT enabled"
        ),
        None => tracing::info!("remote BKT disabled, using local engine"),
    }
    if config.content.fallback {
        tracing::warn!("no content provider key configured, defaulting to Ollama");
    }
    tracing::info!(
        provider = config.content.kind.as_str(),
        model = %config.content.model,
        "content provider configured"
    );

    let app = app(build_state(&config, store));

    let addr = config.bind_addr();
    tracing::info!(%addr, "mastery-backend listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
