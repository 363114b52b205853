use hub::CancellationToken;
use log::*;
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting catalog update hub [{}] on {}...",
        config.runtime_env(),
        config.listen_address()
    );

    let app_state = AppState::new(config);
    let shutdown = CancellationToken::new();

    let dispatch = {
        let hub = app_state.hub.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { hub.run(shutdown).await })
    };

    let mut server = tokio::spawn(web::init_server(app_state.clone(), shutdown.clone()));

    let server_result = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping dispatch loop");
            None
        }
        result = &mut server => Some(result),
    };
    shutdown.cancel();

    match dispatch.await {
        Ok(Ok(())) => info!("Dispatch loop stopped"),
        Ok(Err(e)) => error!("Dispatch loop failed: {e}"),
        Err(e) => error!("Dispatch task panicked: {e}"),
    }

    // Open SSE responses hold graceful shutdown until their connections close.
    // Streams accepted after this point are refused by the hub.
    app_state.hub.close_all().await;

    let server_result = match server_result {
        Some(result) => result,
        None => server.await,
    };
    match server_result {
        Ok(Ok(())) => info!("Server stopped"),
        Ok(Err(e)) => {
            error!("Server error: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Server task panicked: {e}");
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
