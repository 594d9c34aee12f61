use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

mod config;
mod forms;
mod handler;
mod http;
mod logger;
mod mail;
mod routing;
mod server;
mod session;
mod store;
mod templates;
mod views;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // First argument is the config file path without extension (default: ./config)
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = config::Config::load_from(&config_path)?;

    logger::init(&cfg)?;

    // Tokio runtime sized from the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("Using {workers} worker threads"));
    } else {
        logger::log_info("Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    if cfg.uses_dev_secret() {
        logger::log_warning("app.secret_key is the development default; sessions are forgeable");
    }

    let store = store::Store::open(Path::new(&cfg.database.path))?;
    if store.seed_defaults()? {
        for role in store.list_roles()? {
            let members = store.users_in_role(role.id)?;
            logger::log_info(&format!(
                "Seeded role {} with {} user(s)",
                role.name,
                members.len()
            ));
        }
    }

    let mailer: Arc<dyn mail::Mailer> = Arc::new(mail::SmtpMailer::start(&cfg.mail)?);

    // Duplicate routes are a startup error
    let router = views::build_router()?;
    let route_count = router.routes().count();

    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &cfg, route_count);

    let state = config::AppState::new(cfg, store, mailer);
    let app = Arc::new(handler::Application::new(router, state));
    let active_connections = Arc::new(AtomicUsize::new(0));

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    // Connections are served with spawn_local
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            app,
            active_connections,
            Arc::clone(&signals.shutdown),
        ))
        .await?;

    if signals.is_shutdown_requested() {
        logger::log_info("Shutdown complete");
    }
    Ok(())
}
