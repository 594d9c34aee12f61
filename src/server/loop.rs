// Server loop module
// Accepts connections until a shutdown is signalled, then lets in-flight ones finish

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::handler::Application;
use crate::logger;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run the accept loop on the current `LocalSet`.
///
/// Returns once `shutdown` is notified and the open connections have
/// closed, or the drain deadline (`performance.write_timeout`) has passed.
pub async fn start_server_loop(
    listener: TcpListener,
    app: Arc<Application>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &app, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = shutdown.notified() => {
                logger::log_shutdown("Stopped accepting new connections");
                break;
            }
        }
    }
    drop(listener);

    let grace = Duration::from_secs(app.state.config.performance.write_timeout);
    let deadline = tokio::time::Instant::now() + grace;
    while active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "{} connection(s) still open after {}s, closing",
                active_connections.load(Ordering::SeqCst),
                grace.as_secs()
            ));
            break;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
    logger::log_shutdown("Server stopped");
    Ok(())
}
