use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Ctrl+C → отмена токена. Прерывание — штатная остановка, не ошибка.
pub fn cancel_on_interrupt(token: &CancellationToken) -> JoinHandle<()> {
    let token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "cannot listen for interrupt signal"),
        }
    })
}
