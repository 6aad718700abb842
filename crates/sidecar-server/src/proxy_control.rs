// ── Proxy control ────────────────────────────────────────────────────────────
// The multi-provider proxy listens on its own port, separate from this API
// server's. Start/stop isn't a real child process anywhere in this codebase —
// it's an in-process Tokio task bound with a graceful-shutdown signal, which
// is the only supervision primitive a single-binary daemon like this one has.

use axum::Router;
use parking_lot::Mutex;
use serde::Serialize;
use sidecar_core::{SidecarError, SidecarResult};
use sidecar_proxy::ProxyState;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyStatus {
    pub running: bool,
    pub address: Option<String>,
}

#[derive(Default)]
pub struct ProxyControl {
    running: Mutex<Option<Running>>,
}

impl ProxyControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ProxyStatus {
        match &*self.running.lock() {
            Some(running) => ProxyStatus { running: true, address: Some(running.addr.to_string()) },
            None => ProxyStatus { running: false, address: None },
        }
    }

    pub async fn start(&self, host: &str, port: u16, proxy_state: ProxyState) -> SidecarResult<ProxyStatus> {
        if self.running.lock().is_some() {
            return Err(SidecarError::validation("proxy is already running"));
        }

        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| SidecarError::Config(format!("invalid proxy bind address '{host}:{port}': {e}")))?;
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(SidecarError::Io)?;
        let router: Router = sidecar_proxy::router(proxy_state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = server.await {
                log::warn!("[server] proxy listener exited: {err}");
            }
        });

        *self.running.lock() = Some(Running { addr, shutdown: shutdown_tx, handle });
        log::info!("[server] proxy started on {addr}");
        Ok(ProxyStatus { running: true, address: Some(addr.to_string()) })
    }

    pub async fn stop(&self) -> SidecarResult<ProxyStatus> {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return Ok(ProxyStatus { running: false, address: None });
        };
        let _ = running.shutdown.send(());
        let _ = running.handle.await;
        log::info!("[server] proxy stopped");
        Ok(ProxyStatus { running: false, address: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_is_stopped_before_start() {
        let control = ProxyControl::new();
        let status = control.status();
        assert!(!status.running);
        assert!(status.address.is_none());
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let control = ProxyControl::new();
        let status = control.stop().await.unwrap();
        assert!(!status.running);
    }
}
