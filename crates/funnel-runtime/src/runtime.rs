//! Funnel runtime - service lifecycle.
//!
//! [`FunnelRuntime`] ties the pieces together: it loads and validates the
//! configuration, installs logging, freezes the route table into a
//! [`Dispatcher`] and runs it behind a [`Listener`].
//!
//! ```text
//! RuntimeBuilder ──build()──▶ FunnelRuntime ──start()──▶ serving ──shutdown()──▶ stopped
//!                                   │                        ▲
//!                                   └──── serve() / serve_until(signal) ────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use funnel_runtime::FunnelRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = FunnelRuntime::builder()
//!         .get("/sync-test", direct(|_, _| Err(Failure::new("boom"))))
//!         .build()?;
//!
//!     // Serves until Ctrl+C or SIGTERM
//!     runtime.serve().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use funnel_framework::{Dispatcher, DispatcherBuilder, FailureRenderer, Handler, Method};
#[cfg(feature = "http-server")]
use funnel_transport::HttpServer;
use funnel_transport::{Listener, ListenerHandle};
use parking_lot::Mutex;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, FunnelConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging::LoggingBuilder;

/// A configured Funnel service.
pub struct FunnelRuntime {
    config: FunnelConfig,
    dispatcher: Dispatcher,
    listener: Arc<dyn Listener>,
    handle: Mutex<Option<ListenerHandle>>,
}

impl FunnelRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// The effective configuration.
    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// The frozen dispatcher, e.g. for in-process testing.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Short name of the listener, e.g. `"http"`.
    pub fn transport(&self) -> &'static str {
        self.listener.name()
    }

    /// Whether the listener is running.
    pub fn is_serving(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// The bound address while serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.lock().as_ref().map(ListenerHandle::local_addr)
    }

    /// Binds the listener and starts serving in the background.
    pub async fn start(&self) -> RuntimeResult<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            return Err(RuntimeError::AlreadyServing(addr));
        }

        let addr = self.config.server.addr();
        let handle = self
            .listener
            .listen(&addr, self.dispatcher.clone())
            .await?;
        let local_addr = handle.local_addr();

        {
            let mut slot = self.handle.lock();
            if let Some(existing) = slot.as_ref() {
                let existing = existing.local_addr();
                drop(slot);
                handle.stop();
                return Err(RuntimeError::AlreadyServing(existing));
            }
            *slot = Some(handle);
        }

        info!(
            addr = %local_addr,
            transport = self.listener.name(),
            routes = self.dispatcher.route_count(),
            "Funnel runtime started"
        );
        Ok(local_addr)
    }

    /// Stops the listener and waits for in-flight requests.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        let handle = self.handle.lock().take().ok_or(RuntimeError::NotServing)?;
        info!(addr = %handle.local_addr(), "Shutting down Funnel runtime");

        handle.shutdown().await?;

        let stats = self.dispatcher.reporter().stats();
        info!(
            delivered = stats.delivered,
            suppressed = stats.suppressed,
            reporter_faults = stats.reporter_faults,
            "Funnel runtime stopped"
        );
        Ok(())
    }

    /// Serves until Ctrl+C or SIGTERM.
    pub async fn serve(&self) -> RuntimeResult<()> {
        self.serve_until(wait_for_shutdown()).await
    }

    /// Serves until `shutdown` resolves.
    pub async fn serve_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.shutdown().await
    }
}

impl std::fmt::Debug for FunnelRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunnelRuntime")
            .field("addr", &self.config.server.addr())
            .field("transport", &self.transport())
            .field("dispatcher", &self.dispatcher)
            .field("serving", &self.is_serving())
            .finish()
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler, waiting for Ctrl+C only");
            }
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C, shutting down");
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`FunnelRuntime`].
///
/// Routes are registered here and frozen by [`build`](Self::build); the
/// pipeline defaults (`default_timeout_ms`, `request_log`) come from the
/// configuration.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<FunnelConfig>,
    routes: DispatcherBuilder,
    listener: Option<Arc<dyn Listener>>,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Creates a builder that searches the current directory for config.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            routes: DispatcherBuilder::new(),
            listener: None,
            init_logging: true,
        }
    }

    /// Loads configuration from exactly this file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables `FUNNEL_*` environment overrides.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Replaces the whole loader.
    pub fn config_loader(mut self, loader: ConfigLoader) -> Self {
        self.config_loader = loader;
        self
    }

    /// Uses `config` as-is, skipping file and environment loading.
    pub fn config(mut self, config: FunnelConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Whether `build` installs the global tracing subscriber (default: true).
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    /// Registers a route.
    pub fn route(mut self, method: Method, path: impl Into<String>, handler: Handler) -> Self {
        self.routes = self.routes.register(method, path, handler);
        self
    }

    /// Registers a `GET` route.
    pub fn get(self, path: impl Into<String>, handler: Handler) -> Self {
        self.route(Method::GET, path, handler)
    }

    /// Registers a `POST` route.
    pub fn post(self, path: impl Into<String>, handler: Handler) -> Self {
        self.route(Method::POST, path, handler)
    }

    /// Applies a function to the underlying [`DispatcherBuilder`].
    pub fn routes<F>(mut self, f: F) -> Self
    where
        F: FnOnce(DispatcherBuilder) -> DispatcherBuilder,
    {
        self.routes = f(self.routes);
        self
    }

    /// Uses a custom failure renderer.
    pub fn renderer(mut self, renderer: Arc<dyn FailureRenderer>) -> Self {
        self.routes = self.routes.renderer(renderer);
        self
    }

    /// Uses a custom listener instead of the HTTP server.
    pub fn listener<L: Listener + 'static>(mut self, listener: L) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Loads and validates the configuration and freezes the routes.
    pub fn build(self) -> RuntimeResult<FunnelRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging
            && LoggingBuilder::from_config(&config.logging)
                .try_init()
                .is_err()
        {
            debug!("Global tracing subscriber already installed, keeping it");
        }

        let dispatcher = self
            .routes
            .default_timeout(config.pipeline.default_timeout())
            .request_log(config.pipeline.request_log)
            .build();

        if dispatcher.route_count() == 0 {
            warn!("No routes registered, every request will be answered with 404");
        }

        let listener = match self.listener {
            Some(listener) => listener,
            None => default_listener(&config)?,
        };

        debug!(
            addr = %config.server.addr(),
            routes = dispatcher.route_count(),
            default_timeout_ms = config.pipeline.default_timeout_ms,
            "Funnel runtime built"
        );

        Ok(FunnelRuntime {
            config,
            dispatcher,
            listener,
            handle: Mutex::new(None),
        })
    }
}

#[cfg(feature = "http-server")]
fn default_listener(config: &FunnelConfig) -> RuntimeResult<Arc<dyn Listener>> {
    Ok(Arc::new(
        HttpServer::new().with_max_body_bytes(config.server.max_body_bytes),
    ))
}

#[cfg(not(feature = "http-server"))]
fn default_listener(_config: &FunnelConfig) -> RuntimeResult<Arc<dyn Listener>> {
    Err(RuntimeError::NoListener)
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_framework::{Failure, Request, StatusCode, direct};
    use std::time::Duration;

    fn test_config() -> FunnelConfig {
        let mut config = FunnelConfig::default();
        config.server.port = 1;
        config.pipeline.default_timeout_ms = 250;
        config.pipeline.request_log = false;
        config
    }

    #[cfg(feature = "http-server")]
    #[test]
    fn test_build_applies_pipeline_config() {
        let runtime = FunnelRuntime::builder()
            .config(test_config())
            .with_logging(false)
            .get("/sync-test", direct(|_, _| Err(Failure::new("boom"))))
            .build()
            .unwrap();

        assert_eq!(runtime.dispatcher().route_count(), 1);
        assert_eq!(
            runtime.dispatcher().default_timeout(),
            Duration::from_millis(250)
        );
        assert_eq!(runtime.transport(), "http");
        assert!(!runtime.is_serving());
    }

    #[cfg(not(feature = "http-server"))]
    #[test]
    fn test_build_without_listener() {
        let result = FunnelRuntime::builder()
            .config(test_config())
            .with_logging(false)
            .build();

        assert!(matches!(result, Err(RuntimeError::NoListener)));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = test_config();
        config.pipeline.default_timeout_ms = 0;

        let result = FunnelRuntime::builder()
            .config(config)
            .with_logging(false)
            .build();

        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[cfg(feature = "http-server")]
    #[tokio::test]
    async fn test_shutdown_without_start() {
        let runtime = FunnelRuntime::builder()
            .config(test_config())
            .with_logging(false)
            .build()
            .unwrap();

        assert!(matches!(
            runtime.shutdown().await,
            Err(RuntimeError::NotServing)
        ));
    }

    #[cfg(feature = "http-server")]
    #[tokio::test]
    async fn test_dispatcher_is_usable_in_process() {
        let runtime = FunnelRuntime::builder()
            .config(test_config())
            .with_logging(false)
            .routes(|b| b.get("/ok", direct(|_, res| res.text(StatusCode::OK, "ok"))))
            .build()
            .unwrap();

        let response = runtime.dispatcher().dispatch(Request::get("/ok")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
