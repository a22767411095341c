//! Handler system for the Funnel framework.
//!
//! A handler is the unit of work bound to a route. There are two variants:
//!
//! - **Direct** handlers run to completion (or fail) before returning control.
//!   They receive the request by reference and must not suspend.
//! - **Deferred** handlers return a future. The future is always driven by a
//!   [`SuspensionAdapter`](crate::adapter::SuspensionAdapter), which routes
//!   its failure, panic or timeout into the error reporter. There is no way to
//!   register a deferred handler without the adapter.
//!
//! Both variants respond through a [`Responder`] and return a
//! [`HandlerResult`]. Returning `Err` (or panicking) hands the failure to the
//! error reporter; there is no need to catch and forward by hand.
//!
//! # Example
//!
//! ```rust,ignore
//! use funnel_framework::{deferred, direct, Failure};
//!
//! let sync_test = direct(|_req, _res| Err(Failure::new("boom")));
//!
//! let async_test = deferred(|_req, res| async move {
//!     load_user().await?;              // a rejection here is reported
//!     res.json(json!({ "well": "ok" }))
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use funnel_core::{Failure, Request};

use crate::responder::Responder;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type returned by every handler.
pub type HandlerResult = Result<(), Failure>;

// ============================================================================
// Handler traits
// ============================================================================

/// A handler that runs to completion without suspending.
///
/// Implemented for every `Fn(&Request, &Responder) -> HandlerResult`.
pub trait DirectHandler: Send + Sync + 'static {
    /// Handles the request.
    fn call(&self, request: &Request, responder: &Responder) -> HandlerResult;
}

impl<F> DirectHandler for F
where
    F: Fn(&Request, &Responder) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, request: &Request, responder: &Responder) -> HandlerResult {
        (self)(request, responder)
    }
}

/// A handler that begins a suspended operation.
///
/// Implemented for every `Fn(Arc<Request>, Responder) -> Fut` where `Fut`
/// resolves to a [`HandlerResult`].
pub trait DeferredHandler: Send + Sync + 'static {
    /// Starts the operation. The returned future is driven by the adapter.
    fn call(&self, request: Arc<Request>, responder: Responder) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> DeferredHandler for F
where
    F: Fn(Arc<Request>, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: Arc<Request>, responder: Responder) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(request, responder))
    }
}

// ============================================================================
// Handler
// ============================================================================

/// A registered handler, either direct or deferred.
#[derive(Clone)]
pub enum Handler {
    /// Runs synchronously inside the dispatcher.
    Direct(Arc<dyn DirectHandler>),
    /// Runs on its own task under a suspension adapter.
    Deferred {
        /// The handler.
        handler: Arc<dyn DeferredHandler>,
        /// Maximum suspension; `None` uses the dispatcher default.
        timeout: Option<Duration>,
    },
}

impl Handler {
    /// Wraps any [`DirectHandler`] implementation.
    pub fn from_direct<H: DirectHandler>(handler: H) -> Self {
        Self::Direct(Arc::new(handler))
    }

    /// Wraps any [`DeferredHandler`] implementation.
    pub fn from_deferred<H: DeferredHandler>(handler: H) -> Self {
        Self::Deferred {
            handler: Arc::new(handler),
            timeout: None,
        }
    }

    /// Sets the maximum suspension of a deferred handler.
    ///
    /// Direct handlers never suspend, so this leaves them unchanged.
    pub fn with_timeout(self, bound: Duration) -> Self {
        match self {
            Self::Deferred { handler, .. } => Self::Deferred {
                handler,
                timeout: Some(bound),
            },
            direct => direct,
        }
    }

    /// Whether this is a deferred handler.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }

    /// The explicit suspension bound, if any.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Deferred { timeout, .. } => *timeout,
            Self::Direct(_) => None,
        }
    }

    /// Short variant name for logs.
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::Deferred { .. } => "deferred",
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("variant", &self.variant())
            .field("timeout", &self.timeout())
            .finish()
    }
}

/// Creates a direct handler from a closure.
pub fn direct<F>(f: F) -> Handler
where
    F: Fn(&Request, &Responder) -> HandlerResult + Send + Sync + 'static,
{
    Handler::from_direct(f)
}

/// Creates a deferred handler from an async closure.
pub fn deferred<F, Fut>(f: F) -> Handler
where
    F: Fn(Arc<Request>, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Handler::from_deferred(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants() {
        let d = direct(|_, _| Ok(()));
        let a = deferred(|_, _| async { Ok(()) });

        assert!(!d.is_deferred());
        assert!(a.is_deferred());
        assert_eq!(d.variant(), "direct");
        assert_eq!(a.variant(), "deferred");
    }

    #[test]
    fn test_timeout_only_applies_to_deferred() {
        let bound = Duration::from_millis(50);

        let d = direct(|_, _| Ok(())).with_timeout(bound);
        let a = deferred(|_, _| async { Ok(()) }).with_timeout(bound);

        assert_eq!(d.timeout(), None);
        assert_eq!(a.timeout(), Some(bound));
    }

    #[test]
    fn test_trait_object_handlers() {
        struct Health;

        impl DirectHandler for Health {
            fn call(&self, _request: &Request, responder: &Responder) -> HandlerResult {
                responder.json(serde_json::json!({ "status": "ok" }))
            }
        }

        let handler = Handler::from_direct(Health);
        assert!(matches!(handler, Handler::Direct(_)));
    }
}
