//! `tower::Service` integration.
//!
//! A [`Dispatcher`] is a `Service<Request>` whose error type is
//! [`Infallible`]: failures are already turned into responses by the error
//! reporter, so nothing ever reaches the service's error path. This lets the
//! dispatcher sit under ordinary tower middleware.
//!
//! ```rust,ignore
//! use tower::ServiceExt;
//!
//! let svc = dispatcher.into_service();
//! let response = svc.oneshot(Request::get("/sync-test")).await?;
//! ```

use std::convert::Infallible;
use std::task::{Context, Poll};

use funnel_core::{Request, Response};
use tower::Service;
use tower::util::BoxCloneSyncService;

use crate::dispatcher::Dispatcher;
use crate::handler::BoxFuture;

/// Type-erased dispatch service.
pub type DispatchService = BoxCloneSyncService<Request, Response, Infallible>;

impl Service<Request> for Dispatcher {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
    }
}

impl Dispatcher {
    /// Erases the dispatcher into a [`DispatchService`].
    pub fn into_service(self) -> DispatchService {
        BoxCloneSyncService::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::direct;
    use funnel_core::{Failure, StatusCode};
    use serde_json::json;
    use tokio_test::{assert_ready_ok, task};
    use tower::ServiceExt;

    fn dispatcher() -> Dispatcher {
        Dispatcher::builder()
            .get("/ok", direct(|_, res| res.json(json!({ "ok": true }))))
            .get("/sync-test", direct(|_, _| Err(Failure::new("boom"))))
            .build()
    }

    #[test]
    fn test_always_ready() {
        let mut svc = dispatcher();
        let mut ready = task::spawn(std::future::poll_fn(|cx| svc.poll_ready(cx)));
        assert_ready_ok!(ready.poll());
    }

    #[tokio::test]
    async fn test_oneshot_success() {
        let response = dispatcher()
            .into_service()
            .oneshot(Request::get("/ok"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_failures_are_responses_not_errors() {
        let svc = dispatcher().into_service();

        let response = svc.clone().oneshot(Request::get("/sync-test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = svc.oneshot(Request::get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
