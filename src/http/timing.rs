/// `Server-Timing` middleware: records per-stage durations a
/// handler attaches via [`record`], plus the request's total wall-clock
/// time, into a single `Server-Timing` response header.
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::response::Response;

/// Stage durations a handler records as it completes sub-queries. Stored as
/// a response extension so the outer middleware can read them back after
/// the handler returns.
#[derive(Default, Clone)]
struct Timings(Vec<(&'static str, Duration)>);

/// Attach a named duration to a response, read by the `Server-Timing`
/// middleware once the handler returns.
pub fn record(response: &mut Response, name: &'static str, elapsed: Duration) {
    let timings = response.extensions_mut().get_mut::<Timings>();
    match timings {
        Some(t) => t.0.push((name, elapsed)),
        None => {
            response.extensions_mut().insert(Timings(vec![(name, elapsed)]));
        }
    }
}

/// A `tower::Layer`-compatible middleware, applied via
/// `Router::layer(ServerTimingLayer)`.
#[derive(Clone, Copy)]
pub struct ServerTimingLayer;

impl<S> tower::Layer<S> for ServerTimingLayer {
    type Service = ServerTimingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerTimingService { inner }
    }
}

#[derive(Clone)]
pub struct ServerTimingService<S> {
    inner: S,
}

impl<S> tower::Service<Request> for ServerTimingService<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        Box::pin(async move {
            let start = Instant::now();
            let mut response = inner.call(request).await?;
            let total = start.elapsed();

            let timings = response.extensions_mut().remove::<Timings>().unwrap_or_default();
            let mut parts: Vec<String> = timings
                .0
                .iter()
                .map(|(name, dur)| format!("{name};dur={:.2}", dur.as_secs_f64() * 1000.0))
                .collect();
            parts.push(format!("total;dur={:.2}", total.as_secs_f64() * 1000.0));

            if let Ok(value) = HeaderValue::from_str(&parts.join(", ")) {
                response.headers_mut().insert("Server-Timing", value);
            }
            Ok(response)
        })
    }
}
