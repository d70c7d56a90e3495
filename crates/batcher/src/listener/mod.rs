use std::convert::Infallible;
use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_ENCODING;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::datum::MetricRequest;

pub const METRICS_PATH: &str = "/v1/metrics";

fn response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::default());
    *resp.status_mut() = status;
    resp
}

fn decode_body(body: Bytes, gzip: bool) -> Result<String, String> {
    if gzip {
        let mut decoded = String::new();
        GzDecoder::new(&body[..])
            .read_to_string(&mut decoded)
            .map_err(|e| format!("invalid gzip body: {e}"))?;
        Ok(decoded)
    } else {
        String::from_utf8(body.into()).map_err(|_| "body is not valid UTF-8".to_owned())
    }
}

/// Validate the incoming request: route, method, and body.
async fn validate<B>(req: Request<B>) -> Result<MetricRequest, (StatusCode, String)>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
{
    let path = req.uri().path().to_owned();
    let method = req.method().clone();

    if path != METRICS_PATH {
        return Err((StatusCode::NOT_FOUND, format!("unknown path: {path}")));
    }
    if method != Method::POST {
        return Err((StatusCode::METHOD_NOT_ALLOWED, format!("{method} {path}")));
    }

    let gzip = req
        .headers()
        .get(CONTENT_ENCODING)
        .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"));

    let body = req.collect().await.map(|c| c.to_bytes()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("POST {path}: failed to read body"),
        )
    })?;

    let text = decode_body(body, gzip).map_err(|reason| (StatusCode::BAD_REQUEST, reason))?;

    MetricRequest::parse(&text)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid metric request: {e}")))
}

async fn handle<B>(
    req: Request<B>,
    tx: mpsc::Sender<MetricRequest>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
{
    let request = match validate(req).await {
        Ok(request) => request,
        Err((status, reason)) => {
            warn!(reason, "ingest request rejected");
            return Ok(response(status));
        }
    };

    debug!(
        namespace = request.namespace.as_str(),
        count = request.metric_data.len(),
        "ingest request accepted"
    );

    match tx.try_send(request) {
        Ok(()) => Ok(response(StatusCode::OK)),
        Err(TrySendError::Full(_)) => {
            let mut resp = response(StatusCode::SERVICE_UNAVAILABLE);
            resp.headers_mut()
                .insert("Retry-After", hyper::header::HeaderValue::from_static("1"));
            Ok(resp)
        }
        // The relay loop is gone (shutdown). Retrying won't help.
        Err(TrySendError::Closed(_)) => Ok(response(StatusCode::BAD_GATEWAY)),
    }
}

/// Accept connections until `cancel` fires, forwarding every valid
/// `POST /v1/metrics` body to `tx`.
pub async fn serve(
    listener: TcpListener,
    tx: mpsc::Sender<MetricRequest>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                let stream = match result {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let tx = tx.clone();
                        handle(req, tx)
                    });
                    let _ = Builder::new(hyper_util::rt::TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
            _ = cancel.cancelled() => {
                break;
            }
        }
    }
}
