//! Blocking HTTP transport abstraction.
use std::collections::HashMap;
use std::time::Duration;

use reqwest::Url;

use crate::requests::RequestMethod;
use crate::Result;

/// One outbound HTTP exchange, fully resolved: the URL already carries the query string.
#[derive(Debug)]
pub struct TransportRequest<'a> {
    /// Fully-built request URL, including query parameters.
    pub url: Url,
    /// HTTP method.
    pub method: RequestMethod,
    /// Request headers.
    pub headers: &'a HashMap<String, String>,
    /// Serialized JSON body, if the request carries one.
    pub body: Option<String>,
    /// Connect/read timeout for this attempt.
    pub timeout: Duration,
}

/// Response to a [`TransportRequest`]. Any HTTP status counts as a response; only
/// transport-level I/O failures surface as errors.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers. Repeated headers keep the first value.
    pub headers: HashMap<String, String>,
    /// Response body text, best-effort decoded.
    pub body: String,
}

/// Performs one blocking HTTP exchange.
///
/// The call blocks until a response or an I/O error; callers are expected to invoke it off
/// the main/UI thread.
pub trait HttpTransport: Send + Sync {
    /// Execute the exchange, returning the response or a transport-level error.
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse>;
}

/// [`HttpTransport`] backed by a blocking [`reqwest`] client.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Create a new transport with its own connection pool.
    pub fn new() -> ReqwestTransport {
        ReqwestTransport::default()
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse> {
        let method = match request.method {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, request.url)
            .timeout(request.timeout);

        for (key, value) in request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send()?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (key.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        // Best-effort: an unreadable body is stored as empty rather than failing the attempt.
        let body = response.text().unwrap_or_else(|err| {
            log::warn!(target: "beacon", "failed to read response body: {err}");
            String::new()
        });

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
