use crate::ip::NormalizedIp;
use crate::record::IpDetails;

use hyper::body::Bytes;
use hyper::client::connect::Connect;
use hyper::client::{Client, HttpConnector};
use hyper::http::uri::Uri;
use hyper::{Body, Request, StatusCode};
use hyper_tls::HttpsConnector;
use lazy_static::lazy_static;
use std::time::Duration;
use thiserror::Error;

lazy_static! {
    static ref DEFAULT_ENDPOINT: Uri = "https://ipinfo.io".parse().unwrap();
}

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const MAX_ATTEMPTS: usize = 4;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    #[error(transparent)]
    Http(#[from] hyper::http::Error),
    #[error("non-success status code: {0}")]
    NonSuccess(StatusCode),
    #[error("response is not a geolocation record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no response from {0} within {1:?}")]
    TimedOut(Uri, Duration),
}

impl From<StatusCode> for LookupError {
    fn from(status_code: StatusCode) -> Self {
        LookupError::NonSuccess(status_code)
    }
}

/// Client for an ipinfo.io-style endpoint: `GET {endpoint}/{ip}/json`
/// returns one flat JSON object per address.
#[derive(Clone)]
pub struct LookupClient<C = HttpsConnector<HttpConnector>> {
    client: Client<C>,
    endpoint: Uri,
    token: Option<String>,
    timeout: Duration,
}

impl LookupClient {
    pub fn new(endpoint: Uri, token: Option<String>, timeout: Duration) -> Self {
        let https = HttpsConnector::new();
        let client = Client::builder().build::<_, Body>(https);
        Self {
            client,
            endpoint,
            token,
            timeout,
        }
    }

    pub fn default_endpoint() -> Uri {
        DEFAULT_ENDPOINT.clone()
    }

    /// hyper imposes no timeout of its own, so every request runs under
    /// this deadline.
    pub fn default_timeout() -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)
    }
}

impl<C> LookupClient<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    pub async fn lookup(&self, ip: NormalizedIp) -> Result<IpDetails, LookupError> {
        let uri = record_uri(&self.endpoint, ip)?;
        let body = tokio::time::timeout(self.timeout, self.fetch(uri.clone()))
            .await
            .map_err(|_| LookupError::TimedOut(uri, self.timeout))??;
        let mut details: IpDetails = serde_json::from_slice(&body)?;
        // The record's identity lives in NormalizedIp; keep the opaque
        // payload free of the endpoint's echo of it.
        details.extra.remove("ip");
        Ok(details)
    }

    async fn fetch(&self, mut uri: Uri) -> Result<Bytes, LookupError> {
        let mut attempt = 0;
        let response = loop {
            let mut builder = Request::builder()
                .uri(&uri)
                .header("Accept", "application/json");
            if let Some(token) = &self.token {
                builder = builder.header("Authorization", format!("Bearer {token}"));
            }
            let request = builder.body(Body::empty())?;
            let response = self.client.request(request).await?;
            let status = response.status();

            if status.is_success() {
                break response;
            } else if status.is_redirection() {
                uri = response
                    .headers()
                    .get("Location")
                    .ok_or(status)?
                    .as_bytes()
                    .try_into()
                    .map_err(|_| status)?;
            } else {
                return Err(status.into());
            }

            attempt += 1;
            if attempt == MAX_ATTEMPTS {
                return Err(status.into());
            }
        };
        Ok(hyper::body::to_bytes(response.into_body()).await?)
    }
}

fn record_uri(endpoint: &Uri, ip: NormalizedIp) -> Result<Uri, LookupError> {
    let path = format!("{}/{}/json", endpoint.path().trim_end_matches('/'), ip);
    let mut builder = Uri::builder().path_and_query(path);
    if let Some(scheme) = endpoint.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = endpoint.authority() {
        builder = builder.authority(authority.clone());
    }
    Ok(builder.build()?)
}
