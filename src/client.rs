use backoff::{backoff::Backoff, ExponentialBackoff};
use log::{debug, info};
use reqwest::{header, Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_derive::Deserialize;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

static USER_AGENT: &str = "dispatchbro";
static ACCEPT: &str = "application/vnd.github+json";
static API_VERSION: &str = "2022-11-28";

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    token: String,
    rate_limit_budget: Option<Duration>,
}

impl ApiClient {
    pub fn from_token<S: Into<String>>(token: S) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static(API_VERSION),
        );
        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            rate_limit_budget: None,
        })
    }

    /// Allows GET requests to back off for up to `budget` while being rate limited. Without
    /// a budget a 429 is returned to the caller straight away.
    pub fn with_rate_limit_budget(mut self, budget: Option<Duration>) -> Self {
        self.rate_limit_budget = budget.filter(|budget| !budget.is_zero());
        self
    }

    pub async fn get<O>(&self, endpoint: &str) -> Result<O>
    where
        O: DeserializeOwned + Debug,
    {
        let request = move || async move {
            let builder = self.client.get(endpoint);
            let response = self.submit(builder).await?;
            Ok::<O, Error>(response.json().await?)
        };
        match self.rate_limit_budget {
            Some(budget) => retry_request_if_needed(rate_limit_backoff(budget), request).await,
            None => request().await,
        }
    }

    /// Performs a POST request whose response carries no body. This is never retried.
    pub async fn post_no_content<I>(&self, endpoint: &str, body: &I) -> Result<()>
    where
        I: Serialize,
    {
        let builder = self.client.post(endpoint).json(body);
        self.submit(builder).await?;
        Ok(())
    }

    async fn submit(&self, builder: RequestBuilder) -> Result<Response> {
        let builder = builder.bearer_auth(&self.token);
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // Error bodies are best effort, the status code is what matters
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(e) => {
                debug!("Failed to decode error body: {}", e);
                String::new()
            }
        };
        Err(Error::Http { status, message })
    }
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("rate limited max attempts reached")]
    RateLimitRetries,

    #[error("request failed with status code {status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn unprocessable_entity(&self) -> bool {
        self.status() == Some(StatusCode::UNPROCESSABLE_ENTITY)
    }

    pub fn too_many_requests(&self) -> bool {
        self.status() == Some(StatusCode::TOO_MANY_REQUESTS)
    }
}

fn rate_limit_backoff(budget: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(budget),
        ..ExponentialBackoff::default()
    }
}

async fn retry_request_if_needed<F, R, O>(mut backoff: ExponentialBackoff, requestor: F) -> Result<O>
where
    F: Fn() -> R,
    R: Future<Output = Result<O>>,
    O: DeserializeOwned + Debug,
{
    loop {
        match requestor().await {
            Err(e) if e.too_many_requests() => {
                let delay = backoff.next_backoff();
                match delay {
                    Some(delay) => {
                        info!("Rate limit hit, sleeping for {}s", delay.as_secs());
                        sleep(delay).await
                    }
                    None => return Err(Error::RateLimitRetries),
                }
            }
            other => return other,
        }
    }
}
