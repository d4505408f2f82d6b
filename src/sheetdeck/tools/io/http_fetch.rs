use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, instrument};

use crate::sheetdeck::tools::error::{Result, ToolError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("sheetdeck/", env!("CARGO_PKG_VERSION"));

/// Source of raw sheet bytes.
pub trait Fetcher {
    /// Downloads the document behind `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>>,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self(url)
    }
}

/// Fetches published sheets over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Network {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes()?;
        debug!(byte_count = bytes.len(), "downloaded sheet");
        Ok(bytes.to_vec())
    }
}
