use crate::app::ports::DocumentSource;
use crate::error::{EtlError, Result};
use tracing::{debug, info};

/// Fetches documents with a single blocking HTTP GET. No retries, no timeout.
pub struct ReqwestHttp {
    client: reqwest::blocking::Client,
}

impl ReqwestHttp {
    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|e| EtlError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl DocumentSource for ReqwestHttp {
    fn fetch(&self, url: &str) -> Result<String> {
        info!("📡 GET {}", url);
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EtlError::SourceUnavailable(format!(
                "GET {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }
        let body = resp.text()?;
        debug!("fetched {} bytes", body.len());
        Ok(body)
    }
}
