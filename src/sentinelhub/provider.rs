use super::auth::{Authenticator, Credentials};
use crate::error::Result;
use crate::provider::{save_response, staging_path, Artifact, ImageryProvider};
use crate::request_template::ImageryRequest;
use reqwest::header::ACCEPT;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://services.sentinel-hub.com";
const TOKEN_PATH: &str = "auth/realms/main/protocol/openid-connect/token";
const PROCESS_PATH: &str = "api/v1/process";

#[derive(Debug, Clone)]
pub struct SentinelHubConfig {
    pub base_url: Url,
    pub token_url: Url,
    pub timeout: Duration,
}

impl SentinelHubConfig {
    /// Token URL defaults to the one served next to the API.
    pub fn new(base_url: &str, token_url: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let token_url = match token_url {
            Some(url) => Url::parse(url)?,
            None => base_url.join(TOKEN_PATH)?,
        };
        Ok(Self {
            base_url,
            token_url,
            timeout: Duration::from_secs(120),
        })
    }

    pub fn process_url(self: &Self) -> Result<Url> {
        Ok(self.base_url.join(PROCESS_PATH)?)
    }
}

impl Default for SentinelHubConfig {
    fn default() -> Self {
        let base_url = Url::parse(DEFAULT_BASE_URL).expect("Default base URL should always parse");
        let token_url = base_url
            .join(TOKEN_PATH)
            .expect("Default token URL should always parse");
        Self {
            base_url,
            token_url,
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct Provider {
    client: reqwest::Client,
    config: SentinelHubConfig,
    auth: Authenticator,
}

impl Provider {
    pub fn new(config: SentinelHubConfig, credentials: Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let auth = Authenticator::new(config.token_url.clone(), credentials);
        Ok(Self {
            client,
            config,
            auth,
        })
    }

    pub fn from_env(config: SentinelHubConfig) -> Result<Self> {
        Self::new(config, Credentials::from_env()?)
    }
}

impl ImageryProvider for Provider {
    fn name(self: &Self) -> &str {
        "sentinel-hub"
    }

    async fn submit(self: &Self, request: &ImageryRequest, data_folder: &Path) -> Result<Artifact> {
        let token = self.auth.token(&self.client).await?;
        let url = self.config.process_url()?;
        debug!(%url, bbox = ?request.bbox.as_array(), "Submitting process request");

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(ACCEPT, request.mime_type.as_str())
            .json(&request.process_body())
            .send()
            .await?;

        save_response(response, &staging_path(data_folder, request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let config = SentinelHubConfig::default();
        assert_eq!(
            config.process_url().unwrap().as_str(),
            "https://services.sentinel-hub.com/api/v1/process"
        );
        assert_eq!(
            config.token_url.as_str(),
            "https://services.sentinel-hub.com/auth/realms/main/protocol/openid-connect/token"
        );
    }

    #[test]
    fn test_custom_endpoint() {
        let token_url = "https://identity.dataspace.copernicus.eu\
                         /auth/realms/CDSE/protocol/openid-connect/token";
        let config =
            SentinelHubConfig::new("https://sh.dataspace.copernicus.eu", Some(token_url)).unwrap();
        assert_eq!(
            config.process_url().unwrap().as_str(),
            "https://sh.dataspace.copernicus.eu/api/v1/process"
        );
        assert!(config.token_url.as_str().contains("CDSE"));
    }

    #[test]
    fn test_provider_from_credentials() {
        let credentials = Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            instance_id: None,
        };
        let provider = Provider::new(SentinelHubConfig::default(), credentials).unwrap();
        assert_eq!(provider.name(), "sentinel-hub");
    }

    #[test]
    fn test_bad_endpoint() {
        assert!(SentinelHubConfig::new("not a url", None).is_err());
    }
}
