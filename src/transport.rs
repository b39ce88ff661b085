use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

/// The portal rejects requests that don't look like they come from a browser.
const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"),
    ("Accept-Language", "en-GB,en;q=0.9"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
    ("Upgrade-Insecure-Requests", "1"),
    ("sec-ch-ua", "\"Google Chrome\";v=\"117\", \"Not;A=Brand\";v=\"8\", \"Chromium\";v=\"117\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"macOS\""),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalResponse {
    pub status: u16,
    pub body: String,
}

impl PortalResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Per-request header tweaks on top of the browser header set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub ajax: bool,
    /// Overrides the client-wide request timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn document() -> Self {
        Self::default()
    }

    pub fn ajax(referer: String) -> Self {
        Self {
            referer: Some(referer),
            origin: None,
            ajax: true,
            timeout: None,
        }
    }

    pub fn form(referer: String, origin: String) -> Self {
        Self {
            referer: Some(referer),
            origin: Some(origin),
            ajax: false,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Everything the scrapers need from HTTP. Implementations own the cookie jar.
pub trait Transport {
    fn get(&self, url: &str, options: &RequestOptions) -> Result<PortalResponse>;
    fn post_form(&self, url: &str, fields: &[(String, String)], options: &RequestOptions) -> Result<PortalResponse>;
    /// Current value of a portal cookie, if set.
    fn cookie(&self, name: &str) -> Option<String>;
}

pub struct HttpTransport {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| PortalError::transport(&config.base_url, e))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PortalError::transport(&config.base_url, e))?;

        Ok(Self { client, jar, base_url })
    }

    fn decorate(builder: RequestBuilder, options: &RequestOptions) -> RequestBuilder {
        let mut builder = BROWSER_HEADERS
            .iter()
            .fold(builder, |b, (name, value)| b.header(*name, *value));
        if let Some(referer) = &options.referer {
            builder = builder.header("Referer", referer.as_str());
        }
        if let Some(origin) = &options.origin {
            builder = builder.header("Origin", origin.as_str());
        }
        if options.ajax {
            builder = builder.header("X-Requested-With", "XMLHttpRequest");
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    fn send(url: &str, builder: RequestBuilder) -> Result<PortalResponse> {
        let response = builder.send().map_err(|e| PortalError::transport(url, e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| PortalError::transport(url, e))?;
        debug!(url, status, bytes = body.len(), "portal response");
        Ok(PortalResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, options: &RequestOptions) -> Result<PortalResponse> {
        Self::send(url, Self::decorate(self.client.get(url), options))
    }

    fn post_form(&self, url: &str, fields: &[(String, String)], options: &RequestOptions) -> Result<PortalResponse> {
        Self::send(url, Self::decorate(self.client.post(url).form(fields), options))
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        cookie_value(header, name)
    }
}

/// Pick one cookie out of a `Cookie:` header value.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
