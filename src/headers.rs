//! Upstream header composition.
//!
//! The upstream only serves requests that look like they come from its own web
//! playground, so every call carries the page's `Origin`/`Referer`, the
//! `X-Deepinfra-Source` marker and a Chromium client-hint fingerprint that agrees
//! with the chosen User-Agent.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER,
    USER_AGENT,
};

pub const UPSTREAM_ORIGIN: &str = "https://deepinfra.com";
pub const UPSTREAM_REFERER: &str = "https://deepinfra.com/";
pub const SOURCE_HEADER: &str = "x-deepinfra-source";
const SOURCE_VALUE: &str = "web-page";
const ACCEPT_LANGUAGE_VALUE: &str = "en-GB,en-US;q=0.9,en;q=0.8";
const SEC_CH_UA: &str = r#""Chromium";v="122", "Not(A:Brand";v="24", "Google Chrome";v="122""#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Windows,
}

impl Platform {
    /// Value for `sec-ch-ua-platform` (quoted, as browsers send it).
    pub fn client_hint(self) -> &'static str {
        match self {
            Self::Android => "\"Android\"",
            Self::Windows => "\"Windows\"",
        }
    }
}

/// Browser identity derived from a User-Agent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoofedIdentity {
    pub user_agent: String,
    pub is_mobile: bool,
    pub platform: Platform,
}

impl SpoofedIdentity {
    pub fn from_user_agent(user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        let is_mobile = user_agent.contains("Mobile");
        let platform = if user_agent.contains("Android") {
            Platform::Android
        } else {
            Platform::Windows
        };
        Self {
            user_agent,
            is_mobile,
            platform,
        }
    }
}

/// Build the full upstream header set for one request.
///
/// Returns `None` only if the User-Agent contains bytes that are not legal in a
/// header value.
pub fn compose(user_agent: &str) -> Option<HeaderMap> {
    let identity = SpoofedIdentity::from_user_agent(user_agent);
    let mut headers = HeaderMap::new();

    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ORIGIN, HeaderValue::from_static(UPSTREAM_ORIGIN));
    headers.insert(REFERER, HeaderValue::from_static(UPSTREAM_REFERER));
    headers.insert(USER_AGENT, HeaderValue::from_str(&identity.user_agent).ok()?);
    headers.insert(
        HeaderName::from_static(SOURCE_HEADER),
        HeaderValue::from_static(SOURCE_VALUE),
    );

    headers.insert(
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static(SEC_CH_UA),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-mobile"),
        HeaderValue::from_static(if identity.is_mobile { "?1" } else { "?0" }),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-platform"),
        HeaderValue::from_static(identity.platform.client_hint()),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-site"),
    );

    Some(headers)
}
