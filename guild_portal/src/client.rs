//! HTTP client for the Guild of Students MSL admin portal.

use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, COOKIE, EXPIRES, PRAGMA};
use reqwest::{RequestBuilder, Response, StatusCode};
use url::Url;

use crate::context::{parse_context_page, CookieJar, SessionContext, DEFAULT_AUTH_COOKIE};
use crate::report::{export_url, parse_postback_response, postback_fields, ReportParams};
use crate::Error;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Connection settings for [`PortalClient`].
#[derive(Debug, Clone)]
pub struct PortalSettings {
    /// Origin serving the sales reports pages and postbacks.
    pub portal_url: String,
    /// Origin the export URL base is resolved against.
    pub export_url: String,
    /// Name of the forms-authentication cookie.
    pub auth_cookie: String,
    /// Overall timeout applied to every request.
    pub timeout: Duration,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            portal_url: "https://www.guildofstudents.com".to_string(),
            export_url: "https://guildofstudents.com".to_string(),
            auth_cookie: DEFAULT_AUTH_COOKIE.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// HTTP client for the portal's sales reports workflow.
///
/// Holds no cookie store: every session's cookies travel explicitly in a
/// [`CookieJar`] so concurrent report requests never share state.
pub struct PortalClient {
    http: reqwest::Client,
    portal_url: String,
    export_url: String,
    auth_cookie: String,
}

impl PortalClient {
    /// Creates a client pointing at the production portal.
    pub fn new() -> Result<Self, Error> {
        Self::from_settings(PortalSettings::default())
    }

    /// Creates a client serving pages and exports from one origin. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        Self::from_settings(PortalSettings {
            portal_url: base_url.to_string(),
            export_url: base_url.to_string(),
            ..PortalSettings::default()
        })
    }

    pub fn from_settings(settings: PortalSettings) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            portal_url: settings.portal_url.trim_end_matches('/').to_string(),
            export_url: settings.export_url.trim_end_matches('/').to_string(),
            auth_cookie: settings.auth_cookie,
        })
    }

    pub fn auth_cookie_name(&self) -> &str {
        &self.auth_cookie
    }

    /// URL of an organisation's sales reports page, used for both the GET and the postback.
    pub fn sales_reports_url(&self, org_id: &str) -> Result<String, Error> {
        let raw = format!("{}/organisation/salesreports/{}/", self.portal_url, org_id);
        let url = Url::parse(&raw).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::InvalidUrl(raw.clone())
        })?;
        Ok(url.to_string())
    }

    fn no_cache(&self, req: RequestBuilder, cookies: &CookieJar) -> RequestBuilder {
        req.header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .header(COOKIE, cookies.header_value())
    }

    /// Fetches the reports page with the caller's token and harvests its
    /// postback fields and session cookies.
    pub async fn build_context(&self, url: &str, token: &str) -> Result<SessionContext, Error> {
        let seed = CookieJar::with_auth(&self.auth_cookie, token);
        let resp = self.no_cache(self.http.get(url), &seed).send().await?;

        let status = resp.status();
        let issued = issued_cookies(&resp);
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let fields = parse_context_page(&body)?;
        let issued_auth = issued
            .iter()
            .find(|(name, _)| *name == self.auth_cookie)
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty());

        let mut cookies = CookieJar::new();
        cookies.absorb(
            issued.iter().map(|(n, v)| (n.as_str(), v.as_str())),
            &self.auth_cookie,
            token,
        );

        tracing::info!(
            fields = fields.len(),
            cookies = cookies.len(),
            "Retrieved report context"
        );
        Ok(SessionContext {
            fields,
            cookies,
            issued_auth,
        })
    }

    /// Posts the report request and resolves the CSV export URL.
    ///
    /// Returns the export URL together with the jar, updated with any
    /// cookies the postback response set.
    pub async fn submit_report(
        &self,
        url: &str,
        context: &SessionContext,
        params: &ReportParams,
    ) -> Result<(String, CookieJar), Error> {
        let token = context
            .cookies
            .get(&self.auth_cookie)
            .unwrap_or_default()
            .to_string();
        let data = postback_fields(&context.fields, params);
        let resp = self
            .no_cache(self.http.post(url), &context.cookies)
            .form(data.pairs())
            .send()
            .await?;

        let status = resp.status();
        let issued = issued_cookies(&resp);
        let body = resp.text().await?;
        if status != StatusCode::OK {
            tracing::error!(status = status.as_u16(), "Report postback rejected");
            return Err(status_error(status, &body));
        }

        let url_base = parse_postback_response(&body).map_err(|e| {
            tracing::warn!(report_type = %params.report_type, "{}", e);
            e
        })?;

        let mut cookies = context.cookies.clone();
        cookies.absorb(
            issued.iter().map(|(n, v)| (n.as_str(), v.as_str())),
            &self.auth_cookie,
            &token,
        );
        Ok((export_url(&self.export_url, &url_base), cookies))
    }

    /// Opens the export download. The body is left unread for the caller to stream.
    pub async fn open_export(&self, url: &str, cookies: &CookieJar) -> Result<Response, Error> {
        let url = Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        let resp = self.no_cache(self.http.get(url), cookies).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Report export download failed");
            return Err(status_error(status, &body));
        }
        Ok(resp)
    }
}

fn issued_cookies(resp: &Response) -> Vec<(String, String)> {
    resp.cookies()
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect()
}

fn status_error(status: StatusCode, body: &str) -> Error {
    Error::HttpStatus {
        status: status.as_u16(),
        body: truncate_body(body),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}
