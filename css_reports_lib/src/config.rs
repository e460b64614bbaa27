//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use guild_portal::{PortalSettings, ReportType, DEFAULT_AUTH_COOKIE};

pub const DEFAULT_HEADER_LINES: usize = 4;

/// Number of leading rows kept verbatim for each report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLines {
    pub customisations: usize,
    pub purchasers: usize,
    pub sales: usize,
}

impl Default for HeaderLines {
    fn default() -> Self {
        Self {
            customisations: DEFAULT_HEADER_LINES,
            purchasers: DEFAULT_HEADER_LINES,
            sales: DEFAULT_HEADER_LINES,
        }
    }
}

impl HeaderLines {
    pub fn for_report(&self, report_type: ReportType) -> usize {
        match report_type {
            ReportType::Customisations => self.customisations,
            ReportType::Purchasers => self.purchasers,
            ReportType::Sales => self.sales,
        }
    }
}

/// Settings for the report service.
#[derive(Debug, Clone)]
pub struct ReportsConfig {
    pub portal: PortalSettings,
    /// Directory temporary report files are created in.
    pub temp_dir: PathBuf,
    pub header_lines: HeaderLines,
    /// Address the HTTP endpoint listens on.
    pub bind: String,
    /// Where `/` and unknown routes redirect to.
    pub homepage: String,
    /// Token refresher period; `None` disables it.
    pub refresh_interval: Option<Duration>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            portal: PortalSettings::default(),
            temp_dir: std::env::temp_dir(),
            header_lines: HeaderLines::default(),
            bind: "0.0.0.0:8000".to_string(),
            homepage: "https://cssbham.com".to_string(),
            refresh_interval: Some(Duration::from_secs(1200)),
        }
    }
}

impl ReportsConfig {
    /// Reads `CSS_REPORTS_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source. Unset or
    /// unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };
        let count = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(default)
        };

        let portal = PortalSettings {
            portal_url: string("CSS_REPORTS_PORTAL_URL", defaults.portal.portal_url),
            export_url: string("CSS_REPORTS_EXPORT_URL", defaults.portal.export_url),
            auth_cookie: string("CSS_REPORTS_AUTH_COOKIE", DEFAULT_AUTH_COOKIE.to_string()),
            timeout: Duration::from_secs(number(
                "CSS_REPORTS_TIMEOUT_SECS",
                defaults.portal.timeout.as_secs(),
            )),
        };
        let header_lines = HeaderLines {
            customisations: count(
                "CSS_REPORTS_HEADER_LINES_CUSTOMISATIONS",
                defaults.header_lines.customisations,
            ),
            purchasers: count(
                "CSS_REPORTS_HEADER_LINES_PURCHASERS",
                defaults.header_lines.purchasers,
            ),
            sales: count("CSS_REPORTS_HEADER_LINES_SALES", defaults.header_lines.sales),
        };
        let refresh_secs = number("CSS_REPORTS_REFRESH_SECS", 1200);

        Self {
            portal,
            temp_dir: lookup("CSS_REPORTS_TEMP_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            header_lines,
            bind: string("CSS_REPORTS_BIND", defaults.bind),
            homepage: string("CSS_REPORTS_HOMEPAGE", defaults.homepage),
            refresh_interval: (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
        }
    }
}
