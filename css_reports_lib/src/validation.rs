use chrono::{NaiveDate, NaiveDateTime};
use guild_portal::{ReportParams, ReportType};
use regex::Regex;
use serde::Deserialize;

use crate::error::ReportError;

pub const MAX_PRODUCT_LENGTH: usize = 100;
pub const MAX_ORG_ID_LENGTH: usize = 32;
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_START_DATE: &str = "2000-01-01";
pub const DEFAULT_END_DATE: &str = "2100-01-01";

/// Report request exactly as it arrives from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReportQuery {
    pub auth_cookie: Option<String>,
    pub organisation_id: Option<String>,
    pub product_name: Option<String>,
    pub product_names: Option<String>,
    pub report_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub persist: Option<String>,
}

/// A validated report request, ready for the pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub org_id: String,
    pub session_token: String,
    pub product_key: String,
    pub params: ReportParams,
    pub persist: bool,
}

impl std::fmt::Debug for ReportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportRequest")
            .field("org_id", &self.org_id)
            .field("product_key", &self.product_key)
            .field("params", &self.params)
            .field("persist", &self.persist)
            .finish_non_exhaustive()
    }
}

fn required<'a>(value: Option<&'a str>) -> Option<&'a str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate the whole query: required credentials, exactly one product
/// parameter, dates, report type and persistence flag.
pub fn validate_report_query(raw: &RawReportQuery) -> Result<ReportRequest, ReportError> {
    let (token, org) = match (
        required(raw.auth_cookie.as_deref()),
        required(raw.organisation_id.as_deref()),
    ) {
        (Some(token), Some(org)) => (token, org),
        _ => {
            return Err(ReportError::InvalidInput(
                "An auth token and organisation id are required.".to_string(),
            ))
        }
    };

    let product = match (
        required(raw.product_name.as_deref()),
        required(raw.product_names.as_deref()),
    ) {
        (Some(_), Some(_)) => {
            return Err(ReportError::InvalidInput(
                "Both product_name and product_names cannot be provided.".to_string(),
            ))
        }
        (Some(p), None) | (None, Some(p)) => p,
        (None, None) => {
            return Err(ReportError::InvalidInput(
                "Either product_name or product_names is required.".to_string(),
            ))
        }
    };

    let report_type = match raw.report_type.as_deref() {
        Some(rt) if !rt.trim().is_empty() => validate_report_type(rt)?,
        _ => ReportType::default(),
    };
    let from = validate_date(raw.start_date.as_deref(), DEFAULT_START_DATE)?;
    let to = validate_date(raw.end_date.as_deref(), DEFAULT_END_DATE)?;
    if from > to {
        return Err(ReportError::InvalidInput(format!(
            "start_date {} is after end_date {}",
            from.date(),
            to.date()
        )));
    }

    Ok(ReportRequest {
        org_id: validate_org_id(org)?,
        session_token: token.to_string(),
        product_key: sanitize_product_key(product)?,
        params: ReportParams {
            report_type,
            from,
            to,
        },
        persist: parse_flag(raw.persist.as_deref())?,
    })
}

/// Validate an organisation id: it becomes a URL path segment, so only
/// ASCII alphanumerics, `-` and `_` are accepted.
pub fn validate_org_id(input: &str) -> Result<String, ReportError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_ORG_ID_LENGTH {
        return Err(ReportError::InvalidInput(format!(
            "organisation id must be 1-{} characters",
            MAX_ORG_ID_LENGTH
        )));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ReportError::InvalidInput(format!(
            "invalid organisation id '{}'",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a date string in YYYY-MM-DD format, using `default` when absent.
/// The result is midnight at the start of that day.
pub fn validate_date(input: Option<&str>, default: &str) -> Result<NaiveDateTime, ReportError> {
    let raw = match input.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => default,
    };
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| {
            ReportError::InvalidInput("Invalid date format. Use YYYY-MM-DD.".to_string())
        })
}

pub fn validate_report_type(input: &str) -> Result<ReportType, ReportError> {
    input.parse::<ReportType>().map_err(ReportError::InvalidInput)
}

/// Parse an optional boolean query flag. Absent means false.
pub fn parse_flag(input: Option<&str>) -> Result<bool, ReportError> {
    match input.map(|s| s.trim().to_lowercase()) {
        None => Ok(false),
        Some(s) => match s.as_str() {
            "" | "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            _ => Err(ReportError::InvalidInput(format!(
                "invalid boolean flag '{}'",
                s
            ))),
        },
    }
}

/// Enforce the length limit, remove every non-word character that is
/// directly followed by whitespace (together with that whitespace), then
/// strip the remaining ASCII control characters.
pub fn sanitize_product_key(input: &str) -> Result<String, ReportError> {
    if input.len() > MAX_PRODUCT_LENGTH {
        return Err(ReportError::InvalidInput(format!(
            "product exceeds maximum length of {} bytes",
            MAX_PRODUCT_LENGTH
        )));
    }
    let re = Regex::new(r"\W\s")
        .map_err(|e| ReportError::InvalidInput(format!("regex compile error: {}", e)))?;
    let key: String = re
        .replace_all(input, "")
        .chars()
        .filter(|c| !c.is_ascii_control())
        .collect();
    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(ReportError::InvalidInput(
            "product is empty after sanitization".to_string(),
        ));
    }
    Ok(key)
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
