//! Report postback construction and response parsing.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{Html, Selector};

use crate::context::FormFields;
use crate::Error;

pub const FROM_DATE_KEY: &str = "ctl00$ctl00$Main$AdminPageContent$drDateRange$txtFromDate";
pub const FROM_TIME_KEY: &str = "ctl00$ctl00$Main$AdminPageContent$drDateRange$txtFromTime";
pub const TO_DATE_KEY: &str = "ctl00$ctl00$Main$AdminPageContent$drDateRange$txtToDate";
pub const TO_TIME_KEY: &str = "ctl00$ctl00$Main$AdminPageContent$drDateRange$txtToTime";
pub const EVENT_TARGET_KEY: &str = "__EVENTTARGET";
pub const EVENT_ARGUMENT_KEY: &str = "__EVENTARGUMENT";

const EVENT_TARGET_PREFIX: &str = "ctl00$ctl00$Main$AdminPageContent$lb";
const REPORT_VIEWER_SELECTOR: &str = "div#report_viewer_wrapper";
const NO_TRANSACTIONS_MARKER: &str = "no transactions";
const EXPORT_FORMAT_SUFFIX: &str = "CSV";

/// The report link buttons on the sales reports page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReportType {
    #[default]
    Customisations,
    Purchasers,
    Sales,
}

impl ReportType {
    pub const ALL: [ReportType; 3] = [
        ReportType::Customisations,
        ReportType::Purchasers,
        ReportType::Sales,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Customisations => "Customisations",
            ReportType::Purchasers => "Purchasers",
            ReportType::Sales => "Sales",
        }
    }

    /// Value of `__EVENTTARGET` that triggers this report's link button.
    pub fn event_target(&self) -> String {
        format!("{}{}", EVENT_TARGET_PREFIX, self.as_str())
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ReportType::ALL
            .into_iter()
            .find(|rt| rt.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let valid: Vec<&str> = ReportType::ALL.iter().map(ReportType::as_str).collect();
                format!(
                    "unknown report type '{}'. Valid values: {}",
                    s,
                    valid.join(", ")
                )
            })
    }
}

/// Report selector and date window for one postback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportParams {
    pub report_type: ReportType,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

/// Overlays the date range and report selector onto the harvested fields.
pub fn postback_fields(fields: &FormFields, params: &ReportParams) -> FormFields {
    let mut data = fields.clone();
    data.set(FROM_DATE_KEY, &params.from.format("%d/%m/%Y").to_string());
    data.set(FROM_TIME_KEY, &params.from.format("%H:%M").to_string());
    data.set(TO_DATE_KEY, &params.to.format("%d/%m/%Y").to_string());
    data.set(TO_TIME_KEY, &params.to.format("%H:%M").to_string());
    data.set(EVENT_TARGET_KEY, &params.report_type.event_target());
    data.set(EVENT_ARGUMENT_KEY, "");
    data
}

/// Checks a postback response and returns the raw export URL base.
///
/// The viewer check runs first: a portal fault renders an empty wrapper
/// even when the body happens to mention transactions elsewhere.
pub fn parse_postback_response(body: &str) -> Result<String, Error> {
    if !report_viewer_rendered(body)? {
        return Err(Error::ReportRender);
    }
    if body.contains(NO_TRANSACTIONS_MARKER) {
        return Err(Error::NoData);
    }
    match extract_export_base(body)? {
        Some(base) if !base.is_empty() => Ok(base),
        _ => Err(Error::ExportUrlNotFound),
    }
}

fn report_viewer_rendered(body: &str) -> Result<bool, Error> {
    let viewer_sel = Selector::parse(REPORT_VIEWER_SELECTOR).map_err(|e| {
        Error::Parse(format!("selector {}: {:?}", REPORT_VIEWER_SELECTOR, e))
    })?;
    let html = Html::parse_document(body);
    let rendered = html
        .select(&viewer_sel)
        .next()
        .map(|div| !div.text().collect::<String>().trim().is_empty())
        .unwrap_or(false);
    Ok(rendered)
}

/// Finds the `ExportUrlBase` value in the viewer's inline script and undoes
/// the JSON escaping the portal applies to it.
pub fn extract_export_base(body: &str) -> Result<Option<String>, Error> {
    let re = Regex::new(r#"ExportUrlBase":"(.*?)""#)
        .map_err(|e| Error::Parse(format!("regex compile error: {}", e)))?;
    Ok(re.captures(body).and_then(|cap| cap.get(1)).map(|m| {
        m.as_str()
            .replace(r"\u0026", "&")
            .replace(r"\/", "/")
    }))
}

/// Joins the export host and URL base, appending the CSV format selector.
pub fn export_url(export_base_url: &str, url_base: &str) -> String {
    format!(
        "{}/{}{}",
        export_base_url.trim_end_matches('/'),
        url_base.trim_start_matches('/'),
        EXPORT_FORMAT_SUFFIX
    )
}
