//! End-to-end report retrieval: session context, postback, export download
//! and filtering into a temporary artifact.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use futures::TryStreamExt;
use guild_portal::PortalClient;
use tokio_util::io::StreamReader;

use crate::artifact::ReportArtifact;
use crate::config::{HeaderLines, ReportsConfig};
use crate::error::ReportError;
use crate::filter::RowFilter;
use crate::validation::ReportRequest;

/// Steps a report request moves through, in order.
///
/// Failures end in the [`FailureState`](crate::FailureState) given by the
/// error's kind. Success has a single terminal state: `run` returning the
/// artifact, which the caller then delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Context,
    Submit,
    Download,
    Filter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Context => "context",
            Self::Submit => "submit",
            Self::Download => "download",
            Self::Filter => "filter",
        };
        f.write_str(name)
    }
}

/// Runs report requests against the portal.
///
/// Requests share nothing but the HTTP connection pool, so one pipeline
/// can serve any number of concurrent requests.
pub struct ReportPipeline {
    portal: PortalClient,
    temp_dir: PathBuf,
    header_lines: HeaderLines,
}

impl ReportPipeline {
    pub fn new(config: &ReportsConfig) -> Result<Self, ReportError> {
        let portal = PortalClient::from_settings(config.portal.clone())?;
        Ok(Self::from_parts(
            portal,
            config.temp_dir.clone(),
            config.header_lines,
        ))
    }

    pub fn from_parts(portal: PortalClient, temp_dir: PathBuf, header_lines: HeaderLines) -> Self {
        Self {
            portal,
            temp_dir,
            header_lines,
        }
    }

    pub fn portal(&self) -> &PortalClient {
        &self.portal
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Fetches, downloads and filters one report.
    ///
    /// On success the returned artifact holds only the header rows and
    /// the rows matching the request's product key, and handing it over
    /// with `deliver` or `into_stream` completes the request. On failure no
    /// file is left behind.
    pub async fn run(&self, request: &ReportRequest) -> Result<ReportArtifact, ReportError> {
        let report_type = request.params.report_type;
        let url = self.portal.sales_reports_url(&request.org_id)?;

        enter(Stage::Context, &request.org_id);
        let context = self
            .portal
            .build_context(&url, &request.session_token)
            .await
            .map_err(|e| failed(Stage::Context, &request.org_id, e))?;

        enter(Stage::Submit, &request.org_id);
        let (export_url, cookies) = self
            .portal
            .submit_report(&url, &context, &request.params)
            .await
            .map_err(|e| failed(Stage::Submit, &request.org_id, e))?;
        tracing::debug!(org = %request.org_id, %report_type, "Export URL resolved");

        enter(Stage::Download, &request.org_id);
        let response = self
            .portal
            .open_export(&export_url, &cookies)
            .await
            .map_err(|e| failed(Stage::Download, &request.org_id, e))?;

        let reader = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
        let filter = RowFilter::new(
            self.header_lines.for_report(report_type),
            request.product_key.as_str(),
        );
        enter(Stage::Filter, &request.org_id);
        tracing::debug!(
            org = %request.org_id,
            header_lines = filter.header_lines(),
            product = filter.key(),
            "Filtering export"
        );
        let artifact = ReportArtifact::create(&self.temp_dir, reader, &filter)
            .await
            .map_err(|e| {
                tracing::error!(
                    org = %request.org_id,
                    stage = %Stage::Filter,
                    "Report download interrupted: {}",
                    e
                );
                stream_error(e)
            })?;

        let stats = artifact.stats();
        tracing::info!(
            org = %request.org_id,
            %report_type,
            kept = stats.kept,
            dropped = stats.dropped,
            "Report ready"
        );
        Ok(artifact)
    }
}

fn enter(stage: Stage, org: &str) {
    tracing::debug!(org = %org, stage = %stage, "Report stage started");
}

fn failed(stage: Stage, org: &str, e: guild_portal::Error) -> ReportError {
    tracing::warn!(org = %org, stage = %stage, "Report request failed: {}", e);
    ReportError::Portal(e)
}

/// A failure reading the export body is a transport problem; anything
/// else came from local storage.
fn stream_error(e: io::Error) -> ReportError {
    let is_http = e
        .get_ref()
        .is_some_and(|inner| inner.is::<reqwest::Error>());
    if !is_http {
        return ReportError::Storage(e);
    }
    match e.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(http)) => ReportError::Portal(guild_portal::Error::Network(*http)),
        _ => ReportError::Storage(io::Error::other("export stream failed")),
    }
}
