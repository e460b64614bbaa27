//! The `fetch` subcommand: runs one report request and writes the filtered CSV.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use css_reports_lib::{validate_report_query, RawReportQuery, ReportPipeline, ReportsConfig};

/// Arguments for the `fetch` subcommand.
///
/// Values go through the same validation as the HTTP endpoint's query string.
#[derive(Args)]
pub struct FetchArgs {
    /// Value of the portal's auth cookie for an admin session
    #[arg(long)]
    pub auth_cookie: String,

    /// Organisation id from the portal's sales reports URL
    #[arg(long)]
    pub org: String,

    /// Product name to keep rows for
    #[arg(long)]
    pub product: String,

    /// Report type: customisations, purchasers, sales
    #[arg(long)]
    pub report_type: Option<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Write the report here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl FetchArgs {
    fn query(&self) -> RawReportQuery {
        RawReportQuery {
            auth_cookie: Some(self.auth_cookie.clone()),
            organisation_id: Some(self.org.clone()),
            product_name: Some(self.product.clone()),
            report_type: self.report_type.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            ..RawReportQuery::default()
        }
    }
}

pub async fn run(args: &FetchArgs, config: &ReportsConfig) -> Result<()> {
    let request = validate_report_query(&args.query())?;
    let pipeline = ReportPipeline::new(config)?;
    let artifact = pipeline.run(&request).await?;

    let written = match &args.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path).await?;
            let written = artifact.deliver(&mut file).await?;
            tracing::info!("Wrote {} bytes to {}", written, path.display());
            written
        }
        None => artifact.deliver(&mut tokio::io::stdout()).await?,
    };
    tracing::debug!(bytes = written, "Report delivered");
    Ok(())
}
