//! Library layer for CSS reports: validation, the report pipeline, CSV
//! filtering, temporary artifacts and the persisted token store.
//!
//! Wraps the `guild_portal` crate, which speaks the portal's postback
//! protocol, and turns its export download into a filtered report file.

pub mod artifact;
pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod refresh;
pub mod token_store;
pub mod validation;

pub use guild_portal;
pub use guild_portal::{ReportParams, ReportType};

pub use artifact::{ArtifactStream, ReportArtifact};
pub use config::{HeaderLines, ReportsConfig};
pub use error::{ErrorKind, FailureState, ReportError};
pub use filter::{FilterStats, RowFilter};
pub use pipeline::{ReportPipeline, Stage};
pub use refresh::{RefreshSummary, TokenRefresher};
pub use token_store::{TokenPair, TokenStore};
pub use validation::{validate_report_query, RawReportQuery, ReportRequest};
