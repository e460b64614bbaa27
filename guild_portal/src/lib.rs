//! Client for the Guild of Students MSL admin portal's sales reports pages.
//!
//! Covers the three wire steps of a report download: harvesting the
//! WebForms postback state, submitting the report postback, and opening
//! the CSV export it links to.

mod client;
pub mod context;
mod errors;
pub mod report;
pub use self::client::{PortalClient, PortalSettings};
pub use self::context::{CookieJar, FormFields, SessionContext, DEFAULT_AUTH_COOKIE};
pub use self::errors::Error;
pub use self::report::{ReportParams, ReportType};
