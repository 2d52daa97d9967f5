//! Read-only lookups feeding the providers: static page metadata and prior incident
//! reports from the external store.

pub mod errors;
pub mod incidents;
pub mod page;
pub mod rest;

pub use errors::{extract_keywords, normalize_incident_route, ErrorContextService, RouteStats};
pub use incidents::{IncidentReport, IncidentStore, InMemoryIncidentStore, NullIncidentStore};
pub use page::{
    normalize_route, render_compact, render_verbose, PageLookup, PageLookupService, PageMatch,
};
pub use rest::RestIncidentStore;
