//! Service layer shared by the operator surfaces.

mod dashboard;

pub use dashboard::{DashboardService, ListFilter};
