//! Request types, the error taxonomy, and the checks run before delegation.

pub mod error;
pub mod list;
pub mod request;
pub mod validation;

pub use error::{ApiResult, ErrorKind, RunApiError};
pub use list::{validate_filter, validated_list_options, RUN_SORTABLE_FIELDS};
pub use request::*;
pub use validation::{validate_run_metric, MetricValidationError, RequestValidator};
