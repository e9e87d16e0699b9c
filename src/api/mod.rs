//! Remote data access: the center API gateway and the release index.

mod center;
mod error;
pub mod http;
mod release;
pub mod types;

pub use center::{CenterApi, DEFAULT_BASE_URL};
pub use error::{ApiError, ApiStatus, extract_error_message};
pub use http::EnvelopeClient;
pub use release::{DEFAULT_RELEASE_API_URL, ReleaseClient};
