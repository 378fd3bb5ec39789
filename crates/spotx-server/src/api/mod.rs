pub mod error;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::{dispatch, ApiRequest, ApiResponse, ADMIN_TOKEN_HEADER};
pub use server::ApiServer;
