pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::{RouterSettings, api_router};
pub use state::{AppState, Toolbox};
