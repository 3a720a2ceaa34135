pub mod error;
pub mod names;
pub mod types;

pub use error::{ForgeError, Result};
pub use types::{Artifact, ItemStatus, Utility, WorkItemResult};
