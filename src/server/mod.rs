mod api;
pub mod dto;
mod git;
pub mod response;
mod router;
pub mod validation;

pub use api::api_router;
pub use git::{AccessError, check_access, git_router};
pub use router::{AppState, create_router};
