pub mod config;
pub mod error;
pub mod headers;
pub mod models;
pub mod relay;
pub mod server;
pub mod translate;
pub mod upstream;
pub mod user_agent;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use server::{build_router, AppState};
pub use user_agent::{UserAgentPool, UserAgentSource};
