pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod routing;
pub mod session;

pub use api::ApiClient;
pub use config::{ClientConfig, TokenMode};
pub use error::{ClientError, ClientResult};
pub use routing::{Location, MemoryNavigator, Navigator, RouteContext};
pub use session::{Session, SessionStore};
