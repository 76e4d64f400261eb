//! # Slade Core
//!
//! Server-to-server client library for Slade 360 APIs.
//!
//! This crate provides:
//! - Credential configuration from the environment or a TOML file
//! - OAuth2 password-grant authentication with proactive token refresh
//! - Authenticated JSON request dispatch and typed request helpers
//! - Pagination, URL and token introspection helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slade_core::{Authenticator, ServerClient};
//!
//! # async fn example() -> Result<(), slade_core::ClientError> {
//! let client = ServerClient::from_env().await?;
//! let profile = slade_core::fetch_user_profile(&client).await?;
//! println!("logged in as {}", profile.email);
//! assert!(client.access_token().is_some());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod debug;
pub mod error;
pub mod exchange;
pub mod introspect;
pub mod pagination;
pub mod requests;
pub mod secret;
pub mod token;
pub mod urls;
pub mod validate;

// Re-export commonly used types at crate root
pub use client::{
    Authenticator,
    RequestDispatcher,
    ServerClient,
    check_initialization,
    get_access_token,
};

pub use config::{
    ClientConfig,
    ConfigError,
    bool_env,
    get_env_var,
    is_debug,
};

pub use error::{
    ClientError,
    ClientResult,
};

pub use introspect::{
    validate_access_token,
    validate_access_token_from_env,
};

pub use pagination::{
    PaginationError,
    PaginationInput,
    api_pagination_params,
};

pub use requests::{
    UserProfile,
    fetch_user_profile,
    perform_request,
    read_request_to_target,
};

pub use secret::Secret;

pub use token::{
    OAuthResponse,
    TokenState,
};

pub use urls::{
    QueryValues,
    compose_api_url,
    me_url,
    merge_url_values,
};

pub use validate::{
    PostconditionError,
    PreconditionError,
    check_postconditions,
    check_preconditions,
};
