//! Client for a REST-style social graph API.
//!
//! [`GraphClient`] issues authenticated requests (fetch, multi-fetch,
//! connections, posts, comments, likes, deletes, search) and decodes the
//! responses into [`GraphObject`]s. [`FixtureManager`] tracks objects that a
//! test scenario creates so they are deleted when the scenario ends.

pub mod api_client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fixtures;
pub mod object;
pub mod retry;

pub use api_client::GraphClient;
pub use config::Config;
pub use credentials::{load_access_token, AccessToken, CredentialsError, TestingData};
pub use error::{ErrorContext, ErrorKind, GraphError, Operation};
pub use fixtures::{with_fixtures, CleanupFailure, CleanupReport, FixtureManager};
pub use object::{Attachment, Connection, GraphObject, ObjectBatch, Paging};
pub use retry::RetryPolicy;
