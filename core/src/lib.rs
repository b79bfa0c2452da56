//! Authenticated API client and session lifecycle for the bizdesk backend.
//!
//! # Overview
//! Every screen of the application talks to the backend through one
//! `ApiClient`. The client decorates each request with the current bearer
//! token and interprets each response centrally: a rejected session is
//! cleared and the shell is told to return to the login screen.
//!
//! # Design
//! - `config` resolves the API root once per process from the environment.
//! - `storage` persists the token and user record across restarts.
//! - `session::SessionStore` is the single authority for who is logged in;
//!   it is injected into the client rather than read from global state.
//! - `navigation::Navigator` is the seam through which the client asks the
//!   shell to remount at the login route.
//! - `http::Transport` performs the actual round-trip, so the client can be
//!   tested against a fake without a network.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod navigation;
pub mod session;
pub mod storage;
pub mod types;

pub use client::ApiClient;
pub use config::{resolve_api_base, ApiBase, ClientSettings};
pub use error::{ApiError, LoginError, LOGIN_FALLBACK_MESSAGE};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use navigation::{EventNavigator, Navigator, SessionEvent, LOGIN_ROUTE};
pub use session::{Session, SessionState, SessionStore, User};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use types::{HealthStatus, LoginRequest, LoginResponse, MessageResponse};
