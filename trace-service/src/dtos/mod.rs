pub mod oauth;
pub mod trace;

pub use oauth::{
    ApplicationCreateRequest, ApplicationResponse, AuthorizeQuery, TokenRequest, TokenResponse,
};
pub use trace::{TextTraceRequest, TraceResponse};
