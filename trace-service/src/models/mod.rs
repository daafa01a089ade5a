mod application;
mod authorization_code;
mod directory;
mod preview;
mod principal;
mod token;

pub use application::Application;
pub use authorization_code::AuthorizationCode;
pub use directory::{Corpus, Document, UserRecord};
pub use preview::{truncate_chars, PreviewCapability, MAX_HIGHLIGHT_LEN};
pub use principal::Principal;
pub use token::OauthToken;
