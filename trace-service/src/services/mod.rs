pub mod backends;
pub mod cache;
pub mod directory;
pub mod oauth;
pub mod preview;
pub mod search;
pub mod store;
