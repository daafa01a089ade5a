pub mod applications;
pub mod health;
pub mod oauth;
pub mod preview;
pub mod trace;
