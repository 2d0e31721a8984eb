pub mod api;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod session;
pub mod sweeper;

pub use self::{config::Config, session::Session};
