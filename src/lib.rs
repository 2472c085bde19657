pub mod api;
pub mod config;
pub mod http;
pub mod storage;
pub mod store;
pub mod view;

pub use self::{config::Config, store::Store};
