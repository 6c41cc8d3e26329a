pub mod action_executor;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod fetcher;
pub mod history;
pub mod hotkey;
pub mod input_port;
pub mod kv_store;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod state;
