pub mod cache;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod fs_util;
pub mod metrics;
pub mod output;
pub mod remote;
pub mod schema;
pub mod session;
pub mod store;
pub mod table;
pub mod tui;
