// Library exports for the binary and integration tests

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod controller;
pub mod download;
pub mod error;
pub mod history;
pub mod i18n;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod quota;
pub mod render;
pub mod storage;
pub mod user;
pub mod validation;
