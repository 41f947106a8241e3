pub mod api;
pub mod command;
pub mod config;
pub mod convert;
pub mod fetch;
pub mod handlers;
pub mod humanize;
pub mod imaging;
pub mod observability;
pub mod storage;
