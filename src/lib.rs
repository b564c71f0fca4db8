pub mod app;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod location;
pub mod logging;
pub mod report;
pub mod speedtest;
pub mod ui;
