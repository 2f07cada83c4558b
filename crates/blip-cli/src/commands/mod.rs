pub mod app;
pub mod config;
pub mod counter;
pub mod widget;
