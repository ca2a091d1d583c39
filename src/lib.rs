pub mod app;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod console;
pub mod domain;
pub mod download;
pub mod error;
pub mod mod_list;
pub mod models;
pub mod output;
pub mod progress;
pub mod resolver;
