pub mod config;
pub mod crawler;
pub mod domain;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod report;
pub mod stages;
