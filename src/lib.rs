//! Stager - staging workflows for a build and package platform
//!
//! This library provides the core functionality for Stager, including:
//! - Database operations and migrations
//! - Data models for projects, groups, requests and staging workflows
//! - Repository layer for data access
//! - The staging workflow domain and its group directory cache
//! - The backend client used to mirror workflows
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use stager::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod config;
pub mod db;
pub mod models;
pub mod repo;
pub mod staging;
pub mod backend;
pub mod cli;
