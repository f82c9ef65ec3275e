//! Import pipeline services

pub mod auth;
pub mod csv_parser;
pub mod dedup;
pub mod job_store;
pub mod queue;
pub mod worker;
