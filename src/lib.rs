//! glamscrape - Lodestone glamour data acquisition and aggregation system.
//!
//! Crawls the Lodestone character search space, extracts glamour (equipment
//! appearance) data into a local staging database, aggregates it into usage
//! and pair statistics, and publishes the aggregates to a remote read-store
//! through a versioned three-phase sync.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod models;
pub mod parsers;
pub mod repository;
pub mod scrapers;
pub mod sync;
