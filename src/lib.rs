//! Object storage benchmarks.
//!
//! cfbench measures how fast an OpenStack Swift / Rackspace Cloud
//! Files object store uploads, fetches, and deletes objects, and checks
//! the integrity of everything it fetches. This crate provides the
//! benchmarks as a library; the `cfbench` program is a thin command
//! line front end.

#![deny(missing_docs)]

pub mod accumulated_time;
pub mod backoff;
pub mod benchmark;
pub mod checksummer;
pub mod config;
pub mod error;
pub mod identity;
pub mod localstore;
pub mod memstore;
pub mod objectstore;
pub mod payload;
pub mod performance;
pub mod progress;
pub mod swift;
pub mod workqueue;
