//! Integration tests for the harvester
//!
//! `harvest_tests` drive full runs against an in-memory hierarchy source;
//! `fetcher_tests` exercise the HTTP fetcher and an end-to-end run against
//! wiremock servers.

mod fetcher_tests;
mod harvest_tests;
mod synthetic;
