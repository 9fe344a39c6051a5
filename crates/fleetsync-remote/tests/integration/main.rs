//! Integration tests for the REST remote replica
//!
//! Every test runs against a wiremock server standing in for the backend.

mod common;
mod test_change_feed;
mod test_connectivity;
mod test_errors;
mod test_rows;
mod test_settings;
