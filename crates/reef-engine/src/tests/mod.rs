//! Tests for the reef-engine crate.
