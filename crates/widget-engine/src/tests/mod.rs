//! Tests for the widget-engine crate.
