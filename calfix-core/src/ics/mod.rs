//! Whole-feed rewriting.
//!
//! Validates an upstream .ics feed, runs the patch pipeline over every event
//! and writes the feed back out with only the patched lines changed
//! (RFC 5545 in, RFC 5545 out).

mod lines;
mod modify;

pub use modify::{modify_ics, parse_calendar};
