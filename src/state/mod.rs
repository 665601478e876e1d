//! State module for tracking crawl progress
//!
//! The only crawl state is the [`Cursor`]: an immutable value threaded
//! through one session's steps. Sessions never share a cursor.

mod cursor;

pub use cursor::{Cursor, PageToken};
