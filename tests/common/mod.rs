#![allow(dead_code)]

//! Common test infrastructure
//!
//! Integration tests never run the real ffmpeg. They script a [`FakeTool`]
//! instead and inspect the invocations it recorded.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FakeTool, Reply, TestWorkspace};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let workspace = TestWorkspace::new();
//!     let tool = FakeTool::new().when_arg("libmp3lame", Reply::failed(1, "encoder missing"));
//!     // ...
//! }
//! ```

mod fake_tool;
mod fixtures;

pub use fake_tool::{FakeTool, Reply, ToolCall};
pub use fixtures::*;
