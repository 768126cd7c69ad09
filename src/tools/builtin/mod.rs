//! Built-in tools used by the agent catalog.
//!
//! Every tool reports its own failures as text so the model can react to
//! them; only a malformed call (missing required argument) surfaces as an
//! error, which the agent loop turns into text as well.

pub mod browser;
pub mod files;
pub mod image;
pub mod python;
pub mod search;

pub use browser::{browser_tool, BrowserSession};
pub use files::{glob_search_tool, grep_search_tool, FileSearch};
pub use image::image_analysis_tool;
pub use python::{python_tool, PythonRunner};
pub use search::{web_search_tool, TavilyClient};
