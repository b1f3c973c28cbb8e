//! Rendering a ranked feed for people and programs.
//!
//! # Submodules
//!
//! - [`json`]: Writes a [`RankedFeed`](crate::models::RankedFeed) to a dated JSON file
//! - [`markdown`]: Renders a feed as a Markdown table
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2024-05-01/
//!     ├── news_093000.json
//!     └── news_160000.json
//!
//! markdown_output_dir/
//! └── news_2024-05-01_093000.md
//! ```

pub mod json;
pub mod markdown;
