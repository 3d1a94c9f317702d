//! Markdown side of a pass: find link targets, then swap them for local URLs.

pub mod links;
pub mod rewrite;

pub use links::extract_links;
pub use rewrite::rewrite;
