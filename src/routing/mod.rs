//! Route table: configured patterns -> module/controller/action triples.

pub mod pattern;
pub mod table;

pub use pattern::RoutePattern;
pub use table::{RouteEntry, RouteMatch, RouteTable};
