pub mod config;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;

pub use models::ParsedSegment;
pub use services::segment_parser::{SegmentParser, parse_segments};
