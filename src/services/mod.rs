pub mod llm;
pub mod pipeline;
pub mod segment_parser;
