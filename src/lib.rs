pub mod cli;
pub mod diff;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod mcp;
pub mod model;
pub mod parser;
pub mod rules;
pub mod service;
pub mod snapshot;
pub mod symbols;
pub mod testloc;
pub mod util;
