pub mod audit;
pub mod codec;
pub mod config;
pub mod document;
pub mod legacy;
pub mod manager;
pub mod migrate;
pub mod paths;
pub mod report;
pub mod scoped;
pub mod search;
pub mod util;
pub mod warn;
