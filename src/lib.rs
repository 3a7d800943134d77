pub mod bundle;
pub mod cli;
pub mod cluster;
pub mod extra_vars;
pub mod instances;
pub mod logging;
pub mod params;
pub mod plan;
pub mod prompt;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod store;
pub mod table;
