pub mod audit;
pub mod config;
pub mod fetch;
pub mod forge;
pub mod installed;
pub mod lock;
pub mod paths;
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod unpack;
pub mod warn;
