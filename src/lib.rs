pub mod archive;
pub mod clone;
pub mod config;
pub mod errors;
pub mod forge;
pub mod layout;
pub mod scheduler;
pub mod ui;
