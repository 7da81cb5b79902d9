pub mod config;
pub mod kind;
pub mod meta;
pub mod quota;
pub mod replication_controller;
pub mod validate;
