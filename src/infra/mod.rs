pub mod cache;
pub mod config;
pub mod db_external;
pub mod refresh;
pub mod utils;
