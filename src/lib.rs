pub mod carousel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod persist;
pub mod rotate;
pub mod scan;
pub mod watch;
pub mod web;
