//! HTTP 处理器

pub mod eventhouse;
pub mod health;
pub mod investment;
pub mod items;
pub mod workload;
