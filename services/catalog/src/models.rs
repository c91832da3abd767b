//! API models for request and response payloads

pub mod product;
pub mod review;
pub mod user;
