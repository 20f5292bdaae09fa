//! Tenant Limits - tenant-aware rate limit classes and quota usage
//!
//! This crate sits alongside a token-bucket rate limiting middleware in a
//! multi-tenant API. Before a request it resolves the caller's tenant and
//! rate limit class; after the request it reads the tenant's buckets and
//! projects them into the API's public "current limits" report.

pub mod admin;
pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod fault;
pub mod index;
pub mod limits;
pub mod middleware;
pub mod projection;
pub mod resolver;
pub mod store;
pub mod template;
