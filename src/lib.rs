//! # course-catalog
//!
//! `course_catalog` is the catalog service for courses: a sled-backed course
//! store plus the message-broker integration other services use to reach it.
//!
//! ## Core Modules
//!
//! - `broker`: request/reply for course details (correlation ids over private
//!   reply queues), the detail responder loop, and fire-and-forget catalog
//!   notifications. Runs over AMQP or an in-process broker.
//! - `catalog`: course records, the course store and catalog operations.
//! - `config`: loading settings from file and environment.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod catalog;
pub mod config;
pub mod utils;

#[cfg(test)]
mod tests;
