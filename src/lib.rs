//! SignLearn - a sign-language learning site
//!
//! Lesson pages, a sign dictionary backed by a public dictionary API and a
//! sign video site, a text-to-sign phrase lookup, and user accounts.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod templates;
