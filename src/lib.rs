//! Polls - a small polling web application
//!
//! Published questions, choices with vote tallies, one vote per user and
//! question, and cookie sessions for login.

pub mod api;
pub mod config;
pub mod db;
pub mod hooks;
pub mod models;
pub mod services;
pub mod templates;
