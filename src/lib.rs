//! Todo backend - a per-user todo list behind bearer-token sessions
//!
//! This library provides the core functionality for the todo backend:
//! accounts, signed session tokens, request authentication and todo CRUD.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
