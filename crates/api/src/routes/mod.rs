//! HTTP route handlers

pub mod admin;
pub mod health;
pub mod index;
pub mod predict;
