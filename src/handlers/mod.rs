// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod commerce;
pub mod materials;
pub mod profile;
pub mod reviews;
