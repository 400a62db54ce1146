// src/models/mod.rs

pub mod cart;
pub mod catalog;
pub mod material;
pub mod order;
pub mod review;
pub mod user;
