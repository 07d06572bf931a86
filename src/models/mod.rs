//! Data models for catalog entities

pub mod author;
pub mod book;
pub mod patron;
