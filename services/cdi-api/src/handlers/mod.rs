//! HTTP request handlers for the CDI API.

pub mod administrations;
pub mod catalog;
pub mod health;
pub mod jobs;
pub mod maps;
pub mod publications;
pub mod reviews;
