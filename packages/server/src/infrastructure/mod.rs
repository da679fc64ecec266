//! Infrastructure layer: repository implementations and wire DTOs.

pub mod dto;
pub mod repository;
