//! # API Route Modules
//!
//! - `upload`: `POST /api/upload`: store an image and index it under its
//!   label.

pub mod upload;
