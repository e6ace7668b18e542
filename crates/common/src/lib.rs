//! Common utilities and types shared across Bearer Gate components.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, leeway bounds, header inspection)
pub mod jwt;
