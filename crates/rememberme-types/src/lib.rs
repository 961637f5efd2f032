//! # Remember-me Types
//!
//! Shared type definitions for the remember-me token service.
//!
//! This crate provides the credential, outcome and error types used across
//! the workspace, ensuring a single source of truth and preventing circular
//! dependencies.

#![deny(unsafe_code)]

// ============================================================================
// Error Types
// ============================================================================

pub mod error;

pub use error::{Error, Result};

// ============================================================================
// Entity Types
// ============================================================================

pub mod entities;

pub use entities::{
    Authentication, Credential, IssuedToken, RemovalInstructions, TokenPair, ValidationOutcome,
};
