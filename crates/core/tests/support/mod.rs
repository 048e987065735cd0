//! Shared test helpers for `policyqa-core` integration tests.
//!
//! In-memory port implementations plus a fixture that wires the services the
//! way the binary does, so tests can focus on behaviour instead of plumbing.

#![allow(dead_code)]

pub mod collaborators;
pub mod fixture;
pub mod repositories;
