//! Domain model for todos and their AI-derived attachments.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Hold pure rules (filtering, due-date classification) with no I/O.
//!
//! # Invariants
//! - Every todo is identified by a stable `TodoId`.
//! - Subtasks and research are owned by exactly one todo.

pub mod due;
pub mod filter;
pub mod todo;
