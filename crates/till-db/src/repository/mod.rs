//! # Repository Module
//!
//! SQLite-backed repositories.
//!
//! ## Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Each repository owns a pool clone (cheap, Arc inside) and exposes     │
//! │  async methods returning DbResult<T>. Queries are runtime-checked      │
//! │  (sqlx::query) so the crate builds without a DATABASE_URL.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod kv;
