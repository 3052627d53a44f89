//! Per-resource REST handlers. Each module implements one collection's
//! CRUD (or business-logic) surface against [`fileflow_core::Store`] and,
//! when an upstream call is required, the plane's `ClientFactory`.

pub mod accounts;
pub mod credentials;
pub mod files;
pub mod settings;
pub mod tokens;
