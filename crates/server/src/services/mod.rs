//! Use cases behind the HTTP handlers. Each function checks the caller's
//! permissions, then talks to the repositories and engines in `AppState`.

pub mod accounts;
pub mod catalog;
pub mod quotations;
pub mod reports;
