//! Calendar store — PostgreSQL backend for tokens and selections.

pub mod db;

pub use db::{CalendarSelection, CalendarStore, TokenRecord};
