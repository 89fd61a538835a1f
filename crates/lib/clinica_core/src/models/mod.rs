//! Domain models shared by the store, the access validators and the API.

pub mod auth;
pub mod page;
pub mod patient;
pub mod user;
