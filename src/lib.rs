#![doc = "The `moner` library crate."]
#![doc = ""]
#![doc = "Accounts with email verification and password resets, a follow graph, work"]
#![doc = "experience timelines and skills, served over a JSON API by `main.rs`. The"]
#![doc = "`client` module is the matching typed client with its session store and"]
#![doc = "navigation guard."]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod verification;

pub use crate::error::AppError;
pub use crate::state::AppState;
