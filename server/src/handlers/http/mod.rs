pub mod admin;
pub mod auth;
pub mod pages;
pub mod routes;
pub mod utils;

pub use routes::{Router, build_admin_router};
