// Library exports for Mural
// This allows integration tests and external code to use Mural modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod requests;
pub mod routes;
pub mod state;
