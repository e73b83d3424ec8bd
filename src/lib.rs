pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;
