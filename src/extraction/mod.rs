//! Clients for the external receipt extraction service

pub mod http;

pub use http::HttpExtractionClient;
