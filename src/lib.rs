//! Folio Server Library
//!
//! Accepts PDF uploads, derives page-subset documents and per-page images
//! from them, and tracks each derivation in pollable status tables.

pub mod config;
pub mod db;
pub mod error;
pub mod keys;
pub mod pdf;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod storage;
pub mod store;
pub mod upload;
