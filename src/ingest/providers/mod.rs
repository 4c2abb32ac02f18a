// src/ingest/providers/mod.rs
pub mod atom;
pub mod oai;
