pub mod chunk;
pub mod document;
pub mod index_config;
