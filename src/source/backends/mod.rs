/// Hugging Face datasets-server `/rows` backend.
pub mod datasets_server;
