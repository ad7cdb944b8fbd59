// Library interface for crosslens modules
// This allows tests and the binaries to import modules

pub mod aggregate;
pub mod context;
pub mod cors;
pub mod error;
pub mod extraction;
pub mod fallback;
pub mod frames;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod podcast;
pub mod server;
pub mod startup;
pub mod tts;
