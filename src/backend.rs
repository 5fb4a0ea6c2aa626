//! Engine backend seam — the opaque generation capability.
//!
//! The routing core only decides *which* engine to call; the call itself
//! (wire protocol, timeouts, fallback to an alternate engine) belongs to
//! the implementor of [`EngineBackend`].

use crate::error::RouterError;
use crate::types::GenerationParams;

/// A backend capable of producing a text response from a named engine.
pub trait EngineBackend: Send + Sync {
    /// Generate a response with `engine` for `prompt`.
    fn generate(
        &self,
        engine: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, RouterError>;
}

/// Echo backend for the demo binary and tests — no real engine calls.
pub struct StubBackend;

impl EngineBackend for StubBackend {
    fn generate(
        &self,
        engine: &str,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, RouterError> {
        Ok(format!("[{}] stub response for: {}", engine, prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_names_the_engine() {
        let response = StubBackend
            .generate("fast-7b", "hola", &GenerationParams::default())
            .unwrap();
        assert!(response.starts_with("[fast-7b]"));
        assert!(response.contains("hola"));
    }
}
