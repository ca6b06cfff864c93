use super::test_ollama_connection as test_ollama_connection_impl;
use crate::config::OllamaConfig;

#[test]
fn unreachable_server_reports_failure() {
    let ollama = OllamaConfig {
        host: "127.0.0.1".to_string(),
        // Reserved port that nothing should be listening on.
        port: 9,
        ..OllamaConfig::default()
    };

    assert!(!test_ollama_connection_impl(&ollama));
}
