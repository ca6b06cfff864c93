use super::*;
use tempfile::TempDir;

fn valid_config(base_dir: &Path) -> Config {
    Config {
        ollama: OllamaConfig::default(),
        chunking: ChunkingConfig::default(),
        retrieval: RetrievalConfig::default(),
        base_dir: base_dir.to_path_buf(),
    }
}

#[test]
fn defaults_are_valid() {
    let temp = TempDir::new().expect("create temp dir");
    let config = valid_config(temp.path());

    assert!(config.validate().is_ok());
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.overlap, 50);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.retrieval.context_passages, 3);
    assert_eq!(config.retrieval.max_context_chars, 4000);
}

#[test]
fn load_without_file_returns_defaults() {
    let temp = TempDir::new().expect("create temp dir");
    let config = Config::load_from(temp.path()).expect("load should succeed");

    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.base_dir, temp.path());
}

#[test]
fn save_and_load_round_trip() {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = valid_config(temp.path());
    config.ollama.host = "embeddings.internal".to_string();
    config.chunking.chunk_size = 300;
    config.chunking.overlap = 30;
    config.retrieval.top_k = 7;
    config.retrieval.fetch_k = 28;

    config.save().expect("save should succeed");

    let loaded = Config::load_from(temp.path()).expect("load should succeed");
    assert_eq!(loaded, config);
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = valid_config(temp.path());
    config.chunking.overlap = config.chunking.chunk_size;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidOverlap(_, _))
    ));
}

#[test]
fn fetch_k_must_cover_top_k() {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = valid_config(temp.path());
    config.retrieval.top_k = 10;
    config.retrieval.fetch_k = 5;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidFetchK(5, 10))
    ));
}

#[test]
fn mmr_lambda_is_bounded() {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = valid_config(temp.path());
    config.retrieval.mmr_lambda = 1.5;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidMmrLambda(_))
    ));
}

#[test]
fn context_passages_cannot_exceed_top_k() {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = valid_config(temp.path());
    config.retrieval.context_passages = config.retrieval.top_k + 1;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidContextPassages(_, _))
    ));
}

#[test]
fn empty_model_name_is_rejected() {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = valid_config(temp.path());
    config.ollama.generation_model = "  ".to_string();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));
}

#[test]
fn invalid_protocol_is_rejected() {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = valid_config(temp.path());
    config.ollama.protocol = "ftp".to_string();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn derived_paths_live_under_base_dir() {
    let temp = TempDir::new().expect("create temp dir");
    let config = valid_config(temp.path());

    assert_eq!(config.index_path(), temp.path().join("index.json"));
    assert_eq!(config.ingest_lock_path(), temp.path().join(".ingest.lock"));
    assert_eq!(config.config_file_path(), temp.path().join("config.toml"));
}

#[test]
fn malformed_toml_is_rejected() {
    let temp = TempDir::new().expect("create temp dir");
    std::fs::write(temp.path().join("config.toml"), "ollama = \"nope\"")
        .expect("write config file");

    assert!(Config::load_from(temp.path()).is_err());
}
