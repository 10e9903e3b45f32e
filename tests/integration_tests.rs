// Gateway file to expose integration tests from the integration/ subdirectory

mod common;

#[path = "integration/corpus_store.rs"]
mod corpus_store;

#[path = "integration/ingestion.rs"]
mod ingestion;

#[path = "integration/persistence.rs"]
mod persistence;

#[path = "integration/embedding_model.rs"]
mod embedding_model;
