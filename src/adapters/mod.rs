// Adapters layer: concrete implementations for external systems (storage, translation service).

pub mod storage;
pub mod translator;
