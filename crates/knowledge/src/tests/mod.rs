//! End-to-end tests across retrieval, attribution, orchestration and storage.
