//! End-to-end tests over in-memory collaborators.

mod orchestration;
