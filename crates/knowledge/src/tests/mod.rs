//! End-to-end tests: learn documents, then search them.
