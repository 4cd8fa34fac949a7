//! End-to-end tests for the commit protocol.

mod commit_protocol;
mod commit_sync;
mod merkle_proofs;
mod tamper_rejection;
