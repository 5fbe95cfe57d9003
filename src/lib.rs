//! coinledger - An append-only ledger of fungible tokens and NFTs sealed by proof-of-work
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger, transaction application and validation
//! - [`transaction`] - Transaction payloads, hashing and size checks
//! - [`amount`] - Fixed-point token amounts
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work search and verification
//!
//! ## Cryptography
//! - [`crypto`] - SHA-256 helpers and bearer tokens
//!
//! ## State Management
//! - [`wallet`] - Wallet registry
//! - [`nft`] - Non-fungible assets
//! - [`snapshot`] - Serialized ledger document
//! - [`persistence`] - Snapshot storage backends
//!
//! ## Integration
//! - [`node`] - Process wiring: config, restore, serve
//! - [`api`] - HTTP API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod amount;
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod nft;
pub mod persistence;
pub mod snapshot;
pub mod wallet;

// ============================================================================
// Integration
// ============================================================================
pub mod node;

#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
