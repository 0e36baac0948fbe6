// src/aliases.rs
//! Secret-holding types built on secure-gate's alias macros
//!
//! These are the canonical secret-holding types used throughout passvault.

use secure_gate::{dynamic_alias, fixed_alias};

// Fixed-size secrets
fixed_alias!(FieldKey32, 32); // 256-bit AES-GCM field key derived from the master passphrase

// Dynamic secrets
dynamic_alias!(MasterPassphrase, String); // Kept only while the vault file is unlocked
