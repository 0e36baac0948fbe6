// src/crypto/mod.rs
//! Pure cryptographic primitives: no I/O, no database

pub mod field;
pub mod kdf;

pub use field::FieldCipher;
pub use kdf::KeyDerivation;
