//! # FHE executor interface
//!
//! The homomorphic arithmetic itself lives in a separate executor contract
//! (a coprocessor front). ZamaCCO only ever passes 32-byte ciphertext handles
//! in and receives handles back; no call in this interface returns plaintext.
//!
//! Values are unsigned 32-bit ciphertexts. Comparison results are encrypted
//! booleans that share the same handle space and are only valid as the
//! `cond` argument of [`FheExecutor::select`].
//!
//! The executor must be deterministic: identical operations over identical
//! handles yield identical result handles.

use soroban_sdk::{contractclient, Address, Bytes, BytesN, Env};

#[contractclient(name = "FheExecutorClient")]
pub trait FheExecutor {
    /// Check that `handle` is a well-formed ciphertext produced by `owner`
    /// and covered by `proof`.
    fn verify_input(env: Env, owner: Address, handle: BytesN<32>, proof: Bytes) -> bool;

    /// Trivially encrypt a public constant.
    fn as_encrypted(env: Env, value: u32) -> BytesN<32>;

    fn add(env: Env, lhs: BytesN<32>, rhs: BytesN<32>) -> BytesN<32>;

    fn mul_scalar(env: Env, lhs: BytesN<32>, scalar: u32) -> BytesN<32>;

    /// `min(lhs, scalar)`
    fn min_scalar(env: Env, lhs: BytesN<32>, scalar: u32) -> BytesN<32>;

    /// Encrypted `lhs < rhs`.
    fn lt(env: Env, lhs: BytesN<32>, rhs: BytesN<32>) -> BytesN<32>;

    /// `cond ? if_true : if_false`
    fn select(env: Env, cond: BytesN<32>, if_true: BytesN<32>, if_false: BytesN<32>) -> BytesN<32>;

    /// Grant `account` the right to have `handle` decrypted by the gateway.
    fn allow(env: Env, handle: BytesN<32>, account: Address);
}
