//! Deterministic stand-in for the FHE executor, used by the unit tests.
//!
//! Handles are sha256 digests of the operation and its operands, so the same
//! computation always yields the same handle. The plaintext behind each
//! handle is kept in the mock's storage and exposed through `reveal`, which a
//! real executor obviously does not have.

use soroban_sdk::{
    contract, contractimpl, contracttype, testutils::Address as _, Address, Bytes, BytesN, Env,
};

use crate::{ZamaCco, ZamaCcoClient};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
enum MockKey {
    Plain(BytesN<32>),
    Input(BytesN<32>),
    Allowed(BytesN<32>, Address),
    Nonce,
    Ops,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
struct InputBinding {
    owner: Address,
    proof: Bytes,
}

const TAG_INPUT: u32 = 0;
const TAG_CONST: u32 = 1;
const TAG_ADD: u32 = 2;
const TAG_MUL: u32 = 3;
const TAG_MIN: u32 = 4;
const TAG_LT: u32 = 5;
const TAG_SELECT: u32 = 6;

#[contract]
pub struct MockFheExecutor;

#[contractimpl]
impl MockFheExecutor {
    /// Client-side encryption: mint a fresh input handle bound to `owner` and `proof`.
    pub fn encrypt(env: Env, owner: Address, value: u32, proof: Bytes) -> BytesN<32> {
        let nonce: u32 = env.storage().instance().get(&MockKey::Nonce).unwrap_or(0);
        env.storage().instance().set(&MockKey::Nonce, &(nonce + 1));
        let handle = derive(&env, TAG_INPUT, &[], nonce);
        store(&env, &handle, value);
        env.storage()
            .persistent()
            .set(&MockKey::Input(handle.clone()), &InputBinding { owner, proof });
        handle
    }

    pub fn verify_input(env: Env, owner: Address, handle: BytesN<32>, proof: Bytes) -> bool {
        let binding: Option<InputBinding> = env.storage().persistent().get(&MockKey::Input(handle));
        match binding {
            Some(binding) => binding.owner == owner && binding.proof == proof,
            None => false,
        }
    }

    pub fn as_encrypted(env: Env, value: u32) -> BytesN<32> {
        let handle = derive(&env, TAG_CONST, &[], value);
        store(&env, &handle, value);
        handle
    }

    pub fn add(env: Env, lhs: BytesN<32>, rhs: BytesN<32>) -> BytesN<32> {
        let value = load(&env, &lhs).wrapping_add(load(&env, &rhs));
        let handle = derive(&env, TAG_ADD, &[&lhs, &rhs], 0);
        store(&env, &handle, value);
        handle
    }

    pub fn mul_scalar(env: Env, lhs: BytesN<32>, scalar: u32) -> BytesN<32> {
        let value = load(&env, &lhs).wrapping_mul(scalar);
        let handle = derive(&env, TAG_MUL, &[&lhs], scalar);
        store(&env, &handle, value);
        handle
    }

    pub fn min_scalar(env: Env, lhs: BytesN<32>, scalar: u32) -> BytesN<32> {
        let value = load(&env, &lhs).min(scalar);
        let handle = derive(&env, TAG_MIN, &[&lhs], scalar);
        store(&env, &handle, value);
        handle
    }

    pub fn lt(env: Env, lhs: BytesN<32>, rhs: BytesN<32>) -> BytesN<32> {
        let value = (load(&env, &lhs) < load(&env, &rhs)) as u32;
        let handle = derive(&env, TAG_LT, &[&lhs, &rhs], 0);
        store(&env, &handle, value);
        handle
    }

    pub fn select(
        env: Env,
        cond: BytesN<32>,
        if_true: BytesN<32>,
        if_false: BytesN<32>,
    ) -> BytesN<32> {
        let value = if load(&env, &cond) != 0 {
            load(&env, &if_true)
        } else {
            load(&env, &if_false)
        };
        let handle = derive(&env, TAG_SELECT, &[&cond, &if_true, &if_false], 0);
        store(&env, &handle, value);
        handle
    }

    pub fn allow(env: Env, handle: BytesN<32>, account: Address) {
        env.storage()
            .persistent()
            .set(&MockKey::Allowed(handle, account), &true);
    }

    pub fn is_allowed(env: Env, handle: BytesN<32>, account: Address) -> bool {
        env.storage()
            .persistent()
            .get(&MockKey::Allowed(handle, account))
            .unwrap_or(false)
    }

    /// Number of homomorphic operations evaluated so far.
    pub fn op_count(env: Env) -> u32 {
        env.storage().instance().get(&MockKey::Ops).unwrap_or(0)
    }

    pub fn reveal(env: Env, handle: BytesN<32>) -> u32 {
        load(&env, &handle)
    }
}

fn derive(env: &Env, tag: u32, operands: &[&BytesN<32>], scalar: u32) -> BytesN<32> {
    let mut data = Bytes::new(env);
    data.extend_from_array(&tag.to_be_bytes());
    for operand in operands {
        data.extend_from_array(&operand.to_array());
    }
    data.extend_from_array(&scalar.to_be_bytes());
    env.crypto().sha256(&data).to_bytes()
}

fn store(env: &Env, handle: &BytesN<32>, value: u32) {
    env.storage()
        .persistent()
        .set(&MockKey::Plain(handle.clone()), &value);
    let ops: u32 = env.storage().instance().get(&MockKey::Ops).unwrap_or(0);
    env.storage().instance().set(&MockKey::Ops, &(ops + 1));
}

fn load(env: &Env, handle: &BytesN<32>) -> u32 {
    env.storage()
        .persistent()
        .get(&MockKey::Plain(handle.clone()))
        .expect("unknown ciphertext handle")
}

// ── Shared test fixture ─────────────────────────────────────────────

pub struct Fixture {
    pub env: Env,
    pub client: ZamaCcoClient<'static>,
    pub fhe: MockFheExecutorClient<'static>,
    pub super_admin: Address,
}

/// Handles and proof for one encrypted profile, as a borrower's client would
/// produce them.
pub struct EncryptedInputs {
    pub income: BytesN<32>,
    pub collateral: BytesN<32>,
    pub debt: BytesN<32>,
    pub proof: Bytes,
}

impl Fixture {
    pub fn new() -> Self {
        let env = Env::default();
        env.mock_all_auths();
        let fhe_id = env.register(MockFheExecutor, ());
        let contract_id = env.register(ZamaCco, ());
        let client = ZamaCcoClient::new(&env, &contract_id);
        let fhe = MockFheExecutorClient::new(&env, &fhe_id);
        let super_admin = Address::generate(&env);
        client.init(&super_admin, &fhe_id);
        Fixture {
            env,
            client,
            fhe,
            super_admin,
        }
    }

    pub fn encrypt(
        &self,
        borrower: &Address,
        income: u32,
        collateral: u32,
        debt: u32,
    ) -> EncryptedInputs {
        let proof = Bytes::from_array(&self.env, &[0x5a; 16]);
        EncryptedInputs {
            income: self.fhe.encrypt(borrower, &income, &proof),
            collateral: self.fhe.encrypt(borrower, &collateral, &proof),
            debt: self.fhe.encrypt(borrower, &debt, &proof),
            proof,
        }
    }

    pub fn submit(
        &self,
        borrower: &Address,
        income: u32,
        collateral: u32,
        debt: u32,
    ) -> EncryptedInputs {
        let inputs = self.encrypt(borrower, income, collateral, debt);
        self.client.submit_encrypted_data(
            borrower,
            &inputs.income,
            &inputs.collateral,
            &inputs.debt,
            &inputs.proof,
        );
        inputs
    }

    /// Decrypt the stored tier through the mock, the way the gateway would.
    pub fn revealed_tier(&self, borrower: &Address) -> u32 {
        let handle = self.client.get_public_credit_tier(borrower);
        self.fhe.reveal(&handle)
    }
}
