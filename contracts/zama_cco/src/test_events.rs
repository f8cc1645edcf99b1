extern crate std;

use std::vec::Vec as StdVec;

use soroban_sdk::{
    symbol_short,
    testutils::{Address as _, Events, Ledger},
    vec, Address, Bytes, BytesN, IntoVal, TryIntoVal,
};

use crate::events::{CreditScoreComputed, DecryptionRequested, ProfileSubmitted, RewardDistributed};
use crate::invariants::assert_sequential_requests;
use crate::mock_fhe::Fixture;

#[test]
fn test_profile_submitted_event() {
    let fx = Fixture::new();
    let borrower = Address::generate(&fx.env);
    fx.env.ledger().set_timestamp(1_000);

    let inputs = fx.submit(&borrower, 1, 2, 3);

    let all_events = fx.env.events().all();
    let last_event = all_events.last().expect("No events found");

    // Topic: (symbol_short!("submitted"), borrower)
    assert_eq!(last_event.0, fx.client.address);
    let expected_topics = vec![
        &fx.env,
        symbol_short!("submitted").into_val(&fx.env),
        borrower.into_val(&fx.env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let mut packed = Bytes::new(&fx.env);
    packed.extend_from_array(&inputs.income.to_array());
    packed.extend_from_array(&inputs.collateral.to_array());
    packed.extend_from_array(&inputs.debt.to_array());
    let digest: BytesN<32> = fx.env.crypto().sha256(&packed).to_bytes();

    let event_data: ProfileSubmitted = last_event.2.try_into_val(&fx.env).unwrap();
    assert_eq!(
        event_data,
        ProfileSubmitted {
            borrower: borrower.clone(),
            data_digest: digest,
            timestamp: 1_000,
        }
    );
}

#[test]
fn test_credit_score_computed_event() {
    let fx = Fixture::new();
    let borrower = Address::generate(&fx.env);
    fx.submit(&borrower, 100_000, 100_000, 0);

    let tier = fx.client.compute_credit_score(&borrower);

    let all_events = fx.env.events().all();
    let last_event = all_events.last().expect("No events found");

    assert_eq!(last_event.0, fx.client.address);
    let expected_topics = vec![
        &fx.env,
        symbol_short!("scored").into_val(&fx.env),
        borrower.into_val(&fx.env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: CreditScoreComputed = last_event.2.try_into_val(&fx.env).unwrap();
    assert_eq!(
        event_data,
        CreditScoreComputed {
            borrower: borrower.clone(),
            encrypted_tier: tier,
        }
    );
}

#[test]
fn test_decryption_requested_event() {
    let fx = Fixture::new();
    let borrower = Address::generate(&fx.env);
    let lender = Address::generate(&fx.env);
    fx.submit(&borrower, 1, 1, 1);
    fx.env.ledger().set_timestamp(42_000);

    let seq = fx.client.request_decryption(&lender, &borrower);

    let all_events = fx.env.events().all();
    let last_event = all_events.last().expect("No events found");

    assert_eq!(last_event.0, fx.client.address);
    let expected_topics = vec![
        &fx.env,
        symbol_short!("decrypt").into_val(&fx.env),
        borrower.into_val(&fx.env),
        lender.into_val(&fx.env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: DecryptionRequested = last_event.2.try_into_val(&fx.env).unwrap();
    assert_eq!(
        event_data,
        DecryptionRequested {
            borrower: borrower.clone(),
            lender: lender.clone(),
            timestamp: 42_000,
            seq,
        }
    );
}

#[test]
fn test_each_request_emits_exactly_one_event() {
    let fx = Fixture::new();
    let borrower = Address::generate(&fx.env);
    let lenders: StdVec<Address> = (0..3).map(|_| Address::generate(&fx.env)).collect();
    fx.submit(&borrower, 1, 1, 1);

    let mut requests = StdVec::new();
    for lender in &lenders {
        let seq = fx.client.request_decryption(lender, &borrower);
        let emitted: StdVec<DecryptionRequested> = fx
            .env
            .events()
            .all()
            .iter()
            .filter(|e| e.0 == fx.client.address)
            .filter_map(|e| e.2.try_into_val(&fx.env).ok())
            .filter(|r: &DecryptionRequested| r.seq == seq)
            .collect();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].lender, *lender);
        assert_eq!(emitted[0].borrower, borrower);
        requests.push(emitted[0].clone());
    }
    assert_sequential_requests(&requests);
}

#[test]
fn test_rejected_request_emits_nothing() {
    let fx = Fixture::new();
    let borrower = Address::generate(&fx.env);
    let lender = Address::generate(&fx.env);

    let result = fx.client.try_request_decryption(&lender, &borrower);
    assert!(result.is_err());
    assert_eq!(fx.client.request_count(), 0);
}

#[test]
fn test_reward_distributed_event() {
    let fx = Fixture::new();
    let user = Address::generate(&fx.env);

    fx.client.distribute_reward(&fx.super_admin, &user, &50);

    let all_events = fx.env.events().all();
    let last_event = all_events.last().expect("No events found");

    assert_eq!(last_event.0, fx.client.address);
    let expected_topics = vec![
        &fx.env,
        symbol_short!("reward").into_val(&fx.env),
        user.into_val(&fx.env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: RewardDistributed = last_event.2.try_into_val(&fx.env).unwrap();
    assert_eq!(
        event_data,
        RewardDistributed {
            user: user.clone(),
            amount: 50,
        }
    );
}
