//! End-to-end dispute scenarios: forks, challenges, bisection games and
//! timer-gated confirmation, driven against an artificial clock.

use std::sync::Arc;
use std::time::Duration;

use dispute_core::{
    Address, ArtificialTimeReference, AssertionChain, AssertionEvent, AssertionStatus, ChainConfig,
    ChainError, ChallengeEvent, HistoryCommitment, StateCommitment, VertexStatus,
    ASSERTION_STAKE,
};
use dispute_core::merkle::generate_prefix_proof;

const ALICE: Address = [0xa1; 20];
const BOB: Address = [0xb0; 20];

fn state_leaf(tag: u8, index: u64) -> [u8; 32] {
    let mut leaf = [0u8; 32];
    leaf[0] = tag;
    leaf[24..].copy_from_slice(&index.to_be_bytes());
    leaf
}

/// Execution traces over heights 0..=8 agreeing up to height 4.
fn traces() -> (Vec<[u8; 32]>, Vec<[u8; 32]>) {
    let honest: Vec<[u8; 32]> = (0..=8).map(|i| state_leaf(0, i)).collect();
    let mut rival = honest.clone();
    for (i, leaf) in rival.iter_mut().enumerate().skip(5) {
        *leaf = state_leaf(1, i as u64);
    }
    (honest, rival)
}

fn funded_chain() -> (AssertionChain, Arc<ArtificialTimeReference>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = ArtificialTimeReference::new();
    let chain = AssertionChain::new(clock.clone(), ChainConfig::default());
    chain.tx(|tx| {
        tx.set_balance(ALICE, 1_000 * ASSERTION_STAKE);
        tx.set_balance(BOB, 1_000 * ASSERTION_STAKE);
    });
    (chain, clock)
}

#[test]
fn single_chain_confirms_by_deadline() {
    let (chain, clock) = funded_chain();
    let starting_balance = chain.call(|tx| tx.balance(ALICE));

    chain.tx(|tx| {
        tx.create_assertion(0, StateCommitment::new(1, state_leaf(0, 1)), ALICE)
            .unwrap();
    });

    clock.advance(chain.challenge_period() + Duration::from_secs(1));
    chain.tx(|tx| tx.confirm_no_rival(1)).unwrap();

    chain.call(|tx| {
        assert_eq!(tx.latest_confirmed(), 1);
        assert_eq!(tx.assertion(1).unwrap().status, AssertionStatus::Confirmed);
        // Stake bonded at creation came back on confirmation.
        assert_eq!(tx.balance(ALICE), starting_balance);
    });
}

#[test]
fn fork_resolves_by_ps_timer_win() -> anyhow::Result<()> {
    let (chain, clock) = funded_chain();
    let (honest, rival) = traces();

    // Alice asserts first; Bob's rival arrives one second later.
    let first = chain.tx(|tx| {
        tx.create_assertion(0, StateCommitment::new(8, honest[8]), ALICE)
    })?;
    clock.advance(Duration::from_secs(1));
    let (second, challenge, honest_leaf, rival_leaf) = chain.tx(|tx| {
        let second = tx.create_assertion(0, StateCommitment::new(8, rival[8]), BOB)?;
        let challenge = tx.create_succession_challenge(0)?;
        let honest_leaf = tx.add_leaf(
            challenge,
            first,
            HistoryCommitment::new(&honest).unwrap(),
            ALICE,
        )?;
        let rival_leaf = tx.add_leaf(
            challenge,
            second,
            HistoryCommitment::new(&rival).unwrap(),
            BOB,
        )?;
        Ok::<_, ChainError>((second, challenge, honest_leaf, rival_leaf))
    })?;

    // Too early: the timer still sits inside the challenge period.
    chain.tx(|tx| {
        assert_eq!(
            tx.confirm_for_ps_timer(honest_leaf).unwrap_err(),
            ChainError::NotYet
        );
    });

    clock.advance(chain.challenge_period() + Duration::from_secs(1));
    chain.tx(|tx| {
        tx.confirm_for_ps_timer(honest_leaf)?;
        tx.confirm_for_win(first)?;
        tx.reject_for_loss(second)?;
        Ok::<_, ChainError>(())
    })?;

    chain.call(|tx| {
        assert_eq!(tx.latest_confirmed(), first);
        assert_eq!(
            tx.assertion(second).unwrap().status,
            AssertionStatus::Rejected
        );
        assert_eq!(
            tx.challenge(challenge).unwrap().winner_assertion,
            Some(first)
        );
        assert_eq!(
            tx.vertex(rival_leaf).unwrap().status,
            VertexStatus::Pending
        );
    });
    Ok(())
}

#[test]
fn bisection_game_narrows_to_the_divergence() {
    let (chain, clock) = funded_chain();
    let (honest, rival) = traces();

    let first = chain
        .tx(|tx| tx.create_assertion(0, StateCommitment::new(8, honest[8]), ALICE))
        .unwrap();
    clock.advance(Duration::from_secs(1));
    let (challenge, honest_leaf, rival_leaf) = chain.tx(|tx| {
        let second = tx
            .create_assertion(0, StateCommitment::new(8, rival[8]), BOB)
            .unwrap();
        let challenge = tx.create_succession_challenge(0).unwrap();
        let honest_leaf = tx
            .add_leaf(challenge, first, HistoryCommitment::new(&honest).unwrap(), ALICE)
            .unwrap();
        let rival_leaf = tx
            .add_leaf(challenge, second, HistoryCommitment::new(&rival).unwrap(), BOB)
            .unwrap();
        (challenge, honest_leaf, rival_leaf)
    });

    // Round one: the rival bisects to the shared height-4 prefix; the honest
    // mover lands on the same vertex and merges instead.
    let mid4 = chain.tx(|tx| {
        let mid4 = tx
            .bisect(
                rival_leaf,
                HistoryCommitment::new(&rival[..=4]).unwrap(),
                generate_prefix_proof(5, &rival).unwrap(),
                BOB,
            )
            .unwrap();
        assert_eq!(
            tx.bisect(
                honest_leaf,
                HistoryCommitment::new(&honest[..=4]).unwrap(),
                generate_prefix_proof(5, &honest).unwrap(),
                ALICE
            )
            .unwrap_err(),
            ChainError::VertexAlreadyExists
        );
        tx.merge(
            honest_leaf,
            mid4,
            generate_prefix_proof(5, &honest).unwrap(),
            ALICE,
        )
        .unwrap();
        mid4
    });

    // Round two: both leaves bisect from the shared midpoint to height 6,
    // where the traces already disagree.
    let (mid6_honest, mid6_rival) = chain.tx(|tx| {
        let mid6_honest = tx
            .bisect(
                honest_leaf,
                HistoryCommitment::new(&honest[..=6]).unwrap(),
                generate_prefix_proof(7, &honest).unwrap(),
                ALICE,
            )
            .unwrap();
        let mid6_rival = tx
            .bisect(
                rival_leaf,
                HistoryCommitment::new(&rival[..=6]).unwrap(),
                generate_prefix_proof(7, &rival).unwrap(),
                BOB,
            )
            .unwrap();
        (mid6_honest, mid6_rival)
    });

    chain.call(|tx| {
        // Graph shape: root -> mid4 -> {mid6_honest, mid6_rival} -> leaves.
        let root = tx.challenge(challenge).unwrap().root_vertex;
        assert_eq!(tx.vertex(root).unwrap().presumptive_successor, Some(mid4));
        assert_eq!(tx.vertex(mid4).unwrap().height(), 4);
        assert_eq!(tx.vertex(mid6_honest).unwrap().prev, Some(mid4));
        assert_eq!(tx.vertex(mid6_rival).unwrap().prev, Some(mid4));
        assert_eq!(tx.vertex(honest_leaf).unwrap().prev, Some(mid6_honest));
        assert_eq!(tx.vertex(rival_leaf).unwrap().prev, Some(mid6_rival));
        // The two height-6 vertices commit different histories.
        assert_ne!(
            tx.vertex(mid6_honest).unwrap().commitment.merkle,
            tx.vertex(mid6_rival).unwrap().commitment.merkle
        );
        // The earlier arrival at height 6 holds the presumptive role.
        assert_eq!(
            tx.vertex(mid4).unwrap().presumptive_successor,
            Some(mid6_honest)
        );
    });

    // The honest branch runs out the clock top-down and wins.
    clock.advance(chain.challenge_period() + Duration::from_secs(1));
    chain.tx(|tx| {
        tx.confirm_for_ps_timer(mid4).unwrap();
        tx.confirm_for_ps_timer(mid6_honest).unwrap();
        tx.confirm_for_ps_timer(honest_leaf).unwrap();
        tx.confirm_for_win(first).unwrap();
    });
    chain.call(|tx| {
        assert_eq!(tx.latest_confirmed(), first);
    });
}

#[test]
fn challenge_deadline_confirms_presumptive_successor() {
    let (chain, clock) = funded_chain();
    let (honest, rival) = traces();

    let first = chain
        .tx(|tx| tx.create_assertion(0, StateCommitment::new(8, honest[8]), ALICE))
        .unwrap();
    let (honest_leaf, _challenge) = chain.tx(|tx| {
        let second = tx
            .create_assertion(0, StateCommitment::new(8, rival[8]), BOB)
            .unwrap();
        let challenge = tx.create_succession_challenge(0).unwrap();
        let honest_leaf = tx
            .add_leaf(challenge, first, HistoryCommitment::new(&honest).unwrap(), ALICE)
            .unwrap();
        let _ = second;
        (honest_leaf, challenge)
    });

    // Exactly at the two-period deadline: not yet.
    clock.advance(chain.challenge_period() * 2);
    chain.tx(|tx| {
        assert_eq!(
            tx.confirm_for_challenge_deadline(honest_leaf).unwrap_err(),
            ChainError::NotYet
        );
    });

    clock.advance(Duration::from_secs(1));
    chain.tx(|tx| tx.confirm_for_challenge_deadline(honest_leaf)).unwrap();
    chain.call(|tx| {
        assert_eq!(
            tx.vertex(honest_leaf).unwrap().status,
            VertexStatus::Confirmed
        );
    });
}

#[test]
fn feeds_report_the_dispute_in_commit_order() {
    let (chain, clock) = funded_chain();
    let (honest, rival) = traces();

    let mut assertion_events = chain.assertion_events().subscribe();
    let mut confirmations = chain
        .challenge_events()
        .subscribe_with_filter(|event| matches!(event, ChallengeEvent::VertexConfirmed { .. }));

    let first = chain
        .tx(|tx| tx.create_assertion(0, StateCommitment::new(8, honest[8]), ALICE))
        .unwrap();
    clock.advance(Duration::from_secs(1));
    let (honest_leaf, _) = chain.tx(|tx| {
        let second = tx
            .create_assertion(0, StateCommitment::new(8, rival[8]), BOB)
            .unwrap();
        let challenge = tx.create_succession_challenge(0).unwrap();
        let honest_leaf = tx
            .add_leaf(challenge, first, HistoryCommitment::new(&honest).unwrap(), ALICE)
            .unwrap();
        let rival_leaf = tx
            .add_leaf(challenge, second, HistoryCommitment::new(&rival).unwrap(), BOB)
            .unwrap();
        (honest_leaf, rival_leaf)
    });

    clock.advance(chain.challenge_period() + Duration::from_secs(1));
    chain.tx(|tx| {
        tx.confirm_for_ps_timer(honest_leaf).unwrap();
        tx.confirm_for_win(first).unwrap();
    });

    // Assertion feed: two creations, the challenge start, the confirmation.
    assert!(matches!(
        assertion_events.try_recv(),
        Some(AssertionEvent::CreateLeaf { seq_num: 1, .. })
    ));
    assert!(matches!(
        assertion_events.try_recv(),
        Some(AssertionEvent::CreateLeaf { seq_num: 2, .. })
    ));
    assert!(matches!(
        assertion_events.try_recv(),
        Some(AssertionEvent::StartChallenge { parent_seq_num: 0, .. })
    ));
    assert!(matches!(
        assertion_events.try_recv(),
        Some(AssertionEvent::Confirm { seq_num: 1 })
    ));
    assert!(assertion_events.try_recv().is_none());

    // The filtered subscription saw only the vertex confirmation.
    assert!(matches!(
        confirmations.try_recv(),
        Some(ChallengeEvent::VertexConfirmed { .. })
    ));
    assert!(confirmations.try_recv().is_none());
}

#[test]
fn rejected_branches_cascade() {
    let (chain, clock) = funded_chain();
    let (honest, rival) = traces();

    // Bob builds a child on top of his losing assertion.
    let first = chain
        .tx(|tx| tx.create_assertion(0, StateCommitment::new(8, honest[8]), ALICE))
        .unwrap();
    clock.advance(Duration::from_secs(1));
    let (second, grandchild, honest_leaf) = chain.tx(|tx| {
        let second = tx
            .create_assertion(0, StateCommitment::new(8, rival[8]), BOB)
            .unwrap();
        let grandchild = tx
            .create_assertion(second, StateCommitment::new(9, state_leaf(1, 9)), BOB)
            .unwrap();
        let challenge = tx.create_succession_challenge(0).unwrap();
        let honest_leaf = tx
            .add_leaf(challenge, first, HistoryCommitment::new(&honest).unwrap(), ALICE)
            .unwrap();
        (second, grandchild, honest_leaf)
    });

    clock.advance(chain.challenge_period() + Duration::from_secs(1));
    chain.tx(|tx| {
        tx.confirm_for_ps_timer(honest_leaf).unwrap();
        tx.confirm_for_win(first).unwrap();
        tx.reject_for_loss(second).unwrap();
        // The descendant follows its predecessor down.
        tx.reject_for_prev(grandchild).unwrap();
    });

    chain.call(|tx| {
        assert_eq!(
            tx.assertion(second).unwrap().status,
            AssertionStatus::Rejected
        );
        assert_eq!(
            tx.assertion(grandchild).unwrap().status,
            AssertionStatus::Rejected
        );
        assert_eq!(tx.latest_confirmed(), first);
    });
}
