//! Integration tests for Store action broadcasting
//!
//! Observers wait on actions produced by effects, the way a booking UI waits
//! for the outcome of a submission.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use seatflow_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use seatflow_runtime::{Store, StoreError};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum HoldAction {
    /// Ask a remote arbiter to hold seats
    RequestHold { id: u64, seats: u32 },
    /// Arbiter progress
    HoldStep { id: u64, step: u32 },
    /// Terminal success
    HoldGranted { id: u64 },
    /// Terminal failure
    HoldRefused { id: u64, reason: String },
}

#[derive(Debug, Clone, Default)]
struct HoldState {
    steps: Vec<u32>,
    granted: Vec<u64>,
    refused: Vec<u64>,
}

#[derive(Clone)]
struct HoldReducer;

impl Reducer for HoldReducer {
    type State = HoldState;
    type Action = HoldAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            HoldAction::RequestHold { id, seats } => {
                if seats == 0 {
                    return smallvec![Effect::future(async move {
                        Some(HoldAction::HoldRefused {
                            id,
                            reason: "nothing to hold".to_string(),
                        })
                    })];
                }
                smallvec![Effect::future(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Some(HoldAction::HoldStep { id, step: 1 })
                })]
            },
            HoldAction::HoldStep { id, step } => {
                state.steps.push(step);
                if step < 3 {
                    smallvec![Effect::future(async move {
                        Some(HoldAction::HoldStep { id, step: step + 1 })
                    })]
                } else {
                    smallvec![Effect::Delay {
                        duration: Duration::from_millis(5),
                        action: Box::new(HoldAction::HoldGranted { id }),
                    }]
                }
            },
            HoldAction::HoldGranted { id } => {
                state.granted.push(id);
                smallvec![Effect::None]
            },
            HoldAction::HoldRefused { id, .. } => {
                state.refused.push(id);
                smallvec![Effect::None]
            },
        }
    }
}

fn store() -> Store<HoldState, HoldAction, (), HoldReducer> {
    Store::new(HoldState::default(), HoldReducer, ())
}

const fn is_terminal(action: &HoldAction) -> bool {
    matches!(
        action,
        HoldAction::HoldGranted { .. } | HoldAction::HoldRefused { .. }
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_wait_for_terminal_action_across_a_chain() {
    let store = store();

    let result = store
        .send_and_wait_for(
            HoldAction::RequestHold { id: 1, seats: 2 },
            is_terminal,
            Duration::from_secs(1),
        )
        .await;

    assert_eq!(assert_ok!(result), HoldAction::HoldGranted { id: 1 });
    // Feedback actions are reduced before they are broadcast.
    assert_eq!(store.state(|s| s.granted.clone()).await, vec![1]);
    assert_eq!(store.state(|s| s.steps.clone()).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_refusal_is_observed_as_terminal() {
    let store = store();

    let result = store
        .send_and_wait_for(
            HoldAction::RequestHold { id: 2, seats: 0 },
            is_terminal,
            Duration::from_secs(1),
        )
        .await;

    match assert_ok!(result) {
        HoldAction::HoldRefused { id, reason } => {
            assert_eq!(id, 2);
            assert_eq!(reason, "nothing to hold");
        },
        other => panic!("unexpected action {other:?}"),
    }
    assert_eq!(store.state(|s| s.refused.clone()).await, vec![2]);
}

#[tokio::test]
async fn test_initial_actions_are_not_broadcast() {
    let store = store();
    let mut rx = store.subscribe_actions();

    store
        .send(HoldAction::HoldGranted { id: 3 })
        .await
        .unwrap();

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_concurrent_subscribers_see_the_same_actions() {
    let store = store();
    let mut first = store.subscribe_actions();
    let mut second = store.subscribe_actions();

    let _ = store
        .send_and_wait_for(
            HoldAction::RequestHold { id: 4, seats: 1 },
            is_terminal,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut seen_first = Vec::new();
    while let Ok(action) = first.try_recv() {
        seen_first.push(action);
    }
    let mut seen_second = Vec::new();
    while let Ok(action) = second.try_recv() {
        seen_second.push(action);
    }

    assert_eq!(seen_first.len(), 4);
    assert_eq!(seen_first, seen_second);
}

#[tokio::test]
async fn test_wait_times_out_without_terminal_action() {
    let store = store();

    let result = store
        .send_and_wait_for(
            HoldAction::HoldStep { id: 5, step: 10 },
            |a| matches!(a, HoldAction::HoldRefused { .. }),
            Duration::from_millis(50),
        )
        .await;

    assert!(matches!(assert_err!(result), StoreError::Timeout));
}
