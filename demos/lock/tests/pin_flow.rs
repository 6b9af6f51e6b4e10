//! End-to-end tests for the lock screen on the engine
//!
//! Keypad commands in, display models and routes out, with the validator
//! called from middleware.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use automata_core::EffectError;
use automata_runtime::retry::RetryPolicy;
use automata_testing::helpers::{collect_for, next_within};
use automata_testing::mocks::CallCounter;
use futures::Stream;
use lock::{DisplayModel, LockEnvironment, LockScreen, LockState, PinValidation, Route, SecretPinValidator};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(1);

fn screen_with(validator: impl PinValidation + 'static, retry: RetryPolicy) -> LockScreen {
    let environment = LockEnvironment::builder()
        .validator(validator)
        .pin_length(4)
        .retry(retry)
        .build()
        .unwrap();
    LockScreen::new(&environment).unwrap()
}

fn screen() -> LockScreen {
    screen_with(SecretPinValidator::default(), RetryPolicy::none())
}

fn type_pin(screen: &LockScreen, pin: &[u8]) {
    for digit in pin {
        screen.tapped(*digit).unwrap();
    }
}

async fn wait_for_wrong_pin<S>(display: &mut S) -> DisplayModel
where
    S: Stream<Item = DisplayModel> + Unpin,
{
    loop {
        match next_within(display, WAIT).await {
            Some(model) if model.is_wrong_pin => return model,
            Some(_) => {},
            None => panic!("wrong PIN was never displayed"),
        }
    }
}

/// Fails with a transient error a fixed number of times, then checks the secret
struct FlakyValidator {
    failures: usize,
    calls: CallCounter,
    inner: SecretPinValidator,
}

impl PinValidation for FlakyValidator {
    fn validate(&self, pin: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<bool, EffectError>> + Send + '_>> {
        self.calls.hit();
        if self.calls.count() <= self.failures {
            Box::pin(async { Err(EffectError::Unavailable("keystore locked".to_string())) })
        } else {
            self.inner.validate(pin)
        }
    }
}

#[tokio::test]
async fn correct_pin_navigates_exactly_once() {
    let screen = screen();
    let mut route = screen.route();

    type_pin(&screen, &[1, 2, 3, 4]);

    assert_eq!(
        next_within(&mut route, WAIT).await,
        Some(Route::MainUi { from_lock: true })
    );
    assert!(collect_for(&mut route, Duration::from_millis(50)).await.is_empty());
    assert_eq!(screen.state(), LockState::Valid);
}

#[tokio::test]
async fn wrong_pin_shows_error_until_the_shake_finishes() {
    let screen = screen();
    let mut display = screen.display_model();
    let mut route = screen.route();

    type_pin(&screen, &[1, 2, 3, 5]);

    assert_eq!(
        wait_for_wrong_pin(&mut display).await,
        DisplayModel {
            current_pin_length: 4,
            is_wrong_pin: true,
        }
    );

    screen.finished_shake().unwrap();
    assert_eq!(
        next_within(&mut display, WAIT).await,
        Some(DisplayModel {
            current_pin_length: 0,
            is_wrong_pin: false,
        })
    );
    assert_eq!(screen.state(), LockState::Pin(vec![]));
    assert!(collect_for(&mut route, Duration::from_millis(20)).await.is_empty());
}

#[tokio::test]
async fn digits_after_a_wrong_pin_are_ignored() {
    let screen = screen();
    let mut display = screen.display_model();

    type_pin(&screen, &[9, 9, 9, 9]);
    wait_for_wrong_pin(&mut display).await;

    screen.tapped(1).unwrap();
    screen.tapped_clear_last_digit().unwrap();
    assert!(collect_for(&mut display, Duration::from_millis(50)).await.is_empty());
    assert_eq!(screen.state(), LockState::Invalid);
}

#[tokio::test]
async fn retry_after_reset_unlocks() {
    let screen = screen();
    let mut display = screen.display_model();
    let mut route = screen.route();

    type_pin(&screen, &[4, 3, 2, 1]);
    wait_for_wrong_pin(&mut display).await;
    screen.finished_shake().unwrap();
    type_pin(&screen, &[1, 2, 3, 4]);

    assert_eq!(
        next_within(&mut route, WAIT).await,
        Some(Route::MainUi { from_lock: true })
    );
}

#[tokio::test]
async fn display_counts_typed_digits() {
    let screen = screen();
    let mut display = screen.display_model();

    screen.tapped(1).unwrap();
    screen.tapped(2).unwrap();
    screen.tapped_clear_last_digit().unwrap();

    let lengths: Vec<usize> = collect_for(&mut display, Duration::from_millis(50))
        .await
        .into_iter()
        .map(|model| model.current_pin_length)
        .collect();
    assert_eq!(lengths, vec![0, 1, 2, 1]);
}

#[tokio::test]
async fn transient_validator_failures_are_retried() {
    let calls = CallCounter::new();
    let validator = FlakyValidator {
        failures: 2,
        calls: calls.clone(),
        inner: SecretPinValidator::default(),
    };
    let screen = screen_with(
        validator,
        RetryPolicy::default()
            .with_max_retries(3)
            .with_initial_delay(Duration::from_millis(1)),
    );
    let mut route = screen.route();

    type_pin(&screen, &[1, 2, 3, 4]);

    assert_eq!(
        next_within(&mut route, WAIT).await,
        Some(Route::MainUi { from_lock: true })
    );
    assert_eq!(calls.count(), 3);
}

#[tokio::test]
async fn unavailable_validator_rejects_the_pin() {
    let validator = FlakyValidator {
        failures: usize::MAX,
        calls: CallCounter::new(),
        inner: SecretPinValidator::default(),
    };
    let screen = screen_with(
        validator,
        RetryPolicy::default()
            .with_max_retries(1)
            .with_initial_delay(Duration::from_millis(1)),
    );
    let mut display = screen.display_model();

    type_pin(&screen, &[1, 2, 3, 4]);

    assert!(wait_for_wrong_pin(&mut display).await.is_wrong_pin);
    assert_eq!(screen.state(), LockState::Invalid);
}

#[tokio::test]
async fn teardown_rejects_further_input() {
    let screen = screen();
    screen.engine().shutdown();

    assert!(screen.tapped(1).is_err());
}
