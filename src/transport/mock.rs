//! # Mock Publisher
//!
//! Utilities for testing the consumer without a broker.
//!
//! Queue up what each `publish` call should do, hand the mock to the code
//! under test, then call [`MockPublisher::verify`] to check every expectation
//! was used.
//!
//! ```ignore
//! let publisher = MockPublisher::new();
//! publisher.expect_publish().return_err(TransportError::Closed);
//! publisher.expect_publish().to("replies").return_ok();
//!
//! // run the consumer with `publisher`...
//! publisher.verify();
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Publisher, Publishing, TransportError};

enum Outcome {
    Ok,
    Err(TransportError),
    After(Duration),
}

/// One expected `publish` call.
struct Expectation {
    routing_key: Option<String>,
    outcome: Outcome,
}

type Expectations = Arc<Mutex<VecDeque<Expectation>>>;

/// A [`Publisher`] that answers from an expectation queue and records what
/// was published.
///
/// A `publish` call with no expectation left, or to a routing key other than
/// the expected one, panics.
#[derive(Clone, Default)]
pub struct MockPublisher {
    expectations: Expectations,
    published: Arc<Mutex<Vec<(String, Publishing)>>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects one more `publish` call.
    pub fn expect_publish(&self) -> PublishExpectationBuilder {
        PublishExpectationBuilder {
            routing_key: None,
            expectations: self.expectations.clone(),
        }
    }

    /// Everything published so far, successful or not, in call order.
    pub fn published(&self) -> Vec<(String, Publishing)> {
        lock(&self.published).clone()
    }

    /// Panics if any expectation was not used.
    pub fn verify(&self) {
        let remaining = lock(&self.expectations).len();
        if remaining != 0 {
            panic!("Not all publish expectations were met. {remaining} remaining");
        }
    }
}

/// Builder for `publish` expectations.
pub struct PublishExpectationBuilder {
    routing_key: Option<String>,
    expectations: Expectations,
}

impl PublishExpectationBuilder {
    /// Requires the call to target `routing_key`.
    pub fn to(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }

    pub fn return_ok(self) {
        self.push(Outcome::Ok);
    }

    pub fn return_err(self, error: TransportError) {
        self.push(Outcome::Err(error));
    }

    /// Succeeds after sleeping for `delay`, for exercising publish deadlines.
    pub fn return_after(self, delay: Duration) {
        self.push(Outcome::After(delay));
    }

    fn push(self, outcome: Outcome) {
        lock(&self.expectations).push_back(Expectation {
            routing_key: self.routing_key,
            outcome,
        });
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, routing_key: &str, publishing: Publishing) -> Result<(), TransportError> {
        let expectation = lock(&self.expectations).pop_front();
        lock(&self.published).push((routing_key.to_string(), publishing));

        let Some(expectation) = expectation else {
            panic!("Unexpected publish to {routing_key}");
        };
        if let Some(expected) = &expectation.routing_key {
            assert_eq!(expected, routing_key, "publish went to the wrong queue");
        }

        match expectation.outcome {
            Outcome::Ok => Ok(()),
            Outcome::Err(error) => Err(error),
            Outcome::After(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
