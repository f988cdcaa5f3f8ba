//! Scripted simulation scenarios.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
///
/// Operation steps carry an optional `expect_error` code; when set, the step
/// passes only if the operation fails with that code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Mint value into an account.
    Fund { account: String, amount: u64 },
    /// Open a stream.
    Create {
        sender: String,
        receiver: String,
        amount: u64,
        duration: u64,
        #[serde(default)]
        expect_error: Option<String>,
    },
    /// Receiver accepts a stream.
    Accept {
        receiver: String,
        sender: String,
        #[serde(default)]
        expect_error: Option<String>,
    },
    /// Receiver claims vested value.
    Claim {
        receiver: String,
        sender: String,
        #[serde(default)]
        expect_paid: Option<u64>,
        #[serde(default)]
        expect_error: Option<String>,
    },
    /// Either party cancels.
    Cancel {
        caller: String,
        sender: String,
        receiver: String,
        #[serde(default)]
        expect_error: Option<String>,
    },
    /// Move the ledger clock forward.
    Advance { seconds: u64 },
    /// Assert an account balance.
    ExpectBalance { account: String, amount: u64 },
    /// Assert that no value was created or destroyed.
    ExpectConserved,
}

impl Scenario {
    /// Load a built-in scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "basic-stream" => Ok(Self::basic_stream()),
            "cancel-pending" => Ok(Self::cancel_pending()),
            "cancel-active" => Ok(Self::cancel_active()),
            "double-accept" => Ok(Self::double_accept()),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (available: {})",
                name,
                Self::builtin_names().join(", ")
            )),
        }
    }

    /// Load a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Names of the built-in scenarios.
    pub fn builtin_names() -> &'static [&'static str] {
        &["basic-stream", "cancel-pending", "cancel-active", "double-accept"]
    }

    /// Create, accept and claim a stream to completion.
    fn basic_stream() -> Self {
        Self {
            name: "basic-stream".to_string(),
            description: "Linear vesting claimed in two steps".to_string(),
            steps: vec![
                fund("alice", 1000),
                create("alice", "bob", 1000, 100),
                ScenarioStep::ExpectBalance {
                    account: "alice".to_string(),
                    amount: 0,
                },
                ScenarioStep::Claim {
                    receiver: "bob".to_string(),
                    sender: "alice".to_string(),
                    expect_paid: None,
                    expect_error: Some("STREAM_NOT_ACTIVE".to_string()),
                },
                accept("bob", "alice"),
                ScenarioStep::Advance { seconds: 50 },
                claim("bob", "alice", 500),
                claim("bob", "alice", 0),
                ScenarioStep::Advance { seconds: 100 },
                claim("bob", "alice", 500),
                ScenarioStep::ExpectBalance {
                    account: "bob".to_string(),
                    amount: 1000,
                },
                ScenarioStep::ExpectConserved,
            ],
        }
    }

    /// Cancelling before acceptance refunds everything.
    fn cancel_pending() -> Self {
        Self {
            name: "cancel-pending".to_string(),
            description: "Sender gets the full deposit back from a pending stream".to_string(),
            steps: vec![
                fund("alice", 1000),
                create("alice", "bob", 1000, 100),
                ScenarioStep::Advance { seconds: 1_000 },
                ScenarioStep::Cancel {
                    caller: "carol".to_string(),
                    sender: "alice".to_string(),
                    receiver: "bob".to_string(),
                    expect_error: Some("NOT_PARTICIPANT".to_string()),
                },
                cancel("bob", "alice", "bob"),
                ScenarioStep::ExpectBalance {
                    account: "alice".to_string(),
                    amount: 1000,
                },
                ScenarioStep::ExpectBalance {
                    account: "bob".to_string(),
                    amount: 0,
                },
                ScenarioStep::ExpectConserved,
            ],
        }
    }

    /// Cancelling mid-stream splits vested and unvested value.
    fn cancel_active() -> Self {
        Self {
            name: "cancel-active".to_string(),
            description: "Sender cancels an active stream after a partial claim".to_string(),
            steps: vec![
                fund("alice", 1000),
                create("alice", "bob", 1000, 100),
                accept("bob", "alice"),
                ScenarioStep::Advance { seconds: 20 },
                claim("bob", "alice", 200),
                ScenarioStep::Advance { seconds: 30 },
                cancel("alice", "alice", "bob"),
                ScenarioStep::ExpectBalance {
                    account: "alice".to_string(),
                    amount: 500,
                },
                ScenarioStep::ExpectBalance {
                    account: "bob".to_string(),
                    amount: 500,
                },
                ScenarioStep::ExpectConserved,
            ],
        }
    }

    /// A stream can only be accepted once, and only by its receiver.
    fn double_accept() -> Self {
        Self {
            name: "double-accept".to_string(),
            description: "Second accept and foreign accept are rejected".to_string(),
            steps: vec![
                fund("alice", 500),
                create("alice", "bob", 500, 10),
                ScenarioStep::Accept {
                    receiver: "carol".to_string(),
                    sender: "alice".to_string(),
                    expect_error: Some("STREAM_NOT_FOUND".to_string()),
                },
                accept("bob", "alice"),
                ScenarioStep::Accept {
                    receiver: "bob".to_string(),
                    sender: "alice".to_string(),
                    expect_error: Some("STREAM_ALREADY_ACTIVE".to_string()),
                },
                ScenarioStep::Create {
                    sender: "alice".to_string(),
                    receiver: "bob".to_string(),
                    amount: 1,
                    duration: 1,
                    expect_error: Some("STREAM_ALREADY_EXISTS".to_string()),
                },
                ScenarioStep::ExpectConserved,
            ],
        }
    }
}

fn fund(account: &str, amount: u64) -> ScenarioStep {
    ScenarioStep::Fund {
        account: account.to_string(),
        amount,
    }
}

fn create(sender: &str, receiver: &str, amount: u64, duration: u64) -> ScenarioStep {
    ScenarioStep::Create {
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        amount,
        duration,
        expect_error: None,
    }
}

fn accept(receiver: &str, sender: &str) -> ScenarioStep {
    ScenarioStep::Accept {
        receiver: receiver.to_string(),
        sender: sender.to_string(),
        expect_error: None,
    }
}

fn claim(receiver: &str, sender: &str, paid: u64) -> ScenarioStep {
    ScenarioStep::Claim {
        receiver: receiver.to_string(),
        sender: sender.to_string(),
        expect_paid: Some(paid),
        expect_error: None,
    }
}

fn cancel(caller: &str, sender: &str, receiver: &str) -> ScenarioStep {
    ScenarioStep::Cancel {
        caller: caller.to_string(),
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        expect_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_load() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(&scenario.name, name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::load("nope").is_err());
    }

    #[test]
    fn test_step_json_format() {
        let json = r#"{"step":"claim","receiver":"bob","sender":"alice","expect_paid":5}"#;
        let step: ScenarioStep = serde_json::from_str(json).unwrap();

        match step {
            ScenarioStep::Claim {
                expect_paid,
                expect_error,
                ..
            } => {
                assert_eq!(expect_paid, Some(5));
                assert!(expect_error.is_none());
            }
            other => panic!("unexpected step {:?}", other),
        }
    }
}
