// Queue Domain Model

use serde::{Deserialize, Serialize};

/// Order in which pending jobs are claimed.
///
/// `Lifo` serves the most recent submission first; older jobs can starve under
/// sustained load. `Fifo` is an explicit opt-in for fairness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    #[default]
    Lifo,
    Fifo,
}

impl std::fmt::Display for QueueOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueOrder::Lifo => write!(f, "lifo"),
            QueueOrder::Fifo => write!(f, "fifo"),
        }
    }
}

impl std::str::FromStr for QueueOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lifo" => Ok(QueueOrder::Lifo),
            "fifo" => Ok(QueueOrder::Fifo),
            other => Err(format!("unknown queue order '{}' (expected lifo or fifo)", other)),
        }
    }
}
