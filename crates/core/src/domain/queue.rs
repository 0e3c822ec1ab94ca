// Queue Domain Model

use super::error::{DomainError, Result};

/// Queue identifier
pub type QueueName = String;

/// Largest weight a single queue may carry (one rotation slot per unit)
pub const MAX_QUEUE_WEIGHT: usize = 1000;

/// Static queue configuration: a name and how many rotation slots it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: QueueName,
    pub weight: usize,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, weight: usize) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }

    /// Parse a comma separated queue list
    ///
    /// Each entry is `name` (weight 1) or `name:weight`.
    ///
    /// # Example
    /// ```text
    /// let queues = QueueConfig::parse_list("default:3,low")?;
    /// assert_eq!(queues[0].weight, 3);
    /// ```
    pub fn parse_list(input: &str) -> Result<Vec<QueueConfig>> {
        let mut queues = Vec::new();

        for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, weight) = match entry.split_once(':') {
                Some((name, raw_weight)) => {
                    let weight = raw_weight.trim().parse::<usize>().map_err(|_| {
                        DomainError::InvalidWeight {
                            queue: name.trim().to_string(),
                            weight: raw_weight.trim().to_string(),
                        }
                    })?;
                    (name.trim(), weight)
                }
                None => (entry, 1),
            };

            let config = QueueConfig::new(name, weight);
            config.validate()?;
            queues.push(config);
        }

        if queues.is_empty() {
            return Err(DomainError::EmptyQueueList);
        }
        Ok(queues)
    }

    pub fn validate(&self) -> Result<()> {
        validate_queue_name(&self.name)?;
        if self.weight == 0 || self.weight > MAX_QUEUE_WEIGHT {
            return Err(DomainError::InvalidWeight {
                queue: self.name.clone(),
                weight: self.weight.to_string(),
            });
        }
        Ok(())
    }
}

/// Expand weighted queue configs into the repetition-encoded list
///
/// `[default:3, low:1]` becomes `["default", "default", "default", "low"]`.
pub fn expand_weights(queues: &[QueueConfig]) -> Vec<QueueName> {
    queues
        .iter()
        .flat_map(|q| std::iter::repeat(q.name.clone()).take(q.weight))
        .collect()
}

pub(crate) fn validate_queue_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.trim() != name {
        return Err(DomainError::InvalidQueueName(name.to_string()));
    }
    Ok(())
}
