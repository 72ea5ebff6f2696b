use std::fmt;

use serde::{de, Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

/// Participant identifier. Agents are ordered by name so that coalitions
/// have a canonical agent order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Agent(String);

impl Agent {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "agent name must not be empty");
        Agent(name)
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Agent {
    fn from(name: &str) -> Self {
        Agent::new(name)
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-empty set of agents in canonical form: sorted by name and
/// deduplicated. Two coalitions are equal iff their canonical forms
/// coincide, so the derived equality and hash are the set equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Coalition {
    agents: SmallVec<[Agent; 4]>,
}

impl Coalition {
    /// Builds the canonical form of the given agents.
    ///
    /// Panics if the collection is empty: an empty coalition is a
    /// programmer error, not a recoverable condition.
    pub fn new<I>(agents: I) -> Self
    where
        I: IntoIterator<Item = Agent>,
    {
        let mut agents: SmallVec<[Agent; 4]> = agents.into_iter().collect();
        agents.sort();
        agents.dedup();
        assert!(!agents.is_empty(), "coalition must not be empty");
        Coalition { agents }
    }

    /// The single-agent coalition, as used by the `K_a` sugar.
    pub fn solo(agent: Agent) -> Self {
        Coalition {
            agents: smallvec![agent],
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn size(&self) -> usize {
        self.agents.len()
    }

    pub fn contains(&self, agent: &Agent) -> bool {
        self.agents.binary_search(agent).is_ok()
    }

    pub fn is_subset_of(&self, other: &Coalition) -> bool {
        self.agents.iter().all(|a| other.contains(a))
    }

    pub fn intersects(&self, other: &Coalition) -> bool {
        self.agents.iter().any(|a| other.contains(a))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Agent> {
        self.agents.iter()
    }
}

impl fmt::Display for Coalition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, agent) in self.agents.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", agent)?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for Coalition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let agents = Vec::<Agent>::deserialize(deserializer)?;
        if agents.is_empty() {
            return Err(de::Error::invalid_length(0, &"a non-empty list of agents"));
        }
        Ok(Coalition::new(agents))
    }
}
