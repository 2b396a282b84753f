//! Agent roles.
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{Index, IndexMut},
};

/// One of the two agents in the pursuit game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum AgentRole {
    /// The agent being chased.
    Player,

    /// The agent chasing the player.
    Pursuer,
}

impl AgentRole {
    /// Both roles, in the order the environment expects actions.
    pub const ALL: [AgentRole; 2] = [AgentRole::Player, AgentRole::Pursuer];

    /// Key used in records and checkpoint file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Pursuer => "pursuer",
        }
    }

    /// The other agent.
    pub fn partner(&self) -> Self {
        match self {
            Self::Player => Self::Pursuer,
            Self::Pursuer => Self::Player,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value for each agent, selected by [`AgentRole`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentMap<T> {
    /// Value of the player.
    pub player: T,

    /// Value of the pursuer.
    pub pursuer: T,
}

impl<T> AgentMap<T> {
    /// Builds a map from the values of both agents.
    pub fn new(player: T, pursuer: T) -> Self {
        Self { player, pursuer }
    }

    /// Builds a map by calling `f` for each role.
    pub fn from_fn(mut f: impl FnMut(AgentRole) -> T) -> Self {
        Self {
            player: f(AgentRole::Player),
            pursuer: f(AgentRole::Pursuer),
        }
    }

    /// Applies `f` to both values.
    pub fn map<U>(self, mut f: impl FnMut(AgentRole, T) -> U) -> AgentMap<U> {
        AgentMap {
            player: f(AgentRole::Player, self.player),
            pursuer: f(AgentRole::Pursuer, self.pursuer),
        }
    }

    /// Returns a map of references.
    pub fn as_ref(&self) -> AgentMap<&T> {
        AgentMap {
            player: &self.player,
            pursuer: &self.pursuer,
        }
    }

    /// Returns the value of `role` and the value of its partner, the former mutably.
    pub fn split_mut(&mut self, role: AgentRole) -> (&mut T, &T) {
        match role {
            AgentRole::Player => (&mut self.player, &self.pursuer),
            AgentRole::Pursuer => (&mut self.pursuer, &self.player),
        }
    }

    /// Iterates over `(role, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (AgentRole, &T)> {
        [
            (AgentRole::Player, &self.player),
            (AgentRole::Pursuer, &self.pursuer),
        ]
        .into_iter()
    }
}

impl<T> Index<AgentRole> for AgentMap<T> {
    type Output = T;

    fn index(&self, role: AgentRole) -> &T {
        match role {
            AgentRole::Player => &self.player,
            AgentRole::Pursuer => &self.pursuer,
        }
    }
}

impl<T> IndexMut<AgentRole> for AgentMap<T> {
    fn index_mut(&mut self, role: AgentRole) -> &mut T {
        match role {
            AgentRole::Player => &mut self.player,
            AgentRole::Pursuer => &mut self.pursuer,
        }
    }
}
