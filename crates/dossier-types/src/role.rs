//! Workflow roles and caller identity.

use crate::UserId;
use serde::{Deserialize, Serialize};

/// The four roles a dossier passes through
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Author of the dossier
    Secretaire,
    /// Contrôleur Budgétaire (CB), first approval gate
    #[serde(rename = "CB")]
    ControleurBudgetaire,
    /// Ordering officer, second approval gate
    Ordonnateur,
    /// Agent Comptable (AC), final settlement authority
    #[serde(rename = "AC")]
    AgentComptable,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secretaire => "SECRETAIRE",
            Self::ControleurBudgetaire => "CB",
            Self::Ordonnateur => "ORDONNATEUR",
            Self::AgentComptable => "AC",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller: identity plus the role resolved by the authentication layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role,
        }
    }

    pub fn secretaire(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Secretaire)
    }

    pub fn cb(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::ControleurBudgetaire)
    }

    pub fn ordonnateur(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Ordonnateur)
    }

    pub fn agent_comptable(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::AgentComptable)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.user_id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(
            serde_json::to_string(&Role::ControleurBudgetaire).unwrap(),
            "\"CB\""
        );
        assert_eq!(
            serde_json::to_string(&Role::Secretaire).unwrap(),
            "\"SECRETAIRE\""
        );
        let role: Role = serde_json::from_str("\"AC\"").unwrap();
        assert_eq!(role, Role::AgentComptable);
    }

    #[test]
    fn test_actor_constructors() {
        let actor = Actor::ordonnateur("ordo-1");
        assert!(actor.has_role(Role::Ordonnateur));
        assert_eq!(actor.to_string(), "ordo-1 (ORDONNATEUR)");
    }
}
