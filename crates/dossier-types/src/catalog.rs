//! Checklist reference data: phases, categories and check items.

use crate::{CategoryId, CheckItemId, Role};
use serde::{Deserialize, Serialize};

/// The checklist phase a category belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Budget Controller: nature of the operation
    CbTypeOperation,
    /// Budget Controller: substantive controls
    CbControlesFond,
    /// Ordering officer verifications
    Ordonnateur,
}

impl Phase {
    pub const ALL: [Phase; 3] = [
        Self::CbTypeOperation,
        Self::CbControlesFond,
        Self::Ordonnateur,
    ];

    pub fn stage(&self) -> ReviewStage {
        match self {
            Self::CbTypeOperation | Self::CbControlesFond => ReviewStage::Cb,
            Self::Ordonnateur => ReviewStage::Ordonnateur,
        }
    }

    /// The only role allowed to record validations for this phase
    pub fn owner(&self) -> Role {
        self.stage().owner()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CbTypeOperation => f.write_str("CB_TYPE_OPERATION"),
            Self::CbControlesFond => f.write_str("CB_CONTROLES_FOND"),
            Self::Ordonnateur => f.write_str("ORDONNATEUR"),
        }
    }
}

/// A reviewing role's whole checklist. The CB stage spans two phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStage {
    Cb,
    Ordonnateur,
}

impl ReviewStage {
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            Self::Cb => &[Phase::CbTypeOperation, Phase::CbControlesFond],
            Self::Ordonnateur => &[Phase::Ordonnateur],
        }
    }

    pub fn owner(&self) -> Role {
        match self {
            Self::Cb => Role::ControleurBudgetaire,
            Self::Ordonnateur => Role::Ordonnateur,
        }
    }
}

impl std::fmt::Display for ReviewStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cb => f.write_str("CB"),
            Self::Ordonnateur => f.write_str("ORDONNATEUR"),
        }
    }
}

/// A single checklist item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckItem {
    pub id: CheckItemId,
    pub nom: String,
}

impl CheckItem {
    pub fn new(id: impl Into<String>, nom: impl Into<String>) -> Self {
        Self {
            id: CheckItemId::new(id),
            nom: nom.into(),
        }
    }
}

/// An ordered group of check items reviewed during one phase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCategory {
    pub id: CategoryId,
    pub nom: String,
    pub phase: Phase,
    pub items: Vec<CheckItem>,
    /// The CB category this Ordonnateur category re-checks, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirrors: Option<CategoryId>,
}

impl ValidationCategory {
    pub fn new(id: impl Into<String>, nom: impl Into<String>, phase: Phase) -> Self {
        Self {
            id: CategoryId::new(id),
            nom: nom.into(),
            phase,
            items: Vec::new(),
            mirrors: None,
        }
    }

    pub fn with_item(mut self, id: impl Into<String>, nom: impl Into<String>) -> Self {
        self.items.push(CheckItem::new(id, nom));
        self
    }

    pub fn mirroring(mut self, category: impl Into<String>) -> Self {
        self.mirrors = Some(CategoryId::new(category));
        self
    }

    pub fn item(&self, id: &CheckItemId) -> Option<&CheckItem> {
        self.items.iter().find(|i| &i.id == id)
    }
}
