//! Validation catalog: the read-only checklist reference data
//!
//! The catalog lists, per [`Phase`], the ordered categories and check items a
//! reviewing role must tick. It is built once (from the built-in default or
//! from configuration) and shared immutably by the ledger, the evaluator and
//! the reconciliation engine.

use dossier_types::{
    CatalogError, CategoryId, CheckItem, CheckItemId, Phase, ReviewStage, ValidationCategory,
};
use std::collections::HashSet;

/// Immutable, validated set of checklist categories
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationCatalog {
    categories: Vec<ValidationCategory>,
}

impl ValidationCatalog {
    /// Build a catalog, rejecting duplicate ids, empty categories, dangling
    /// mirror references and phases without any category.
    pub fn new(categories: Vec<ValidationCategory>) -> Result<Self, CatalogError> {
        let mut category_ids = HashSet::new();
        let mut item_ids = HashSet::new();

        for category in &categories {
            if !category_ids.insert(category.id.clone()) {
                return Err(CatalogError::DuplicateCategory(category.id.0.clone()));
            }
            if category.items.is_empty() {
                return Err(CatalogError::EmptyCategory(category.id.0.clone()));
            }
            for item in &category.items {
                if !item_ids.insert(item.id.clone()) {
                    return Err(CatalogError::DuplicateItem(item.id.0.clone()));
                }
            }
        }

        for category in &categories {
            let Some(target) = &category.mirrors else {
                continue;
            };
            let valid = category.phase == Phase::Ordonnateur
                && categories
                    .iter()
                    .any(|c| &c.id == target && c.phase.stage() == ReviewStage::Cb);
            if !valid {
                return Err(CatalogError::InvalidMirror {
                    category: category.id.0.clone(),
                    target: target.0.clone(),
                });
            }
        }

        for phase in Phase::ALL {
            if !categories.iter().any(|c| c.phase == phase) {
                return Err(CatalogError::MissingPhase(phase.to_string()));
            }
        }

        Ok(Self { categories })
    }

    /// All categories in catalog order
    pub fn categories(&self) -> &[ValidationCategory] {
        &self.categories
    }

    /// Categories of one phase, in catalog order
    pub fn categories_for(&self, phase: Phase) -> impl Iterator<Item = &ValidationCategory> {
        self.categories.iter().filter(move |c| c.phase == phase)
    }

    /// Categories of every phase of a stage, in catalog order
    pub fn categories_for_stage(
        &self,
        stage: ReviewStage,
    ) -> impl Iterator<Item = &ValidationCategory> {
        self.categories
            .iter()
            .filter(move |c| c.phase.stage() == stage)
    }

    pub fn category(&self, id: &CategoryId) -> Option<&ValidationCategory> {
        self.categories.iter().find(|c| &c.id == id)
    }

    /// Look up an item within a specific category
    pub fn item(&self, category: &CategoryId, item: &CheckItemId) -> Option<&CheckItem> {
        self.category(category).and_then(|c| c.item(item))
    }

    /// Required items of a stage, paired with their category
    pub fn required_items(
        &self,
        stage: ReviewStage,
    ) -> Vec<(&ValidationCategory, &CheckItem)> {
        self.categories_for_stage(stage)
            .flat_map(|c| c.items.iter().map(move |i| (c, i)))
            .collect()
    }

    /// Ordonnateur categories paired with the CB category they mirror
    pub fn mirror_pairs(&self) -> Vec<(&ValidationCategory, &ValidationCategory)> {
        self.categories_for(Phase::Ordonnateur)
            .filter_map(|ordo| {
                let target = ordo.mirrors.as_ref()?;
                self.category(target).map(|cb| (cb, ordo))
            })
            .collect()
    }

    pub fn item_count(&self, stage: ReviewStage) -> usize {
        self.categories_for_stage(stage).map(|c| c.items.len()).sum()
    }
}

impl Default for ValidationCatalog {
    /// The standard ACGE checklist
    fn default() -> Self {
        Self {
            categories: default_categories(),
        }
    }
}

/// Built-in checklist used when configuration does not override it
pub fn default_categories() -> Vec<ValidationCategory> {
    vec![
        ValidationCategory::new("type-operation", "Type d'opération", Phase::CbTypeOperation)
            .with_item("nature-depense", "Nature de la dépense")
            .with_item("imputation-budgetaire", "Imputation budgétaire"),
        ValidationCategory::new("controles-fond", "Contrôles de fond", Phase::CbControlesFond)
            .with_item("disponibilite-credits", "Disponibilité des crédits")
            .with_item("exactitude-montant", "Exactitude du montant")
            .with_item("pieces-justificatives", "Pièces justificatives"),
        ValidationCategory::new(
            "controles-ordonnateur",
            "Contrôles ordonnateur",
            Phase::Ordonnateur,
        )
        .mirroring("controles-fond")
        .with_item("ordo-disponibilite-credits", "Disponibilité des crédits")
        .with_item("ordo-exactitude-montant", "Exactitude du montant")
        .with_item("ordo-pieces-justificatives", "Pièces justificatives"),
        ValidationCategory::new("service-fait", "Service fait", Phase::Ordonnateur)
            .with_item("attestation-service-fait", "Attestation du service fait"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = ValidationCatalog::new(default_categories()).unwrap();
        assert_eq!(catalog, ValidationCatalog::default());
        assert_eq!(catalog.item_count(ReviewStage::Cb), 5);
        assert_eq!(catalog.item_count(ReviewStage::Ordonnateur), 4);
    }

    #[test]
    fn test_required_items_follow_catalog_order() {
        let catalog = ValidationCatalog::default();
        let names: Vec<_> = catalog
            .required_items(ReviewStage::Cb)
            .into_iter()
            .map(|(_, i)| i.nom.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "Nature de la dépense",
                "Imputation budgétaire",
                "Disponibilité des crédits",
                "Exactitude du montant",
                "Pièces justificatives",
            ]
        );
    }

    #[test]
    fn test_mirror_pairs() {
        let catalog = ValidationCatalog::default();
        let pairs = catalog.mirror_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.id, CategoryId::new("controles-fond"));
        assert_eq!(pairs[0].1.id, CategoryId::new("controles-ordonnateur"));
    }

    #[test]
    fn test_item_lookup_is_scoped_to_category() {
        let catalog = ValidationCatalog::default();
        let cat = CategoryId::new("type-operation");
        assert!(catalog
            .item(&cat, &CheckItemId::new("nature-depense"))
            .is_some());
        assert!(catalog
            .item(&cat, &CheckItemId::new("exactitude-montant"))
            .is_none());
    }

    #[test]
    fn test_rejects_duplicate_items() {
        let mut categories = default_categories();
        categories[1].items.push(CheckItem::new("nature-depense", "Doublon"));
        assert!(matches!(
            ValidationCatalog::new(categories),
            Err(CatalogError::DuplicateItem(id)) if id == "nature-depense"
        ));
    }

    #[test]
    fn test_rejects_mirror_to_ordonnateur_category() {
        let mut categories = default_categories();
        categories[2].mirrors = Some(CategoryId::new("service-fait"));
        assert!(matches!(
            ValidationCatalog::new(categories),
            Err(CatalogError::InvalidMirror { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_phase() {
        let categories: Vec<_> = default_categories()
            .into_iter()
            .filter(|c| c.phase != Phase::CbTypeOperation)
            .collect();
        assert!(matches!(
            ValidationCatalog::new(categories),
            Err(CatalogError::MissingPhase(_))
        ));
    }
}
