//! Line item drafts
//!
//! A draft is the editable copy of a line item. It keeps the formula
//! editor alongside the quantity so the saved quantity always comes from
//! the saved formula, or from a manual entry with no formula at all.

use orca_core::{ItemId, LineItem, Number, OrcaError, Settings, StageId, Variable};
use orca_formula::{Evaluator, FormulaEditor};
use orca_stages::StageTree;
use orca_store::{Catalog, CatalogEntry, NewLineItem};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ItemDraft {
    id: Option<ItemId>,
    composition_code: String,
    description: String,
    unit: String,
    unit_price: Number,
    quantity: Number,
    stage_id: Option<StageId>,
    /// Formula the quantity was last applied from
    formula: Option<String>,
    editor: FormulaEditor,
    settings: Settings,
}

impl ItemDraft {
    /// New item priced from the catalog, with no quantity yet
    pub fn from_catalog(entry: &CatalogEntry, settings: &Settings) -> Self {
        Self {
            id: None,
            composition_code: entry.code.clone(),
            description: entry.description.clone(),
            unit: entry.unit.clone(),
            unit_price: entry.unit_price.clone(),
            quantity: Number::zero(),
            stage_id: None,
            formula: None,
            editor: FormulaEditor::new(settings),
            settings: settings.clone(),
        }
    }

    /// Reopen a stored item. A blank stored formula means a manual quantity.
    pub fn from_item(item: &LineItem, settings: &Settings) -> Self {
        let formula = item.formula.clone().filter(|f| !f.trim().is_empty());
        let editor = FormulaEditor::open(formula.as_deref(), item.variables.clone(), &item.quantity, settings);
        Self {
            id: Some(item.id.clone()),
            composition_code: item.composition_code.clone(),
            description: item.description.clone(),
            unit: item.unit.clone(),
            unit_price: item.unit_price.clone(),
            quantity: item.quantity.clone(),
            stage_id: item.stage_id.clone(),
            formula,
            editor,
            settings: settings.clone(),
        }
    }

    pub fn id(&self) -> Option<&ItemId> {
        self.id.as_ref()
    }

    pub fn composition_code(&self) -> &str {
        &self.composition_code
    }

    /// Quantity as last applied or typed. Variable edits made since then
    /// show up in `saved_quantity`, not here.
    pub fn quantity(&self) -> &Number {
        &self.quantity
    }

    /// Quantity `to_record` would store: the formula evaluated under the
    /// current variables, or the manual quantity when there is no formula.
    pub fn saved_quantity(&self) -> Result<Number, OrcaError> {
        match &self.formula {
            Some(formula) => Evaluator::new(self.settings.clone())
                .evaluate(formula, &self.editor.variables().bindings()),
            None => Ok(self.quantity.clone()),
        }
    }

    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn stage_id(&self) -> Option<&StageId> {
        self.stage_id.as_ref()
    }

    pub fn set_stage(&mut self, stage: Option<StageId>) {
        self.stage_id = stage;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Type a quantity by hand. The formula no longer describes it and is
    /// dropped; the variables stay in the editor for later use.
    pub fn set_quantity(&mut self, quantity: Number) {
        if self.formula.take().is_some() {
            debug!(item = ?self.id, "manual quantity replaces formula");
        }
        self.editor.set_formula(quantity.to_plain_string());
        self.quantity = quantity;
    }

    pub fn editor(&self) -> &FormulaEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut FormulaEditor {
        &mut self.editor
    }

    /// Take the editor's result as the quantity
    pub fn apply_formula(&mut self) -> Result<&Number, OrcaError> {
        let applied = self.editor.apply()?;
        self.quantity = applied.quantity;
        self.formula = Some(applied.formula);
        Ok(&self.quantity)
    }

    pub fn variables(&self) -> &[Variable] {
        self.editor.variables().as_slice()
    }

    /// Check the draft against the current tree and produce the record to
    /// store. The formula is evaluated again so the stored quantity matches
    /// it under the variables being stored with it.
    pub fn to_record(&self, tree: &StageTree) -> Result<NewLineItem, OrcaError> {
        let quantity = self.saved_quantity()?;
        let variables = match &self.formula {
            Some(_) => self.variables().to_vec(),
            None => Vec::new(),
        };

        if !quantity.is_positive() {
            return Err(OrcaError::InvalidQuantity(quantity));
        }
        if let Some(stage) = &self.stage_id {
            if !tree.contains(stage) {
                return Err(OrcaError::StageNotFound(stage.clone()));
            }
        }

        Ok(NewLineItem {
            composition_code: self.composition_code.clone(),
            description: self.description.clone(),
            unit: self.unit.clone(),
            unit_price: self.unit_price.clone(),
            quantity,
            stage_id: self.stage_id.clone(),
            formula: self.formula.clone(),
            variables,
        })
    }
}

/// Catalog lookup for the item picker. A blank term matches nothing and
/// never reaches the backend.
pub async fn search_catalog<C>(catalog: &C, term: &str) -> Result<Vec<CatalogEntry>, OrcaError>
where
    C: Catalog + ?Sized,
{
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    Ok(catalog.search(term).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::StageNode;

    fn num(s: &str) -> Number {
        Number::from_str(s).unwrap()
    }

    fn entry() -> CatalogEntry {
        CatalogEntry {
            code: "96995".to_string(),
            description: "Reaterro manual de valas".to_string(),
            unit: "m3".to_string(),
            unit_price: num("45,10"),
        }
    }

    fn tree() -> StageTree {
        StageTree::from_nodes(vec![StageNode {
            id: StageId::new("fundacao"),
            name: "Fundação".to_string(),
            parent_id: None,
            order: 0,
        }])
    }

    #[test]
    fn test_catalog_draft_needs_quantity() {
        let draft = ItemDraft::from_catalog(&entry(), &Settings::default());
        assert_eq!(draft.composition_code(), "96995");
        let err = draft.to_record(&tree()).unwrap_err();
        assert_eq!(err, OrcaError::InvalidQuantity(Number::zero()));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut draft = ItemDraft::from_catalog(&entry(), &Settings::default());
        draft.set_quantity(num("-2"));
        assert!(matches!(draft.to_record(&tree()), Err(OrcaError::InvalidQuantity(_))));
    }

    #[test]
    fn test_formula_quantity_saved_with_variables() {
        let mut draft = ItemDraft::from_catalog(&entry(), &Settings::default());
        let editor = draft.editor_mut();
        let id = editor.variables_mut().add().id.clone();
        editor.variables_mut().rename(&id, "volume").unwrap();
        editor.variables_mut().set_value(&id, num("2,5")).unwrap();
        editor.set_formula("VOLUME * 2");

        assert_eq!(draft.apply_formula().unwrap(), &num("5"));
        draft.set_stage(Some(StageId::new("fundacao")));

        let record = draft.to_record(&tree()).unwrap();
        assert_eq!(record.quantity, num("5"));
        assert_eq!(record.formula.as_deref(), Some("VOLUME * 2"));
        assert_eq!(record.variables.len(), 1);
        assert_eq!(record.variables[0].name, "VOLUME");
    }

    #[test]
    fn test_variable_change_after_apply_is_reevaluated() {
        let mut draft = ItemDraft::from_catalog(&entry(), &Settings::default());
        let id = draft.editor_mut().variables_mut().add().id.clone();
        draft.editor_mut().variables_mut().set_value(&id, num("3")).unwrap();
        draft.editor_mut().set_formula("VAR1 + 1");
        draft.apply_formula().unwrap();

        draft.editor_mut().variables_mut().set_value(&id, num("9")).unwrap();
        assert_eq!(draft.quantity(), &num("4"));
        assert_eq!(draft.saved_quantity().unwrap(), num("10"));
        assert_eq!(draft.to_record(&tree()).unwrap().quantity, num("10"));
    }

    #[test]
    fn test_removed_variable_blocks_save() {
        let mut draft = ItemDraft::from_catalog(&entry(), &Settings::default());
        let id = draft.editor_mut().variables_mut().add().id.clone();
        draft.editor_mut().set_formula("VAR1 * 4");
        draft.editor_mut().variables_mut().set_value(&id, num("1")).unwrap();
        draft.apply_formula().unwrap();

        draft.editor_mut().variables_mut().remove(&id).unwrap();
        assert_eq!(draft.to_record(&tree()), Err(OrcaError::unresolved("VAR1")));
    }

    #[test]
    fn test_manual_quantity_drops_formula() {
        let item = LineItem {
            id: ItemId::new("i1"),
            composition_code: "96995".to_string(),
            description: "Reaterro".to_string(),
            unit: "m3".to_string(),
            unit_price: num("45.1"),
            quantity: num("20"),
            stage_id: None,
            formula: Some("10*2".to_string()),
            variables: vec![],
        };
        let mut draft = ItemDraft::from_item(&item, &Settings::default());
        assert_eq!(draft.editor().formula(), "10*2");

        draft.set_quantity(num("7"));
        assert_eq!(draft.formula(), None);
        assert_eq!(draft.editor().formula(), "7");

        let record = draft.to_record(&tree()).unwrap();
        assert_eq!(record.quantity, num("7"));
        assert_eq!(record.formula, None);
        assert!(record.variables.is_empty());
    }

    #[test]
    fn test_blank_stored_formula_is_manual_quantity() {
        for blank in ["", "   "] {
            let item = LineItem {
                id: ItemId::new("i2"),
                composition_code: "96995".to_string(),
                description: "Reaterro".to_string(),
                unit: "m3".to_string(),
                unit_price: num("45.1"),
                quantity: num("3"),
                stage_id: None,
                formula: Some(blank.to_string()),
                variables: vec![],
            };
            let draft = ItemDraft::from_item(&item, &Settings::default());
            assert_eq!(draft.formula(), None);

            let record = draft.to_record(&tree()).unwrap();
            assert_eq!(record.quantity, num("3"));
            assert_eq!(record.formula, None);
        }
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let mut draft = ItemDraft::from_catalog(&entry(), &Settings::default());
        draft.set_quantity(num("1"));
        draft.set_stage(Some(StageId::new("gone")));
        assert_eq!(
            draft.to_record(&tree()).unwrap_err(),
            OrcaError::StageNotFound(StageId::new("gone"))
        );
    }
}
