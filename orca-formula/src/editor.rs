//! Formula editing session
//!
//! Holds the formula text and its variables while the user composes a
//! quantity. Nothing here is persisted; `apply` hands back the triple
//! that gets saved with the line item.

use crate::eval::{references, Evaluator};
use crate::variables::VariableSet;
use orca_core::{Number, OrcaError, Settings, Variable};

/// Formula, variables and the quantity they evaluated to
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedFormula {
    pub formula: String,
    pub variables: Vec<Variable>,
    pub quantity: Number,
}

#[derive(Debug, Clone)]
pub struct FormulaEditor {
    formula: String,
    variables: VariableSet,
    evaluator: Evaluator,
}

impl FormulaEditor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            formula: String::new(),
            variables: VariableSet::new(settings),
            evaluator: Evaluator::new(settings.clone()),
        }
    }

    /// Reopen the editor on saved provenance. Without a saved formula the
    /// text starts as the current quantity, so applying right away is a no-op.
    pub fn open(
        formula: Option<&str>,
        variables: Vec<Variable>,
        current_quantity: &Number,
        settings: &Settings,
    ) -> Self {
        let formula = match formula {
            Some(f) if !f.trim().is_empty() => f.to_string(),
            _ => current_quantity.to_plain_string(),
        };
        Self {
            formula,
            variables: VariableSet::from_variables(variables, settings),
            evaluator: Evaluator::new(settings.clone()),
        }
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn set_formula(&mut self, formula: impl Into<String>) {
        self.formula = formula.into();
    }

    /// Append a variable name to the formula, space separated
    pub fn insert_variable(&mut self, name: &str) {
        if !self.formula.is_empty() && !self.formula.ends_with(' ') {
            self.formula.push(' ');
        }
        self.formula.push_str(name);
        self.formula.push(' ');
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableSet {
        &mut self.variables
    }

    /// Live result for the formula as typed. A blank formula has no
    /// result and no error.
    pub fn preview(&self) -> Result<Option<Number>, OrcaError> {
        if self.formula.trim().is_empty() {
            return Ok(None);
        }
        self.evaluator
            .evaluate(&self.formula, &self.variables.bindings())
            .map(Some)
    }

    /// Names used in the formula that no variable in the set provides
    pub fn unresolved(&self) -> Vec<String> {
        references(&self.formula)
            .into_iter()
            .filter(|name| self.variables.find(name).is_none())
            .collect()
    }

    pub fn apply(&self) -> Result<AppliedFormula, OrcaError> {
        let quantity = self
            .preview()?
            .ok_or_else(|| OrcaError::invalid_expression("empty expression"))?;
        Ok(AppliedFormula {
            formula: self.formula.clone(),
            variables: self.variables.as_slice().to_vec(),
            quantity,
        })
    }

    pub fn into_variables(self) -> Vec<Variable> {
        self.variables.into_variables()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> Number {
        Number::from_str(s).unwrap()
    }

    #[test]
    fn test_blank_preview_is_silent() {
        let editor = FormulaEditor::new(&Settings::default());
        assert_eq!(editor.preview(), Ok(None));
        assert!(editor.apply().is_err());
    }

    #[test]
    fn test_open_seeds_with_quantity() {
        let editor = FormulaEditor::open(None, vec![], &num("12,5"), &Settings::default());
        assert_eq!(editor.formula(), "12.5");
        assert_eq!(editor.apply().unwrap().quantity, num("12.5"));
    }

    #[test]
    fn test_open_keeps_saved_formula() {
        let editor = FormulaEditor::open(Some("10*2"), vec![], &num("20"), &Settings::default());
        assert_eq!(editor.formula(), "10*2");
    }

    #[test]
    fn test_insert_variable_spacing() {
        let mut editor = FormulaEditor::new(&Settings::default());
        editor.insert_variable("VAR1");
        assert_eq!(editor.formula(), "VAR1 ");
        editor.set_formula("2*");
        editor.insert_variable("VAR1");
        assert_eq!(editor.formula(), "2* VAR1 ");
    }

    #[test]
    fn test_compose_with_variables() {
        let mut editor = FormulaEditor::new(&Settings::default());
        let largura = editor.variables_mut().add().id.clone();
        let comprimento = editor.variables_mut().add().id.clone();
        editor.variables_mut().rename(&largura, "LARGURA").unwrap();
        editor.variables_mut().rename(&comprimento, "COMPRIMENTO").unwrap();
        editor.variables_mut().set_value(&largura, num("3")).unwrap();
        editor.variables_mut().set_value(&comprimento, num("4,5")).unwrap();
        editor.set_formula("(LARGURA * COMPRIMENTO) + 5");

        let applied = editor.apply().unwrap();
        assert_eq!(applied.quantity, num("18.5"));
        assert_eq!(applied.variables.len(), 2);
        assert_eq!(applied.formula, "(LARGURA * COMPRIMENTO) + 5");
    }

    #[test]
    fn test_removed_variable_is_unresolved() {
        let mut editor = FormulaEditor::new(&Settings::default());
        let id = editor.variables_mut().add().id.clone();
        editor.set_formula("VAR1 * 2");
        assert!(editor.unresolved().is_empty());

        editor.variables_mut().remove(&id).unwrap();
        assert_eq!(editor.unresolved(), vec!["VAR1".to_string()]);
        assert_eq!(editor.preview(), Err(OrcaError::unresolved("VAR1")));
    }
}
