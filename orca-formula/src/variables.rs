//! Variable set bound to one line item's formula
//!
//! Names are sanitized to `[A-Z0-9_]` and must be unique within the set.
//! The set never checks whether the formula still references a variable;
//! removing one that is in use makes the next evaluation fail with an
//! unresolved reference, and the caller decides what to do about it.

use orca_core::{Number, OrcaError, Settings, Variable, VariableId};
use std::collections::HashMap;
use tracing::debug;

/// Keep ASCII letters, digits and underscores, uppercased
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_uppercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSet {
    variables: Vec<Variable>,
    prefix: String,
}

impl Default for VariableSet {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl VariableSet {
    pub fn new(settings: &Settings) -> Self {
        Self {
            variables: Vec::new(),
            prefix: sanitize_name(&settings.variable_prefix),
        }
    }

    /// Rebuild a set from saved variables, as stored with a line item
    pub fn from_variables(variables: Vec<Variable>, settings: &Settings) -> Self {
        Self { variables, ..Self::new(settings) }
    }

    // ========== Operations ==========

    /// Append a variable with a generated name and value 0
    pub fn add(&mut self) -> &Variable {
        let mut n = self.variables.len() + 1;
        let name = loop {
            let candidate = format!("{}{}", self.prefix, n);
            if self.find(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };

        debug!(name = %name, "variable added");
        let index = self.variables.len();
        self.variables.push(Variable {
            id: VariableId::generate(),
            name,
            value: Number::zero(),
        });
        &self.variables[index]
    }

    pub fn rename(&mut self, id: &VariableId, new_name: &str) -> Result<&Variable, OrcaError> {
        let name = sanitize_name(new_name);
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(OrcaError::InvalidName { name: new_name.to_string() });
        }

        let index = self.index_of(id)?;
        if self.variables.iter().any(|v| &v.id != id && v.name == name) {
            return Err(OrcaError::DuplicateName { name });
        }

        debug!(from = %self.variables[index].name, to = %name, "variable renamed");
        self.variables[index].name = name;
        Ok(&self.variables[index])
    }

    pub fn set_value(&mut self, id: &VariableId, value: Number) -> Result<&Variable, OrcaError> {
        let index = self.index_of(id)?;
        self.variables[index].value = value;
        Ok(&self.variables[index])
    }

    pub fn remove(&mut self, id: &VariableId) -> Result<Variable, OrcaError> {
        let index = self.index_of(id)?;
        let removed = self.variables.remove(index);
        debug!(name = %removed.name, "variable removed");
        Ok(removed)
    }

    // ========== Queries ==========

    pub fn get(&self, id: &VariableId) -> Option<&Variable> {
        self.variables.iter().find(|v| &v.id == id)
    }

    /// Case-insensitive lookup by name
    pub fn find(&self, name: &str) -> Option<&Variable> {
        let name = name.to_uppercase();
        self.variables.iter().find(|v| v.name.to_uppercase() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Name-to-value mapping for the evaluator
    pub fn bindings(&self) -> HashMap<String, Number> {
        self.variables
            .iter()
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect()
    }

    pub fn as_slice(&self) -> &[Variable] {
        &self.variables
    }

    pub fn into_variables(self) -> Vec<Variable> {
        self.variables
    }

    fn index_of(&self, id: &VariableId) -> Result<usize, OrcaError> {
        self.variables
            .iter()
            .position(|v| &v.id == id)
            .ok_or_else(|| OrcaError::VariableNotFound(id.clone()))
    }
}
