use crate::sanitize::{is_valid_key, sanitize, unique_key, SanitizedKey, PLACEHOLDER};
use crate::{SchemaError, VariableType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Ordered set of output variables exposed by an input node.
///
/// Insertion order of `keys` is display order. Every key is unique and
/// matches the identifier grammar. A fixed schema never changes after the
/// node is created.
///
/// Mutations are pure: they take `&self` and hand back the next schema inside
/// a [`SchemaEdit`], leaving the caller to commit it together with whatever
/// edge updates the change implies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSchema {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    types: BTreeMap<String, VariableType>,
    #[serde(default)]
    is_fixed: bool,
}

/// What a committed schema mutation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    Added { key: String },
    Deleted { key: String },
    Renamed { old: String, new: String },
    Retyped { key: String, value_type: VariableType },
}

/// The schema a mutation would produce, plus a description of the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEdit {
    pub schema: VariableSchema,
    pub change: SchemaChange,
}

impl VariableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an immutable schema from externally provided variables.
    ///
    /// Names are sanitized; later duplicates are dropped.
    pub fn fixed<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, VariableType)>,
        K: AsRef<str>,
    {
        let mut schema = Self::default();
        for (raw, value_type) in entries {
            let key = schema.resolve_key(&sanitize(raw.as_ref()));
            if key.is_empty() || schema.contains(&key) {
                continue;
            }
            schema.types.insert(key.clone(), value_type);
            schema.keys.push(key);
        }
        schema.is_fixed = true;
        schema
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn value_type(&self, key: &str) -> Option<&VariableType> {
        self.types.get(key)
    }

    /// Variables in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableType)> + '_ {
        static DEFAULT: VariableType = VariableType::String;
        self.keys
            .iter()
            .map(move |k| (k.as_str(), self.types.get(k).unwrap_or(&DEFAULT)))
    }

    /// Degenerate input (nothing legal in it) becomes a free placeholder
    /// name, e.g. `_`, `_1`.
    fn resolve_key(&self, sanitized: &SanitizedKey) -> String {
        if sanitized.degenerate {
            unique_key(&PLACEHOLDER.to_string(), &self.keys)
        } else {
            sanitized.key.clone()
        }
    }

    pub fn add_variable(
        &self,
        raw_key: &str,
        value_type: VariableType,
    ) -> Result<SchemaEdit, SchemaError> {
        if self.is_fixed {
            return Err(SchemaError::FixedSchema);
        }
        if raw_key.trim().is_empty() {
            return Err(SchemaError::EmptyKey);
        }

        let key = self.resolve_key(&sanitize(raw_key));
        if self.contains(&key) {
            return Err(SchemaError::DuplicateKey(key));
        }

        let mut next = self.clone();
        next.keys.push(key.clone());
        next.types.insert(key.clone(), value_type);
        Ok(SchemaEdit {
            schema: next,
            change: SchemaChange::Added { key },
        })
    }

    pub fn delete_variable(&self, key: &str) -> Result<SchemaEdit, SchemaError> {
        if self.is_fixed {
            return Err(SchemaError::FixedSchema);
        }
        let index = self
            .position(key)
            .ok_or_else(|| SchemaError::KeyNotFound(key.to_string()))?;

        let mut next = self.clone();
        let removed = next.keys.remove(index);
        next.types.remove(&removed);
        Ok(SchemaEdit {
            schema: next,
            change: SchemaChange::Deleted { key: removed },
        })
    }

    /// Rename keeps the variable's position and type.
    pub fn rename_variable(
        &self,
        old_key: &str,
        new_raw_key: &str,
    ) -> Result<SchemaEdit, SchemaError> {
        if self.is_fixed {
            return Err(SchemaError::FixedSchema);
        }
        if new_raw_key.trim().is_empty() {
            return Err(SchemaError::EmptyKey);
        }
        let index = self
            .position(old_key)
            .ok_or_else(|| SchemaError::KeyNotFound(old_key.to_string()))?;

        // Compared before placeholder resolution, which would always pick a
        // free suffix.
        let sanitized = sanitize(new_raw_key);
        if sanitized.key == old_key {
            return Err(SchemaError::UnchangedKey(sanitized.key));
        }
        let new_key = self.resolve_key(&sanitized);
        if new_key.is_empty() {
            return Err(SchemaError::EmptyKey);
        }
        if self.contains(&new_key) {
            return Err(SchemaError::KeyCollision {
                old: old_key.to_string(),
                new: new_key,
            });
        }

        let mut next = self.clone();
        next.keys[index] = new_key.clone();
        let value_type = next.types.remove(old_key).unwrap_or_default();
        next.types.insert(new_key.clone(), value_type);
        Ok(SchemaEdit {
            schema: next,
            change: SchemaChange::Renamed {
                old: old_key.to_string(),
                new: new_key,
            },
        })
    }

    pub fn set_variable_type(
        &self,
        key: &str,
        value_type: VariableType,
    ) -> Result<SchemaEdit, SchemaError> {
        if self.is_fixed {
            return Err(SchemaError::FixedSchema);
        }
        if !self.contains(key) {
            return Err(SchemaError::KeyNotFound(key.to_string()));
        }

        let mut next = self.clone();
        next.types.insert(key.to_string(), value_type.clone());
        Ok(SchemaEdit {
            schema: next,
            change: SchemaChange::Retyped {
                key: key.to_string(),
                value_type,
            },
        })
    }

    /// Restore the schema invariants on data that bypassed the mutation API
    /// (a decoded snapshot). Returns one line per fix applied.
    ///
    /// Invalid keys are re-sanitized, duplicates dropped, missing types
    /// default to `string` and types without a key are discarded. Applies
    /// to fixed schemas too.
    pub fn repair(&mut self) -> Vec<String> {
        let mut fixes = Vec::new();
        let raw_keys: HashSet<String> = self.keys.iter().cloned().collect();
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(self.keys.len());
        let mut types = BTreeMap::new();

        for raw in self.keys.drain(..) {
            let key = if is_valid_key(&raw) {
                raw.clone()
            } else {
                let sanitized = sanitize(&raw);
                if sanitized.key.is_empty() {
                    fixes.push("dropped empty variable name".to_string());
                    continue;
                }
                let key = if sanitized.degenerate {
                    unique_key(&PLACEHOLDER.to_string(), &keys)
                } else {
                    sanitized.key
                };
                fixes.push(format!("renamed invalid variable '{}' to '{}'", raw, key));
                key
            };

            if !seen.insert(key.clone()) {
                fixes.push(format!("dropped duplicate variable '{}'", key));
                continue;
            }

            let value_type = match self.types.get(&raw) {
                Some(t) => t.clone(),
                None => {
                    fixes.push(format!("variable '{}' had no type, using string", key));
                    VariableType::default()
                }
            };
            types.insert(key.clone(), value_type);
            keys.push(key);
        }

        for orphan in self.types.keys().filter(|k| !raw_keys.contains(*k)) {
            fixes.push(format!("dropped type for unknown variable '{}'", orphan));
        }

        self.keys = keys;
        self.types = types;
        fixes
    }
}
