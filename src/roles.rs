//! Column role resolution.
//!
//! Inventory sheets name the same concepts in many ways ("Situação",
//! "Status do ativo", "STATUS"). A [`KeywordTable`] lists lowercase substrings
//! per [`Role`]; [`KeywordTable::resolve`] walks the roles in their fixed order
//! and gives each one the first still-unclaimed column whose case-folded name
//! contains one of its keywords. Ties go to column position, not keyword
//! specificity.

use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Item,
    Status,
    Brand,
    Model,
    User,
    Location,
    Date,
}

impl Role {
    /// Resolution order.
    pub const ALL: [Role; 7] = [
        Role::Item,
        Role::Status,
        Role::Brand,
        Role::Model,
        Role::User,
        Role::Location,
        Role::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Item => "item",
            Role::Status => "status",
            Role::Brand => "brand",
            Role::Model => "model",
            Role::User => "user",
            Role::Location => "location",
            Role::Date => "date",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Item => "Item / category",
            Role::Status => "Status",
            Role::Brand => "Brand",
            Role::Model => "Model",
            Role::User => "User",
            Role::Location => "Location / cost center",
            Role::Date => "Date",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == lowered)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown role '{value}'. Expected one of: {}",
                    Role::ALL.map(|role| role.as_str()).join(", ")
                )
            })
    }
}

/// Keywords per role. Roles missing from the map never match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable {
    keywords: BTreeMap<Role, Vec<String>>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let defaults: [(Role, &[&str]); 7] = [
            (
                Role::Item,
                &[
                    "ativo",
                    "item",
                    "produto",
                    "consumiveis",
                    "consumíveis",
                    "descri",
                    "equipamento",
                    "product",
                    "asset",
                    "description",
                    "equipment",
                    "consumable",
                ],
            ),
            (Role::Status, &["status", "situa", "situacao", "situação"]),
            (Role::Brand, &["marca", "brand"]),
            (Role::Model, &["modelo", "model"]),
            (Role::User, &["usuario", "usuário", "user"]),
            (
                Role::Location,
                &[
                    "setor",
                    "centro de custo",
                    "aloc",
                    "local",
                    "location",
                    "cost center",
                ],
            ),
            (
                Role::Date,
                &[
                    "data", "entrega", "atualiza", "compra", "date", "delivery", "updated",
                    "purchase",
                ],
            ),
        ];
        let mut table = KeywordTable::empty();
        for (role, words) in defaults {
            table.set(role, words.iter().map(|w| w.to_string()).collect());
        }
        table
    }
}

impl KeywordTable {
    pub fn empty() -> Self {
        Self {
            keywords: BTreeMap::new(),
        }
    }

    /// Replaces the keywords of `role`; keywords are stored case-folded.
    pub fn set(&mut self, role: Role, keywords: Vec<String>) {
        let folded = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self.keywords.insert(role, folded);
    }

    pub fn keywords(&self, role: Role) -> &[String] {
        self.keywords.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Assigns roles for a column-name sequence.
    pub fn resolve<S: AsRef<str>>(&self, columns: &[S]) -> RoleAssignment {
        let folded = columns
            .iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .collect::<Vec<_>>();
        let mut consumed = vec![false; columns.len()];
        let mut assignment = RoleAssignment::default();
        for role in Role::ALL {
            let keywords = self.keywords(role);
            if keywords.is_empty() {
                continue;
            }
            let hit = folded.iter().enumerate().find(|(idx, name)| {
                !consumed[*idx] && keywords.iter().any(|k| name.contains(k.as_str()))
            });
            if let Some((idx, _)) = hit {
                consumed[idx] = true;
                let column = columns[idx].as_ref().to_string();
                debug!("Role '{role}' resolved to column '{column}'");
                assignment.columns.insert(role, column);
            } else {
                debug!("Role '{role}' left unassigned");
            }
        }
        assignment
    }

    /// Lowercases keywords loaded from a profile file.
    pub(crate) fn normalized(self) -> Self {
        let mut table = KeywordTable::empty();
        for (role, words) in self.keywords {
            table.set(role, words);
        }
        table
    }
}

/// Resolves roles for `table` with the built-in keyword table.
pub fn resolve(table: &Table) -> RoleAssignment {
    KeywordTable::default().resolve(&table.headers())
}

/// Role → column name; at most one column per role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RoleAssignment {
    columns: BTreeMap<Role, String>,
}

impl RoleAssignment {
    pub fn column(&self, role: Role) -> Option<&str> {
        self.columns.get(&role).map(String::as_str)
    }

    pub fn is_assigned(&self, role: Role) -> bool {
        self.columns.contains_key(&role)
    }

    pub fn assign(&mut self, role: Role, column: impl Into<String>) {
        self.columns.insert(role, column.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.columns.iter().map(|(role, column)| (*role, column.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
