//! Grocery list store

use super::persist::{self, Persister};
use super::types::GroceryItem;
use crate::storage::{KvStore, keys};
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GroceryState {
    pub items: Vec<GroceryItem>,
}

#[derive(Debug, Clone)]
pub enum GroceryAction {
    Add {
        name: String,
        category: String,
        quantity: Option<String>,
        source_recipe: Option<String>,
    },
    AddFromRecipe {
        recipe: String,
        ingredients: Vec<(String, String)>,
    },
    Toggle(String),
    Update {
        id: String,
        name: Option<String>,
        quantity: Option<String>,
        category: Option<String>,
    },
    Remove(String),
    ClearChecked,
    ClearAll,
}

pub struct GroceryStore {
    state: RwLock<GroceryState>,
    persister: Option<Persister>,
}

impl Default for GroceryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GroceryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GroceryState::default()),
            persister: None,
        }
    }

    pub async fn open(kv: &KvStore) -> Self {
        let adapter = kv.adapter();
        let state = persist::load::<GroceryState>(&adapter, keys::GROCERY_STORE)
            .await
            .unwrap_or_default();

        Self {
            state: RwLock::new(state),
            persister: Some(Persister::spawn(adapter, keys::GROCERY_STORE)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, GroceryState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, GroceryState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn dispatch(&self, action: GroceryAction) -> bool {
        let mut state = self.write();
        let applied = reduce(&mut state, action);
        if applied {
            if let Some(persister) = &self.persister {
                persister.persist(&*state);
            }
        }
        applied
    }

    pub async fn flush(&self) {
        if let Some(persister) = &self.persister {
            persister.flush().await;
        }
    }

    pub fn items(&self) -> Vec<GroceryItem> {
        self.read().items.clone()
    }

    pub fn unchecked_count(&self) -> usize {
        self.read().items.iter().filter(|i| !i.checked).count()
    }

    pub fn add_item(&self, name: &str, category: &str) -> bool {
        self.dispatch(GroceryAction::Add {
            name: name.to_string(),
            category: category.to_string(),
            quantity: None,
            source_recipe: None,
        })
    }

    pub fn toggle_item(&self, id: &str) -> bool {
        self.dispatch(GroceryAction::Toggle(id.to_string()))
    }

    pub fn remove_item(&self, id: &str) -> bool {
        self.dispatch(GroceryAction::Remove(id.to_string()))
    }

    pub fn clear_checked(&self) -> bool {
        self.dispatch(GroceryAction::ClearChecked)
    }
}

fn new_item(
    name: String,
    category: String,
    quantity: Option<String>,
    source_recipe: Option<String>,
) -> GroceryItem {
    GroceryItem {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        category,
        quantity,
        checked: false,
        source_recipe,
    }
}

fn reduce(state: &mut GroceryState, action: GroceryAction) -> bool {
    match action {
        GroceryAction::Add {
            name,
            category,
            quantity,
            source_recipe,
        } => {
            if name.trim().is_empty() {
                return false;
            }
            state
                .items
                .push(new_item(name, category, quantity, source_recipe));
            true
        }
        GroceryAction::AddFromRecipe { recipe, ingredients } => {
            let before = state.items.len();
            for (name, category) in ingredients {
                // Skip ingredients already waiting on the list
                let pending = state
                    .items
                    .iter()
                    .any(|i| !i.checked && i.name.eq_ignore_ascii_case(&name));
                if !pending {
                    state
                        .items
                        .push(new_item(name, category, None, Some(recipe.clone())));
                }
            }
            debug!(recipe = %recipe, added = state.items.len() - before, "Recipe added to grocery list");
            state.items.len() != before
        }
        GroceryAction::Toggle(id) => match state.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.checked = !item.checked;
                true
            }
            None => false,
        },
        GroceryAction::Update {
            id,
            name,
            quantity,
            category,
        } => match state.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                if let Some(name) = name {
                    item.name = name;
                }
                if let Some(quantity) = quantity {
                    item.quantity = Some(quantity);
                }
                if let Some(category) = category {
                    item.category = category;
                }
                true
            }
            None => false,
        },
        GroceryAction::Remove(id) => {
            let before = state.items.len();
            state.items.retain(|i| i.id != id);
            state.items.len() != before
        }
        GroceryAction::ClearChecked => {
            let before = state.items.len();
            state.items.retain(|i| !i.checked);
            state.items.len() != before
        }
        GroceryAction::ClearAll => {
            let had_items = !state.items.is_empty();
            state.items.clear();
            had_items
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_and_clear_checked() {
        let store = GroceryStore::new();
        store.add_item("Greek yogurt", "dairy");
        store.add_item("Spinach", "produce");

        let yogurt = store.items()[0].id.clone();
        assert!(store.toggle_item(&yogurt));
        assert_eq!(store.unchecked_count(), 1);

        assert!(store.clear_checked());
        let items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Spinach");

        // Nothing left to clear
        assert!(!store.clear_checked());
    }

    #[test]
    fn test_recipe_ingredients_are_not_duplicated() {
        let store = GroceryStore::new();
        store.add_item("eggs", "dairy");

        store.dispatch(GroceryAction::AddFromRecipe {
            recipe: "Shakshuka".into(),
            ingredients: vec![
                ("Eggs".into(), "dairy".into()),
                ("Tomatoes".into(), "produce".into()),
            ],
        });

        let items = store.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].source_recipe.as_deref(), Some("Shakshuka"));
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let store = GroceryStore::new();
        assert!(!store.toggle_item("missing"));
        assert!(!store.remove_item("missing"));
        assert!(!store.add_item("  ", "misc"));
    }

    #[tokio::test]
    async fn test_persisted_list_reloads() {
        let kv = KvStore::in_memory();
        let store = GroceryStore::open(&kv).await;
        store.add_item("Rice", "grains");
        store.flush().await;

        let reloaded = GroceryStore::open(&kv).await;
        assert_eq!(reloaded.items(), store.items());
    }
}
