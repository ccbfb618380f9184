//! In-memory facility table, replaced wholesale on configuration reload.

use std::collections::HashMap;
use std::sync::Arc;

use crate::facility::Facility;
use crate::module_id::ModuleId;

/// Maps `(app_id, ModuleId)` to its [`Facility`], resolved by longest
/// matching prefix within the app's namespace.
///
/// Every app present in the table has at least a `(app_id, ModuleId::root())`
/// entry; this is enforced at construction time by [`FacilityDB::new`].
#[derive(Debug, Default)]
pub struct FacilityDB {
    table: HashMap<(String, ModuleId), Arc<Facility>>,
}

impl FacilityDB {
    /// Builds a table from already-validated facilities. Returns `None` if
    /// any app present lacks a root entry.
    pub fn new(facilities: Vec<Facility>) -> Option<FacilityDB> {
        let mut table = HashMap::new();
        let mut apps = std::collections::HashSet::new();
        for facility in facilities {
            apps.insert(facility.app_id.clone());
            table.insert((facility.app_id.clone(), facility.mod_id.clone()), Arc::new(facility));
        }
        for app_id in &apps {
            if !table.contains_key(&(app_id.clone(), ModuleId::root())) {
                return None;
            }
        }
        Some(FacilityDB { table })
    }

    /// Resolves the facility that should handle `(app_id, module)`, walking
    /// from the full module path up through its ancestors to the app's
    /// root. Returns `None` if `app_id` is not configured at all.
    pub fn get_facility(&self, app_id: &str, module: &ModuleId) -> Option<Arc<Facility>> {
        module
            .prefixes()
            .find_map(|prefix| self.table.get(&(app_id.to_owned(), prefix)).cloned())
    }

    /// Number of distinct `(app_id, module)` entries in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
