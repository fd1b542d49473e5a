//! Definition catalog: resources, tools, recipes and buildings.
//!
//! The JSON document names everything by string id. Loading resolves every
//! reference once and interns resource, recipe and tool ids into the compact
//! indices from [`crate::ids`]; the rest of the simulation never touches the
//! strings again. The resolved catalog is immutable.

use std::{
    collections::{BTreeMap, HashMap},
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::ids::{RecipeId, ResourceAmount, ResourceKind, ToolId};
use crate::production::{Recipe, StationSpec};
use crate::storage::FlowMode;
use crate::tasks::Specialization;

pub const BUILTIN_CATALOG: &str = include_str!("data/catalog.json");

pub const CATALOG_PATH_ENV: &str = "MILLWRIGHT_CATALOG";

// ── Raw document ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    resources: Vec<RawResource>,
    #[serde(default)]
    tools: Vec<RawTool>,
    #[serde(default)]
    recipes: Vec<RawRecipe>,
    #[serde(default)]
    buildings: Vec<RawBuilding>,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nutrition: f32,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    id: String,
    #[serde(default = "default_tool_bonus")]
    bonus: f32,
}

fn default_tool_bonus() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
struct RawAmount {
    resource: String,
    amount: u32,
}

#[derive(Debug, Deserialize)]
struct RawRecipe {
    id: String,
    #[serde(default)]
    inputs: Vec<RawAmount>,
    #[serde(default)]
    outputs: Vec<RawAmount>,
    craft_time_seconds: f32,
    #[serde(default = "default_batch_size")]
    batch_size: u32,
    #[serde(default)]
    specialization: Option<Specialization>,
}

fn default_batch_size() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    #[serde(default)]
    default_capacity: u32,
    #[serde(default)]
    capacities: BTreeMap<String, u32>,
    #[serde(default)]
    flow: FlowMode,
}

#[derive(Debug, Deserialize)]
struct RawStation {
    recipes: Vec<String>,
    #[serde(default)]
    work_points: Option<u32>,
    #[serde(default)]
    max_workers: Option<u32>,
    #[serde(default)]
    max_haulers: Option<u32>,
    #[serde(default)]
    input_capacity: Option<u32>,
    #[serde(default)]
    output_capacity: Option<u32>,
    #[serde(default)]
    station_modifier: Option<f32>,
    #[serde(default)]
    input_efficiency: Option<f32>,
    #[serde(default)]
    require_hauler_logistics: bool,
}

#[derive(Debug, Deserialize)]
struct RawHouse {
    capacity: u32,
}

#[derive(Debug, Deserialize)]
struct RawBuilding {
    id: String,
    #[serde(default)]
    cost: Vec<RawAmount>,
    #[serde(default)]
    build_time_seconds: f32,
    #[serde(default)]
    storage: Option<RawStorage>,
    #[serde(default)]
    station: Option<RawStation>,
    #[serde(default)]
    house: Option<RawHouse>,
}

// ── Resolved definitions ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDef {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    /// Hunger removed by one unit. Zero means inedible.
    pub nutrition: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDef {
    pub tool: ToolId,
    pub id: String,
    pub bonus: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageDef {
    pub default_capacity: u32,
    pub capacities: BTreeMap<ResourceKind, u32>,
    pub flow: FlowMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationDef {
    pub recipes: Vec<RecipeId>,
    pub spec: StationSpec,
}

impl StationDef {
    /// The recipe a freshly placed station starts with.
    pub fn default_recipe(&self) -> Option<RecipeId> {
        self.recipes.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HouseDef {
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingDef {
    pub id: String,
    pub cost: Vec<ResourceAmount>,
    pub build_time_seconds: f32,
    pub storage: Option<StorageDef>,
    pub station: Option<StationDef>,
    pub house: Option<HouseDef>,
}

impl BuildingDef {
    /// True if placement needs neither materials nor labor.
    pub fn is_instant(&self) -> bool {
        self.cost.iter().all(|c| c.amount == 0) && self.build_time_seconds <= 0.0
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate {category} id '{id}'")]
    Duplicate { category: &'static str, id: String },
    #[error("{owner} references unknown {category} '{id}'")]
    UnknownReference {
        owner: String,
        category: &'static str,
        id: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    resources: Vec<ResourceDef>,
    resource_ids: HashMap<String, ResourceKind>,
    tools: Vec<ToolDef>,
    tool_ids: HashMap<String, ToolId>,
    recipes: Vec<Recipe>,
    recipe_ids: HashMap<String, RecipeId>,
    buildings: BTreeMap<String, BuildingDef>,
}

impl DefinitionCatalog {
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_CATALOG).expect("builtin catalog should resolve")
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        Self::resolve(raw)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    fn resolve(raw: RawCatalog) -> Result<Self, CatalogError> {
        let mut catalog = DefinitionCatalog::default();

        for res in raw.resources {
            if catalog.resource_ids.contains_key(&res.id) {
                return Err(CatalogError::Duplicate {
                    category: "resource",
                    id: res.id,
                });
            }
            let kind = ResourceKind(catalog.resources.len() as u16);
            catalog.resource_ids.insert(res.id.clone(), kind);
            catalog.resources.push(ResourceDef {
                kind,
                name: res.name.unwrap_or_else(|| res.id.clone()),
                id: res.id,
                nutrition: res.nutrition.max(0.0),
            });
        }

        for tool in raw.tools {
            if catalog.tool_ids.contains_key(&tool.id) {
                return Err(CatalogError::Duplicate {
                    category: "tool",
                    id: tool.id,
                });
            }
            let id = ToolId(catalog.tools.len() as u16);
            catalog.tool_ids.insert(tool.id.clone(), id);
            catalog.tools.push(ToolDef {
                tool: id,
                id: tool.id,
                bonus: tool.bonus.max(0.1),
            });
        }

        for recipe in raw.recipes {
            if catalog.recipe_ids.contains_key(&recipe.id) {
                return Err(CatalogError::Duplicate {
                    category: "recipe",
                    id: recipe.id,
                });
            }
            let inputs = catalog.resolve_amounts(&recipe.id, &recipe.inputs)?;
            let outputs = catalog.resolve_amounts(&recipe.id, &recipe.outputs)?;
            let id = RecipeId(catalog.recipes.len() as u16);
            catalog.recipe_ids.insert(recipe.id.clone(), id);
            catalog.recipes.push(Recipe {
                id,
                name: recipe.id,
                inputs,
                outputs,
                craft_time_seconds: recipe.craft_time_seconds.max(0.0),
                batch_size: recipe.batch_size.max(1),
                specialization: recipe.specialization,
            });
        }

        for building in raw.buildings {
            if catalog.buildings.contains_key(&building.id) {
                return Err(CatalogError::Duplicate {
                    category: "building",
                    id: building.id,
                });
            }
            let def = catalog.resolve_building(building)?;
            catalog.buildings.insert(def.id.clone(), def);
        }

        log::debug!(
            target: "millwright::catalog",
            "catalog resolved: {} resources, {} tools, {} recipes, {} buildings",
            catalog.resources.len(),
            catalog.tools.len(),
            catalog.recipes.len(),
            catalog.buildings.len()
        );
        Ok(catalog)
    }

    fn lookup_resource(&self, owner: &str, id: &str) -> Result<ResourceKind, CatalogError> {
        self.resource_ids
            .get(id)
            .copied()
            .ok_or_else(|| CatalogError::UnknownReference {
                owner: owner.to_string(),
                category: "resource",
                id: id.to_string(),
            })
    }

    fn resolve_amounts(&self, owner: &str, raw: &[RawAmount]) -> Result<Vec<ResourceAmount>, CatalogError> {
        raw.iter()
            .map(|line| {
                let kind = self.lookup_resource(owner, &line.resource)?;
                Ok(ResourceAmount::new(kind, line.amount))
            })
            .collect()
    }

    fn resolve_building(&self, raw: RawBuilding) -> Result<BuildingDef, CatalogError> {
        let cost = self.resolve_amounts(&raw.id, &raw.cost)?;

        let storage = match raw.storage {
            Some(storage) => {
                let mut capacities = BTreeMap::new();
                for (resource, capacity) in &storage.capacities {
                    capacities.insert(self.lookup_resource(&raw.id, resource)?, *capacity);
                }
                Some(StorageDef {
                    default_capacity: storage.default_capacity,
                    capacities,
                    flow: storage.flow,
                })
            }
            None => None,
        };

        let station = match raw.station {
            Some(station) => {
                let mut recipes = Vec::with_capacity(station.recipes.len());
                for name in &station.recipes {
                    let id = self.recipe_ids.get(name).copied().ok_or_else(|| {
                        CatalogError::UnknownReference {
                            owner: raw.id.clone(),
                            category: "recipe",
                            id: name.clone(),
                        }
                    })?;
                    recipes.push(id);
                }
                let defaults = StationSpec::default();
                let work_points = station.work_points.unwrap_or(defaults.work_points);
                Some(StationDef {
                    recipes,
                    spec: StationSpec {
                        work_points,
                        max_workers: station.max_workers.unwrap_or(work_points),
                        max_haulers: station.max_haulers.unwrap_or(defaults.max_haulers),
                        input_capacity: station.input_capacity.unwrap_or(defaults.input_capacity),
                        output_capacity: station.output_capacity.unwrap_or(defaults.output_capacity),
                        station_modifier: station
                            .station_modifier
                            .unwrap_or(defaults.station_modifier)
                            .max(0.01),
                        input_efficiency: station
                            .input_efficiency
                            .unwrap_or(defaults.input_efficiency)
                            .max(0.0),
                        require_hauler_logistics: station.require_hauler_logistics,
                    },
                })
            }
            None => None,
        };

        Ok(BuildingDef {
            id: raw.id,
            cost,
            build_time_seconds: raw.build_time_seconds.max(0.0),
            storage,
            station,
            house: raw.house.map(|h| HouseDef { capacity: h.capacity }),
        })
    }

    // ── Lookups ─────────────────────────────────────────────────────────

    pub fn resource(&self, id: &str) -> Option<ResourceKind> {
        self.resource_ids.get(id).copied()
    }

    pub fn resource_def(&self, kind: ResourceKind) -> Option<&ResourceDef> {
        self.resources.get(kind.0 as usize)
    }

    pub fn resource_name(&self, kind: ResourceKind) -> &str {
        self.resource_def(kind).map(|r| r.name.as_str()).unwrap_or("unknown")
    }

    pub fn resources(&self) -> &[ResourceDef] {
        &self.resources
    }

    pub fn nutrition(&self, kind: ResourceKind) -> f32 {
        self.resource_def(kind).map(|r| r.nutrition).unwrap_or(0.0)
    }

    /// Resource kinds with nonzero nutrition, in catalog order.
    pub fn edible_kinds(&self) -> Vec<ResourceKind> {
        self.resources
            .iter()
            .filter(|r| r.nutrition > 0.0)
            .map(|r| r.kind)
            .collect()
    }

    pub fn tool(&self, id: &str) -> Option<ToolId> {
        self.tool_ids.get(id).copied()
    }

    /// Work-speed multiplier for an optional tool. No tool means 1.0.
    pub fn tool_bonus(&self, tool: Option<ToolId>) -> f32 {
        tool.and_then(|t| self.tools.get(t.0 as usize))
            .map(|t| t.bonus)
            .unwrap_or(1.0)
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipe_ids.get(id).and_then(|r| self.recipe_by_id(*r))
    }

    pub fn recipe_by_id(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(id.0 as usize)
    }

    pub fn building(&self, id: &str) -> Option<&BuildingDef> {
        self.buildings.get(id)
    }

    pub fn buildings(&self) -> impl Iterator<Item = &BuildingDef> {
        self.buildings.values()
    }
}

/// Load the catalog from `MILLWRIGHT_CATALOG`, falling back to the builtin
/// document when the variable is unset or the file is unusable.
pub fn load_catalog_from_env() -> (DefinitionCatalog, Option<PathBuf>) {
    if let Some(path) = env::var_os(CATALOG_PATH_ENV).map(PathBuf::from) {
        match DefinitionCatalog::from_file(&path) {
            Ok(catalog) => {
                log::info!(target: "millwright::catalog", "catalog loaded from {}", path.display());
                return (catalog, Some(path));
            }
            Err(err) => {
                log::warn!(target: "millwright::catalog", "catalog load failed ({err}); using builtin");
            }
        }
    }
    log::info!(target: "millwright::catalog", "catalog loaded from builtin");
    (DefinitionCatalog::builtin(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_resolves() {
        let catalog = DefinitionCatalog::builtin();
        let wood = catalog.resource("wood").unwrap();
        let plank = catalog.resource("plank").unwrap();
        let recipe = catalog.recipe("saw_planks").unwrap();
        assert_eq!(recipe.inputs, vec![ResourceAmount::new(wood, 2)]);
        assert_eq!(recipe.outputs, vec![ResourceAmount::new(plank, 1)]);
        assert_eq!(recipe.specialization, Some(Specialization::Carpenter));
        assert_eq!(recipe.batch_size, 1);
    }

    #[test]
    fn test_interned_ids_follow_document_order() {
        let catalog = DefinitionCatalog::builtin();
        assert_eq!(catalog.resource("wood"), Some(ResourceKind(0)));
        assert_eq!(catalog.resource_name(ResourceKind(0)), "Wood");
        assert_eq!(catalog.resource("unobtainium"), None);
    }

    #[test]
    fn test_edible_kinds() {
        let catalog = DefinitionCatalog::builtin();
        let edible = catalog.edible_kinds();
        assert!(edible.contains(&catalog.resource("bread").unwrap()));
        assert!(edible.contains(&catalog.resource("berries").unwrap()));
        assert!(!edible.contains(&catalog.resource("wood").unwrap()));
    }

    #[test]
    fn test_station_defaults_and_flags() {
        let catalog = DefinitionCatalog::builtin();
        let bakery = catalog.building("bakery").unwrap();
        let station = bakery.station.as_ref().unwrap();
        assert!(station.spec.require_hauler_logistics);
        assert_eq!(station.spec.input_efficiency, 1.0);
        assert_eq!(station.default_recipe(), catalog.recipe("bake_bread").map(|r| r.id));
        assert!(catalog.building("stockpile").unwrap().is_instant());
        assert!(!catalog.building("warehouse").unwrap().is_instant());
    }

    #[test]
    fn test_tool_bonus() {
        let catalog = DefinitionCatalog::builtin();
        assert_eq!(catalog.tool_bonus(None), 1.0);
        assert_eq!(catalog.tool_bonus(catalog.tool("saw")), 1.5);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let json = r#"{ "resources": [ { "id": "wood" }, { "id": "wood" } ] }"#;
        let err = DefinitionCatalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate { category: "resource", .. }));
    }

    #[test]
    fn test_unknown_reference_is_rejected() {
        let json = r#"{
            "resources": [ { "id": "wood" } ],
            "recipes": [ {
                "id": "burn",
                "inputs": [ { "resource": "coal", "amount": 1 } ],
                "craft_time_seconds": 1.0
            } ]
        }"#;
        let err = DefinitionCatalog::from_json_str(json).unwrap_err();
        match err {
            CatalogError::UnknownReference { owner, category, id } => {
                assert_eq!(owner, "burn");
                assert_eq!(category, "resource");
                assert_eq!(id, "coal");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = DefinitionCatalog::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }
}
