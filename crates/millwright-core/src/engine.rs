//! Economy engine - main entry point for running the simulation

use hecs::{Entity, EntityBuilder, World};
use millwright_logic::agent::{AgentEvent, AgentState};
use millwright_logic::catalog::{load_catalog_from_env, DefinitionCatalog, StorageDef};
use millwright_logic::config::{load_config_from_env, EconomyConfig};
use millwright_logic::dispatch::TaskDispatcher;
use millwright_logic::ids::{EntityId, ResourceKind, TeamId};
use millwright_logic::storage::FlowMode;
use millwright_logic::tasks::{JobRole, Specialization};
use thiserror::Error;

use crate::components::*;
use crate::context::{EventBus, SimContext, StorageNetwork};
use crate::interfaces::{Alert, AlertSink, Locomotion, StraightLineMover, ThrottledAlerts};
use crate::systems::*;

/// Rejected engine command. The world is left untouched.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown building definition '{0}'")]
    UnknownBuilding(String),
    #[error("unknown recipe '{0}'")]
    UnknownRecipe(String),
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("entity {0} does not exist")]
    MissingEntity(EntityId),
    #[error("entity {entity} is not a {expected}")]
    WrongKind { entity: EntityId, expected: &'static str },
    #[error("recipe '{recipe}' cannot run in '{building}'")]
    RecipeNotAllowed { recipe: String, building: String },
    #[error("station {0} is already at its upgrade limit")]
    UpgradeLimit(EntityId),
}

/// Everything needed to put a new civilian into the world.
#[derive(Debug, Clone)]
pub struct CivilianSpawn {
    pub name: Option<Name>,
    pub team: TeamId,
    pub role: JobRole,
    pub specialization: Option<Specialization>,
    /// Tool definition id.
    pub tool: Option<String>,
    pub position: Vec2,
}

impl CivilianSpawn {
    pub fn new(team: TeamId, role: JobRole, position: Vec2) -> Self {
        Self {
            name: None,
            team,
            role,
            specialization: None,
            tool: None,
            position,
        }
    }

    pub fn specialized(mut self, specialization: Specialization) -> Self {
        self.specialization = Some(specialization);
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn named(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }
}

/// Main simulation engine
pub struct EconomyEngine {
    /// ECS world containing all entities
    pub world: World,
    pub catalog: DefinitionCatalog,
    pub config: EconomyConfig,
    pub dispatcher: TaskDispatcher,
    pub network: StorageNetwork,
    pub events: EventBus,
    alerts: Box<dyn AlertSink>,
    locomotion: Box<dyn Locomotion>,
    /// Simulation time in seconds since start
    sim_time: f64,
    tick: u64,
    time_scale: f32,
}

impl EconomyEngine {
    /// Create an empty settlement with the builtin definitions and tuning
    pub fn new() -> Self {
        Self::with_definitions(DefinitionCatalog::builtin(), EconomyConfig::builtin())
    }

    pub fn with_definitions(catalog: DefinitionCatalog, config: EconomyConfig) -> Self {
        let alerts = ThrottledAlerts::new(config.alerts.throttle_seconds);
        let mover = StraightLineMover {
            speed: config.workers.move_speed,
        };
        Self {
            world: World::new(),
            catalog,
            config,
            dispatcher: TaskDispatcher::new(),
            network: StorageNetwork::new(),
            events: EventBus::new(),
            alerts: Box::new(alerts),
            locomotion: Box::new(mover),
            sim_time: 0.0,
            tick: 0,
            time_scale: 1.0,
        }
    }

    /// Definitions and tuning from `MILLWRIGHT_CATALOG` / `MILLWRIGHT_CONFIG`,
    /// falling back to the builtin documents.
    pub fn from_env() -> Self {
        let (catalog, catalog_path) = load_catalog_from_env();
        let (config, config_path) = load_config_from_env();
        log::info!(
            target: "millwright::engine",
            "engine starting (catalog: {}, config: {})",
            catalog_path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".into()),
            config_path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".into()),
        );
        Self::with_definitions(catalog, config)
    }

    pub fn with_locomotion(mut self, locomotion: impl Locomotion + 'static) -> Self {
        self.locomotion = Box::new(locomotion);
        self
    }

    pub fn with_alert_sink(mut self, alerts: impl AlertSink + 'static) -> Self {
        self.alerts = Box::new(alerts);
        self
    }

    fn split(&mut self) -> (&mut World, SimContext<'_>) {
        (
            &mut self.world,
            SimContext {
                catalog: &self.catalog,
                config: &self.config,
                dispatcher: &mut self.dispatcher,
                network: &mut self.network,
                events: &mut self.events,
                alerts: self.alerts.as_mut(),
                locomotion: self.locomotion.as_ref(),
                now: self.sim_time,
            },
        )
    }

    /// Advance the simulation by `delta_seconds` (scaled by the time scale)
    pub fn update(&mut self, delta_seconds: f32) {
        let dt = delta_seconds * self.time_scale;
        if dt <= 0.0 {
            return;
        }
        self.sim_time += dt as f64;
        self.tick += 1;

        let (world, mut ctx) = self.split();
        construction_system(world, &mut ctx);
        needs_system(world, &mut ctx, dt);
        production_system(world, &mut ctx, dt);
        task_generator_system(world, &mut ctx);
        agents_system(world, &mut ctx, dt);
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Simulation time in seconds
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    // ── Commands ────────────────────────────────────────────────────────

    fn resource(&self, id: &str) -> Result<ResourceKind, CommandError> {
        self.catalog
            .resource(id)
            .ok_or_else(|| CommandError::UnknownResource(id.to_string()))
    }

    fn entity(&self, id: EntityId) -> Result<Entity, CommandError> {
        entity_of(id)
            .filter(|e| self.world.contains(*e))
            .ok_or(CommandError::MissingEntity(id))
    }

    fn entity_with<T: hecs::Component>(&self, id: EntityId, expected: &'static str) -> Result<Entity, CommandError> {
        let entity = self.entity(id)?;
        if self.world.get::<&T>(entity).is_err() {
            return Err(CommandError::WrongKind { entity: id, expected });
        }
        Ok(entity)
    }

    /// Place a building. Unless its definition is free and instant it starts
    /// as a construction site and its storage, station and beds stay inert
    /// until finished.
    pub fn place_building(&mut self, def_id: &str, team: TeamId, position: Vec2) -> Result<EntityId, CommandError> {
        let def = self
            .catalog
            .building(def_id)
            .ok_or_else(|| CommandError::UnknownBuilding(def_id.to_string()))?;

        let mut builder = EntityBuilder::new();
        builder.add(Building {
            def_id: def.id.clone(),
            team,
        });
        builder.add(Position(position));
        if let Some(storage) = &def.storage {
            builder.add(ledger_for(&self.catalog, storage));
        }
        if let Some(station_def) = &def.station {
            let mut station = ProductionStation::new(station_def.spec.clone(), self.config.production.station_tuning());
            if let Some(recipe) = station_def.default_recipe().and_then(|r| self.catalog.recipe_by_id(r)) {
                station = station.with_recipe(recipe.clone());
            }
            builder.add(station);
        }
        if let Some(house) = &def.house {
            builder.add(House::new(house.capacity));
        }
        let instant = def.is_instant();
        if !instant {
            builder.add(ConstructionSite::new(&def.cost, def.build_time_seconds));
            builder.add(SiteCrew::default());
        }

        let id = id_of(self.world.spawn(builder.build()));
        self.events.mark_changed(id);
        log::info!(
            target: "millwright::engine",
            "placed {} {} for team {}{}",
            def_id,
            id,
            team,
            if instant { "" } else { " (construction site)" }
        );
        Ok(id)
    }

    /// Tear a building down. Its stock is lost, reservations aimed at it are
    /// dropped, and anyone working there notices on their next step.
    pub fn remove_building(&mut self, building: EntityId) -> Result<(), CommandError> {
        let entity = self.entity_with::<Building>(building, "building")?;
        let residents = self
            .world
            .get::<&House>(entity)
            .map(|h| h.residents.clone())
            .unwrap_or_default();
        for resident in residents {
            if let Some(mut civ) = entity_of(resident).and_then(|e| self.world.get::<&mut Civilian>(e).ok()) {
                if civ.house == Some(building) {
                    civ.house = None;
                }
            }
        }
        self.network.release_destination(building);
        self.network.forget_storage(building);
        self.dispatcher.cancel_target(building);
        self.events.mark_removed(building);
        self.world
            .despawn(entity)
            .map_err(|_| CommandError::MissingEntity(building))?;
        log::info!(target: "millwright::engine", "removed building {}", building);
        Ok(())
    }

    /// Spawn a gatherable node. Nodes belong to no team.
    pub fn spawn_node(
        &mut self,
        resource: &str,
        position: Vec2,
        amount: u32,
        slots: u32,
        seconds_per_unit: f32,
    ) -> Result<EntityId, CommandError> {
        let kind = self.resource(resource)?;
        let entity = self.world.spawn((
            ResourceNode::new(kind, amount, slots, seconds_per_unit),
            Position(position),
        ));
        let id = id_of(entity);
        self.events.mark_changed(id);
        Ok(id)
    }

    pub fn spawn_civilian(&mut self, spawn: CivilianSpawn) -> Result<EntityId, CommandError> {
        let mut civ = Civilian::new(spawn.team, spawn.role);
        civ.specialization = spawn.specialization;
        if let Some(tool) = &spawn.tool {
            civ.tool = Some(
                self.catalog
                    .tool(tool)
                    .ok_or_else(|| CommandError::UnknownTool(tool.clone()))?,
            );
        }
        let entity = match spawn.name {
            Some(name) => self.world.spawn((civ, Position(spawn.position), name)),
            None => self.world.spawn((civ, Position(spawn.position))),
        };
        let id = id_of(entity);
        log::debug!(target: "millwright::engine", "spawned {:?} {} for team {}", spawn.role, id, spawn.team);
        Ok(id)
    }

    fn raise(&mut self, civilian: EntityId, event: AgentEvent) -> Result<bool, CommandError> {
        let entity = self.entity_with::<Civilian>(civilian, "civilian")?;
        let (world, mut ctx) = self.split();
        Ok(raise(world, &mut ctx, entity, event))
    }

    /// Change a civilian's job. Claims held for the old job are released at
    /// once; a civilian in a need state finishes it and then takes up the new
    /// role.
    pub fn set_role(&mut self, civilian: EntityId, role: JobRole) -> Result<(), CommandError> {
        let entity = self.entity_with::<Civilian>(civilian, "civilian")?;
        let current = self.world.get::<&Civilian>(entity).map(|c| c.role()).ok();
        if current == Some(role) {
            return Ok(());
        }
        self.raise(civilian, AgentEvent::RoleChanged(role))?;
        Ok(())
    }

    pub fn set_specialization(&mut self, civilian: EntityId, specialization: Option<Specialization>) -> Result<(), CommandError> {
        let entity = self.entity_with::<Civilian>(civilian, "civilian")?;
        if let Ok(mut civ) = self.world.get::<&mut Civilian>(entity) {
            civ.specialization = specialization;
        }
        self.raise(civilian, AgentEvent::Cancel)?;
        Ok(())
    }

    /// Drop the current task and go back to searching. Returns false if
    /// there was nothing to cancel.
    pub fn cancel_task(&mut self, civilian: EntityId) -> Result<bool, CommandError> {
        self.raise(civilian, AgentEvent::Cancel)
    }

    /// Remove a civilian for good, releasing everything it held this tick.
    pub fn kill_civilian(&mut self, civilian: EntityId) -> Result<(), CommandError> {
        let entity = self.entity_with::<Civilian>(civilian, "civilian")?;
        let Ok(civ) = self.world.get::<&Civilian>(entity).map(|c| (*c).clone()) else {
            return Err(CommandError::MissingEntity(civilian));
        };
        let claims = civ.state().claims();
        {
            let (world, mut ctx) = self.split();
            release_claims(world, &mut ctx, civilian, civ.team, &claims);
        }
        if let Some(mut house) = civ
            .house
            .and_then(entity_of)
            .and_then(|e| self.world.get::<&mut House>(e).ok())
        {
            house.residents.remove(&civilian);
        }
        self.world
            .despawn(entity)
            .map_err(|_| CommandError::MissingEntity(civilian))?;
        log::info!(target: "millwright::engine", "civilian {} died", civilian);
        Ok(())
    }

    /// Switch a station to another recipe its building allows, or clear it.
    /// Workers who cannot serve the new recipe lose their seats.
    pub fn set_recipe(&mut self, building: EntityId, recipe: Option<&str>) -> Result<(), CommandError> {
        let entity = self.entity_with::<ProductionStation>(building, "production station")?;
        let def_id = self
            .world
            .get::<&Building>(entity)
            .map(|b| b.def_id.clone())
            .map_err(|_| CommandError::WrongKind {
                entity: building,
                expected: "building",
            })?;
        let recipe = match recipe {
            Some(name) => {
                let recipe = self
                    .catalog
                    .recipe(name)
                    .ok_or_else(|| CommandError::UnknownRecipe(name.to_string()))?;
                let allowed = self
                    .catalog
                    .building(&def_id)
                    .and_then(|d| d.station.as_ref())
                    .is_some_and(|s| s.recipes.contains(&recipe.id));
                if !allowed {
                    return Err(CommandError::RecipeNotAllowed {
                        recipe: name.to_string(),
                        building: def_id,
                    });
                }
                Some(recipe.clone())
            }
            None => None,
        };

        let world = &self.world;
        let specialization_of = |worker: EntityId| {
            entity_of(worker)
                .and_then(|e| world.get::<&Civilian>(e).ok())
                .and_then(|c| c.specialization)
        };
        let evicted = match world.get::<&mut ProductionStation>(entity) {
            Ok(mut station) => {
                let mut evicted = station.set_recipe(recipe);
                evicted.extend(station.evict_mismatched(specialization_of));
                evicted
            }
            Err(_) => Vec::new(),
        };
        if !evicted.is_empty() {
            log::info!(target: "millwright::engine", "recipe change at {} unseated {} civilians", building, evicted.len());
        }
        self.dispatcher.cancel_target(building);
        self.events.mark_changed(building);
        Ok(())
    }

    /// Raise a station's upgrade level. Returns the new level.
    pub fn upgrade_station(&mut self, building: EntityId) -> Result<u32, CommandError> {
        let entity = self.entity_with::<ProductionStation>(building, "production station")?;
        let level = {
            let mut station = self
                .world
                .get::<&mut ProductionStation>(entity)
                .map_err(|_| CommandError::MissingEntity(building))?;
            if !station.upgrade() {
                return Err(CommandError::UpgradeLimit(building));
            }
            station.upgrade_level()
        };
        self.events.mark_changed(building);
        Ok(level)
    }

    /// Set the flow mode for one resource of a storage, or for every
    /// configured resource when `resource` is `None`.
    pub fn set_flow_mode(&mut self, building: EntityId, resource: Option<&str>, flow: FlowMode) -> Result<(), CommandError> {
        let kind = resource.map(|r| self.resource(r)).transpose()?;
        let entity = self.entity_with::<StorageLedger>(building, "storage")?;
        if let Ok(mut ledger) = self.world.get::<&mut StorageLedger>(entity) {
            match kind {
                Some(kind) => ledger.set_flow_mode(kind, flow),
                None => ledger.set_flow_mode_all(flow),
            }
        }
        self.events.mark_changed(building);
        Ok(())
    }

    /// Put goods straight into a storage, as starting stock or a scripted
    /// delivery. Returns the amount that fit.
    pub fn stock(&mut self, building: EntityId, resource: &str, amount: u32) -> Result<u32, CommandError> {
        let kind = self.resource(resource)?;
        let entity = self.entity_with::<StorageLedger>(building, "storage")?;
        let accepted = self
            .world
            .get::<&mut StorageLedger>(entity)
            .map(|mut ledger| ledger.deposit(kind, amount))
            .unwrap_or(0);
        self.events.mark_changed(building);
        Ok(accepted)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn civilian(&self, civilian: EntityId) -> Option<Civilian> {
        let entity = entity_of(civilian)?;
        self.world.get::<&Civilian>(entity).ok().map(|c| (*c).clone())
    }

    pub fn state_of(&self, civilian: EntityId) -> Option<AgentState> {
        self.civilian(civilian).map(|c| c.state().clone())
    }

    pub fn position_of(&self, id: EntityId) -> Option<Vec2> {
        crate::queries::position_of(&self.world, id)
    }

    /// Units of `resource` in one storage.
    pub fn stored(&self, building: EntityId, resource: &str) -> u32 {
        let Some(kind) = self.catalog.resource(resource) else {
            return 0;
        };
        entity_of(building)
            .and_then(|e| self.world.get::<&StorageLedger>(e).ok())
            .map(|ledger| ledger.stored(kind))
            .unwrap_or(0)
    }

    /// Units of `resource` across a team's finished storages.
    pub fn team_stock(&self, team: TeamId, resource: &str) -> u32 {
        self.catalog
            .resource(resource)
            .map(|kind| crate::queries::team_supply(&self.world, team, kind))
            .unwrap_or(0)
    }

    pub fn station(&self, building: EntityId) -> Option<ProductionStation> {
        let entity = entity_of(building)?;
        self.world.get::<&ProductionStation>(entity).ok().map(|s| (*s).clone())
    }

    pub fn site(&self, building: EntityId) -> Option<ConstructionSite> {
        let entity = entity_of(building)?;
        self.world.get::<&ConstructionSite>(entity).ok().map(|s| (*s).clone())
    }

    pub fn is_built(&self, building: EntityId) -> bool {
        crate::queries::is_active(&self.world, building)
    }

    pub fn civilian_count(&self) -> usize {
        self.world.query::<&Civilian>().iter().count()
    }

    pub fn building_count(&self) -> usize {
        self.world.query::<&Building>().iter().count()
    }

    pub fn node_count(&self) -> usize {
        self.world.query::<&ResourceNode>().iter().count()
    }

    pub fn pending_tasks(&self) -> usize {
        self.dispatcher.pending_count()
    }

    /// Civilians currently over their hunger or fatigue threshold.
    pub fn civilians_with_urgent_needs(&self) -> Vec<(EntityId, millwright_logic::needs::NeedKind)> {
        self.world
            .query::<&Civilian>()
            .iter()
            .filter_map(|(e, civ)| civ.needs.urgent(&self.config.needs).map(|kind| (id_of(e), kind)))
            .collect()
    }

    /// Alerts delivered since the last drain.
    pub fn drain_alerts(&mut self) -> Vec<Alert> {
        self.alerts.drain()
    }

    pub fn report(&self) -> crate::report::EconomyReport {
        crate::report::EconomyReport::collect(self)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Save simulation state to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), crate::persistence::SaveError> {
        crate::persistence::save_simulation(
            writer,
            &self.world,
            self.sim_time,
            self.tick,
            self.time_scale,
            &self.dispatcher,
            &self.network,
            &self.events,
        )
    }

    /// Load simulation state from a reader. Definitions, tuning and the
    /// installed collaborators are kept.
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), crate::persistence::SaveError> {
        let loaded = crate::persistence::load_simulation(reader)?;
        self.world = loaded.world;
        self.sim_time = loaded.sim_time;
        self.tick = loaded.tick;
        self.time_scale = loaded.time_scale;
        self.dispatcher = loaded.dispatcher;
        self.network = loaded.network;
        self.events = loaded.events;
        Ok(())
    }
}

impl Default for EconomyEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A fresh ledger sized from a storage definition. Kinds with no capacity
/// are left out.
fn ledger_for(catalog: &DefinitionCatalog, def: &StorageDef) -> StorageLedger {
    let mut ledger = StorageLedger::new();
    for resource in catalog.resources() {
        let capacity = def
            .capacities
            .get(&resource.kind)
            .copied()
            .unwrap_or(def.default_capacity);
        if capacity > 0 {
            ledger.set_capacity(resource.kind, capacity);
            ledger.set_flow_mode(resource.kind, def.flow);
        }
    }
    ledger
}
