//! Millwright Headless Simulation Harness
//!
//! Builds whole settlements from the builtin catalog, runs them for minutes of
//! simulated time and checks the economy invariants every tick.
//! Runs entirely in-process, no rendering and no host.
//!
//! Usage:
//!   cargo run -p millwright-simtest
//!   cargo run -p millwright-simtest -- --verbose
//!   cargo run -p millwright-simtest -- --json report.json
//!
//! Set `RUST_LOG=millwright=debug` for engine logs.

use std::collections::BTreeSet;

use millwright_core::generation::{generate_settlement, SettlementConfig};
use millwright_core::prelude::*;
use millwright_core::report::EconomyReport;
use millwright_logic::catalog::DefinitionCatalog;
use millwright_logic::config::EconomyConfig;
use serde::Serialize;

const TEAM: TeamId = TeamId(0);
const DT: f32 = 0.25;

// ── Test harness ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HarnessReport {
    passed: usize,
    failed: usize,
    results: Vec<TestResult>,
    /// Final state of the default settlement run
    settlement: Option<EconomyReport>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let json_path = args
        .iter()
        .position(|a| a == "--json")
        .and_then(|i| args.get(i + 1))
        .cloned();
    println!("=== Millwright Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Definition catalog
    results.extend(validate_catalog(verbose));

    // 2. Economy config
    results.extend(validate_config(verbose));

    // 3. Default settlement, long run
    let (settlement_results, settlement) = validate_settlement(verbose);
    results.extend(settlement_results);

    // 4. Grain to bread through two stations
    results.extend(validate_bread_chain(verbose));

    // 5. Starvation pressure
    results.extend(validate_food_shortage(verbose));

    // 6. Save and load mid-run
    results.extend(validate_persistence(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    for r in &results {
        let tag = if r.passed { "PASS" } else { "FAIL" };
        if !r.passed || verbose {
            println!("  {} {}: {}", tag, r.name, r.detail);
        }
    }

    println!("\n=== RESULT: {}/{} passed, {} failed ===", passed, results.len(), failed);

    if let Some(path) = json_path {
        let report = HarnessReport {
            passed,
            failed,
            results,
            settlement,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&path, json) {
                    eprintln!("failed to write {}: {}", path, err);
                }
            }
            Err(err) => eprintln!("failed to encode report: {}", err),
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Invariants ──────────────────────────────────────────────────────────

/// Everything that must hold after any tick. Returns one line per breach.
fn invariant_breaches(engine: &EconomyEngine) -> Vec<String> {
    let mut breaches = Vec::new();
    let world = &engine.world;

    for (entity, node) in world.query::<&ResourceNode>().iter() {
        if node.gatherers.len() as u32 > node.slots {
            breaches.push(format!(
                "node {} has {} gatherers for {} slots",
                id_of(entity),
                node.gatherers.len(),
                node.slots
            ));
        }
    }

    for (entity, station) in world.query::<&ProductionStation>().iter() {
        if station.assigned_count() > station.effective_max_workers() {
            breaches.push(format!("station {} over its worker limit", id_of(entity)));
        }
        if station.hauler_count() > station.max_haulers() {
            breaches.push(format!("station {} over its hauler limit", id_of(entity)));
        }
    }

    for (entity, ledger) in world.query::<&StorageLedger>().iter() {
        for (kind, entry) in ledger.entries() {
            if entry.stored > entry.capacity {
                breaches.push(format!(
                    "storage {} holds {} {} over capacity {}",
                    id_of(entity),
                    entry.stored,
                    engine.catalog.resource_name(kind),
                    entry.capacity
                ));
            }
        }
    }

    let mut residents = BTreeSet::new();
    for (entity, house) in world.query::<&House>().iter() {
        if house.residents.len() as u32 > house.capacity {
            breaches.push(format!("house {} over capacity", id_of(entity)));
        }
        for resident in &house.residents {
            if !residents.insert(*resident) {
                breaches.push(format!("civilian {} lives in two houses", resident));
            }
        }
    }

    breaches
}

/// Run for `seconds`, collecting the first few invariant breaches.
fn run_checked(engine: &mut EconomyEngine, seconds: f32) -> Vec<String> {
    let mut breaches = Vec::new();
    let ticks = (seconds / DT).round() as u32;
    for _ in 0..ticks {
        engine.update(DT);
        if breaches.len() < 5 {
            breaches.extend(invariant_breaches(engine));
        }
    }
    breaches
}

fn breach_result(name: &str, breaches: &[String]) -> TestResult {
    TestResult::new(
        name,
        breaches.is_empty(),
        if breaches.is_empty() {
            "no invariant breaches".to_string()
        } else {
            breaches.join("; ")
        },
    )
}

// ── 1. Definition Catalog ───────────────────────────────────────────────

fn validate_catalog(verbose: bool) -> Vec<TestResult> {
    println!("--- Definition Catalog ---");
    let mut results = Vec::new();
    let catalog = DefinitionCatalog::builtin();

    results.push(TestResult::new(
        "catalog_resources",
        catalog.resources().len() >= 5,
        format!("{} resources loaded", catalog.resources().len()),
    ));

    let edible = catalog.edible_kinds();
    results.push(TestResult::new(
        "catalog_has_food",
        !edible.is_empty(),
        format!("{} edible resources", edible.len()),
    ));

    let required = ["stockpile", "house", "sawmill"];
    let missing: Vec<_> = required.iter().filter(|id| catalog.building(id).is_none()).collect();
    results.push(TestResult::new(
        "catalog_core_buildings",
        missing.is_empty(),
        if missing.is_empty() {
            "stockpile, house and sawmill defined".to_string()
        } else {
            format!("missing: {:?}", missing)
        },
    ));

    let stockpile_instant = catalog.building("stockpile").is_some_and(|b| b.is_instant() && b.storage.is_some());
    results.push(TestResult::new(
        "catalog_stockpile_instant",
        stockpile_instant,
        "stockpile needs no construction",
    ));

    // Every station recipe resolves and has inputs and outputs
    let mut bad_recipes = Vec::new();
    for building in catalog.buildings() {
        let Some(station) = &building.station else { continue };
        if station.recipes.is_empty() {
            bad_recipes.push(format!("{} has no recipes", building.id));
        }
        for recipe in &station.recipes {
            match catalog.recipe_by_id(*recipe) {
                Some(r) if r.inputs.is_empty() || r.outputs.is_empty() => {
                    bad_recipes.push(format!("{} has an empty side", r.name))
                }
                Some(r) if r.craft_time_seconds <= 0.0 => bad_recipes.push(format!("{} is instant", r.name)),
                Some(_) => {}
                None => bad_recipes.push(format!("{} names an unknown recipe", building.id)),
            }
        }
    }
    results.push(TestResult::new(
        "catalog_station_recipes",
        bad_recipes.is_empty(),
        if bad_recipes.is_empty() {
            "all station recipes resolve".to_string()
        } else {
            bad_recipes.join(", ")
        },
    ));

    let empty_storage: Vec<_> = catalog
        .buildings()
        .filter(|b| {
            b.storage
                .as_ref()
                .is_some_and(|s| s.default_capacity == 0 && s.capacities.values().all(|c| *c == 0))
        })
        .map(|b| b.id.clone())
        .collect();
    results.push(TestResult::new(
        "catalog_storage_capacity",
        empty_storage.is_empty(),
        if empty_storage.is_empty() {
            format!("{} buildings checked", catalog.buildings().count())
        } else {
            format!("no capacity: {}", empty_storage.join(", "))
        },
    ));

    if verbose {
        for building in catalog.buildings() {
            println!(
                "  {:<10} cost {:>2} units, {:>4.0}s{}{}{}",
                building.id,
                building.cost.iter().map(|c| c.amount).sum::<u32>(),
                building.build_time_seconds,
                if building.storage.is_some() { ", storage" } else { "" },
                if building.station.is_some() { ", station" } else { "" },
                if building.house.is_some() { ", house" } else { "" },
            );
        }
    }

    results
}

// ── 2. Economy Config ───────────────────────────────────────────────────

fn validate_config(_verbose: bool) -> Vec<TestResult> {
    println!("--- Economy Config ---");
    let mut results = Vec::new();
    let config = EconomyConfig::builtin();

    let needs = &config.needs;
    results.push(TestResult::new(
        "config_need_thresholds",
        0.0 < needs.satisfied_threshold && needs.satisfied_threshold < needs.seek_threshold && needs.seek_threshold <= 1.0,
        format!("satisfied {} < seek {}", needs.satisfied_threshold, needs.seek_threshold),
    ));

    results.push(TestResult::new(
        "config_needs_recover",
        needs.sleep_recovery_per_second > needs.fatigue_per_second && needs.rough_sleep_factor > 0.0,
        format!(
            "sleep recovers {}/s, rough factor {}",
            needs.sleep_recovery_per_second, needs.rough_sleep_factor
        ),
    ));

    let workers = &config.workers;
    results.push(TestResult::new(
        "config_workers",
        workers.carry_capacity > 0 && workers.move_speed > 0.0 && workers.build_rate > 0.0,
        format!("carry {}, speed {}", workers.carry_capacity, workers.move_speed),
    ));

    results.push(TestResult::new(
        "config_stall_before_eviction",
        workers.work_point_stall_seconds < config.production.absence_timeout_seconds,
        format!(
            "stall {}s, absence timeout {}s",
            workers.work_point_stall_seconds, config.production.absence_timeout_seconds
        ),
    ));

    results.push(TestResult::new(
        "config_site_crews",
        config.construction.max_builders_per_site > 0 && config.construction.max_haulers_per_site > 0,
        format!(
            "{} builders, {} haulers per site",
            config.construction.max_builders_per_site, config.construction.max_haulers_per_site
        ),
    ));

    results
}

// ── 3. Default Settlement ───────────────────────────────────────────────

fn validate_settlement(verbose: bool) -> (Vec<TestResult>, Option<EconomyReport>) {
    println!("--- Default Settlement ---");
    let mut results = Vec::new();
    let mut engine = EconomyEngine::new();
    let config = SettlementConfig::default();

    let settlement = match generate_settlement(&mut engine, &config) {
        Ok(s) => s,
        Err(err) => {
            results.push(TestResult::new("settlement_generate", false, err.to_string()));
            return (results, None);
        }
    };
    let population = settlement.civilians.len();
    let before = engine.report();

    let breaches = run_checked(&mut engine, 600.0);
    results.push(breach_result("settlement_invariants", &breaches));

    let after = engine.report();
    let gathered: Vec<String> = before
        .node_reserves
        .iter()
        .filter(|(id, left)| after.node_reserves.get(*id).is_some_and(|now| now < *left))
        .map(|(id, _)| id.clone())
        .collect();
    results.push(TestResult::new(
        "settlement_gathering",
        gathered.iter().any(|id| id == "wood") && gathered.iter().any(|id| id == "stone"),
        format!("gathered from: {}", gathered.join(", ")),
    ));

    let built = settlement.buildings.iter().filter(|b| engine.is_built(**b)).count();
    results.push(TestResult::new(
        "settlement_construction",
        built == settlement.buildings.len(),
        format!("{}/{} buildings finished", built, settlement.buildings.len()),
    ));

    let planks = after.team_stock(TEAM.0, "plank");
    let queued: u32 = after
        .stations
        .iter()
        .filter_map(|s| s.outputs.get("plank"))
        .sum();
    results.push(TestResult::new(
        "settlement_planks",
        planks + queued > 0,
        format!("{} planks stored, {} at stations", planks, queued),
    ));

    results.push(TestResult::new(
        "settlement_population",
        engine.civilian_count() == population,
        format!("{} civilians alive", engine.civilian_count()),
    ));

    let idle = after.in_state("idle");
    results.push(TestResult::new(
        "settlement_everyone_employed",
        idle == 0,
        format!("{} idle", idle),
    ));

    let alerts = engine.drain_alerts();
    if verbose {
        println!("  states after 600s: {:?}", after.states);
        println!("  stock: {:?}", after.stock.get(&TEAM.0));
        for alert in &alerts {
            println!("  alert {:?}: {}", alert.kind, alert.message);
        }
    }

    (results, Some(after))
}

// ── 4. Bread Chain ──────────────────────────────────────────────────────

fn place_bread_chain(engine: &mut EconomyEngine) -> Result<(EntityId, EntityId, EntityId), CommandError> {
    let store = engine.place_building("stockpile", TEAM, Vec2::ZERO)?;
    engine.stock(store, "wood", 60)?;
    engine.stock(store, "stone", 30)?;
    engine.stock(store, "grain", 60)?;
    let mill = engine.place_building("mill", TEAM, Vec2::new(8.0, 0.0))?;
    let bakery = engine.place_building("bakery", TEAM, Vec2::new(-8.0, 0.0))?;
    for i in 0..2 {
        let offset = i as f32;
        engine.spawn_civilian(CivilianSpawn::new(TEAM, JobRole::Builder, Vec2::new(offset, 2.0)).with_tool("hammer"))?;
        engine.spawn_civilian(CivilianSpawn::new(TEAM, JobRole::Hauler, Vec2::new(offset, -2.0)))?;
    }
    engine.spawn_civilian(CivilianSpawn::new(TEAM, JobRole::Crafter, Vec2::new(2.0, 0.0)).specialized(Specialization::Miller))?;
    engine.spawn_civilian(CivilianSpawn::new(TEAM, JobRole::Crafter, Vec2::new(-2.0, 0.0)).specialized(Specialization::Baker))?;
    Ok((store, mill, bakery))
}

fn validate_bread_chain(verbose: bool) -> Vec<TestResult> {
    println!("--- Bread Chain ---");
    let mut results = Vec::new();
    let mut engine = EconomyEngine::new();

    let setup = place_bread_chain(&mut engine);
    let (store, mill, bakery) = match setup {
        Ok(ids) => ids,
        Err(err) => {
            results.push(TestResult::new("bread_setup", false, err.to_string()));
            return results;
        }
    };

    let breaches = run_checked(&mut engine, 900.0);
    results.push(breach_result("bread_invariants", &breaches));

    results.push(TestResult::new(
        "bread_stations_built",
        engine.is_built(mill) && engine.is_built(bakery),
        format!("mill built: {}, bakery built: {}", engine.is_built(mill), engine.is_built(bakery)),
    ));

    let grain_left = engine.stored(store, "grain");
    results.push(TestResult::new(
        "bread_grain_milled",
        grain_left < 60,
        format!("{} grain left in the stockpile", grain_left),
    ));

    let report = engine.report();
    let bread = report.team_stock(TEAM.0, "bread")
        + report
            .stations
            .iter()
            .filter_map(|s| s.outputs.get("bread"))
            .sum::<u32>();
    results.push(TestResult::new("bread_baked", bread > 0, format!("{} bread made", bread)));

    if verbose {
        for station in &report.stations {
            println!(
                "  {} {:?}: in {:?} out {:?}",
                station.building, station.state, station.inputs, station.outputs
            );
        }
    }

    results
}

// ── 5. Food Shortage ────────────────────────────────────────────────────

fn place_hungry_camp(engine: &mut EconomyEngine) -> Result<EntityId, CommandError> {
    let store = engine.place_building("stockpile", TEAM, Vec2::ZERO)?;
    engine.spawn_node("wood", Vec2::new(10.0, 0.0), 500, 4, 2.0)?;
    for i in 0..4 {
        engine.spawn_civilian(CivilianSpawn::new(TEAM, JobRole::Gatherer, Vec2::new(i as f32, 0.0)))?;
    }
    Ok(store)
}

fn validate_food_shortage(_verbose: bool) -> Vec<TestResult> {
    println!("--- Food Shortage ---");
    let mut results = Vec::new();

    let mut config = EconomyConfig::builtin();
    config.needs.hunger_per_second = 2.0;
    let mut engine = EconomyEngine::with_definitions(DefinitionCatalog::builtin(), config);

    let setup = place_hungry_camp(&mut engine);
    let store = match setup {
        Ok(store) => store,
        Err(err) => {
            results.push(TestResult::new("shortage_setup", false, err.to_string()));
            return results;
        }
    };

    let breaches = run_checked(&mut engine, 60.0);
    results.push(breach_result("shortage_invariants", &breaches));

    let hungry = engine.civilians_with_urgent_needs().len();
    results.push(TestResult::new(
        "shortage_needs_rise",
        hungry > 0,
        format!("{} civilians with urgent needs", hungry),
    ));

    let alerts = engine.drain_alerts();
    let no_food = alerts.iter().filter(|a| a.kind == AlertKind::NoFood).count();
    results.push(TestResult::new(
        "shortage_alerted",
        no_food > 0,
        format!("{} no-food alerts after throttling", no_food),
    ));

    // Food arrives: everyone eats and goes back to work
    if let Err(err) = engine.stock(store, "berries", 100) {
        results.push(TestResult::new("shortage_restock", false, err.to_string()));
        return results;
    }
    run_checked(&mut engine, 20.0);
    let berries = engine.stored(store, "berries");
    results.push(TestResult::new(
        "shortage_recovers",
        berries < 100,
        format!("{} berries eaten", 100 - berries),
    ));

    results
}

// ── 6. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(_verbose: bool) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();
    let mut engine = EconomyEngine::new();
    if let Err(err) = generate_settlement(&mut engine, &SettlementConfig::default()) {
        results.push(TestResult::new("persist_generate", false, err.to_string()));
        return results;
    }
    run_checked(&mut engine, 120.0);

    let mut buffer = Vec::new();
    if let Err(err) = engine.save(&mut buffer) {
        results.push(TestResult::new("persist_save", false, err.to_string()));
        return results;
    }
    results.push(TestResult::new(
        "persist_save",
        !buffer.is_empty(),
        format!("{} bytes", buffer.len()),
    ));

    let mut restored = EconomyEngine::new();
    if let Err(err) = restored.load(buffer.as_slice()) {
        results.push(TestResult::new("persist_load", false, err.to_string()));
        return results;
    }
    let same = engine.report() == restored.report();
    results.push(TestResult::new(
        "persist_report_matches",
        same,
        format!("tick {} restored", restored.tick_count()),
    ));

    let breaches = run_checked(&mut restored, 120.0);
    results.push(breach_result("persist_continues", &breaches));

    results
}
