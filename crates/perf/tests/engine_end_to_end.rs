//! End-to-end tests through the public engine API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pokedex_cache::{names, CacheConfig, CacheValue, ManualClock, SetOptions};
use pokedex_perf::{
    EngineConfig, InsightConfig, Outcome, PerformanceEngine, Remediation, SuggestionKind,
    SuggestionPriority,
};

fn bulbasaur() -> CacheValue {
    let mut stats = BTreeMap::new();
    stats.insert("hp".to_string(), CacheValue::from(45u32));
    stats.insert("attack".to_string(), CacheValue::from(49u32));

    let mut pokemon = BTreeMap::new();
    pokemon.insert("id".to_string(), CacheValue::from(1u32));
    pokemon.insert("name".to_string(), CacheValue::from("bulbasaur"));
    pokemon.insert(
        "types".to_string(),
        CacheValue::from(vec![CacheValue::from("grass"), CacheValue::from("poison")]),
    );
    pokemon.insert("stats".to_string(), CacheValue::from(stats));
    CacheValue::from(pokemon)
}

fn engine(config: EngineConfig) -> (PerformanceEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let engine = PerformanceEngine::with_clock(config, clock.clone()).unwrap();
    (engine, clock)
}

#[test]
fn pokemon_entry_expires_after_its_ttl() {
    let (engine, clock) = engine(EngineConfig::default());
    let cache = engine.cache();

    cache.set_with(
        names::POKEMON_DATA,
        "bulbasaur",
        bulbasaur(),
        SetOptions::default().with_ttl(Duration::from_secs(30 * 60)),
    );

    let cached = cache.get(names::POKEMON_DATA, "bulbasaur").unwrap();
    assert_eq!(*cached, bulbasaur());
    assert_eq!(cached.get("name").and_then(CacheValue::as_str), Some("bulbasaur"));

    clock.advance(Duration::from_secs(31 * 60));

    assert!(cache.get(names::POKEMON_DATA, "bulbasaur").is_none());
    assert!(!cache.has(names::POKEMON_DATA, "bulbasaur"));
    assert_eq!(cache.memory_usage(), 0);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.expirations, 1);
}

#[test]
fn category_default_ttl_applies_without_override() {
    let (engine, clock) = engine(EngineConfig::default());
    let cache = engine.cache();

    cache.set(names::SEARCH_RESULTS, "fire", "charmander,vulpix");
    cache.set(names::TYPE_CHART, "fire", "water:2.0");

    clock.advance(Duration::from_secs(6 * 60));
    assert!(!cache.has(names::SEARCH_RESULTS, "fire"));
    assert!(cache.has(names::TYPE_CHART, "fire"));
}

#[test]
fn memory_pressure_suggestion_can_be_applied() {
    let config = EngineConfig::default().with_cache(CacheConfig::default().with_max_memory(10_000));
    let (engine, clock) = engine(config);
    let cache = engine.cache();

    for i in 0..9 {
        clock.advance(Duration::from_millis(1));
        cache.set_with(
            names::SPRITES,
            &format!("sprite-{}", i),
            vec![0u8; 4],
            SetOptions::default().with_size_hint(1_000),
        );
    }
    cache.set_with(
        names::TYPE_CHART,
        "all",
        "chart",
        SetOptions::default().with_size_hint(500),
    );

    let insights = engine.get_insights();
    assert_eq!(insights.cache_stats.memory_usage, 9_500);
    assert_eq!(insights.memory_breakdown[names::SPRITES].entries, 9);

    let memory = insights
        .suggestions
        .iter()
        .find(|s| s.kind == SuggestionKind::Memory)
        .unwrap();
    assert_eq!(memory.priority, SuggestionPriority::High);
    assert_eq!(memory.remediation, Some(Remediation::EvictPercentage(30)));

    let freed = engine.apply_remediation(&Remediation::EvictPercentage(30));
    assert!(freed >= 2_850);

    // Oldest sprites go first; the persistent type chart stays
    assert!(!cache.has(names::SPRITES, "sprite-0"));
    assert!(cache.has(names::SPRITES, "sprite-8"));
    assert!(cache.has(names::TYPE_CHART, "all"));
    assert!(engine
        .get_insights()
        .suggestions
        .iter()
        .all(|s| s.kind != SuggestionKind::Memory));
}

#[test]
fn low_hit_rate_is_reported_after_enough_lookups() {
    let config = EngineConfig::default().with_insights(InsightConfig::default().with_min_hit_rate(0.7, 10));
    let (engine, _) = engine(config);
    let cache = engine.cache();

    cache.set(names::MOVE_DATA, "tackle", "normal");
    for _ in 0..3 {
        cache.get(names::MOVE_DATA, "tackle");
    }
    for i in 0..7 {
        cache.get(names::MOVE_DATA, &format!("missing-{}", i));
    }

    let insights = engine.get_insights();
    assert_eq!(insights.cache_stats.lookups(), 10);
    assert_eq!(insights.suggestions.len(), 1);
    assert_eq!(insights.suggestions[0].kind, SuggestionKind::Cache);
    assert!(insights.suggestions[0].remediation.is_none());
}

#[test]
fn profiled_operations_feed_insights() {
    let (engine, _) = engine(EngineConfig::default());
    let profiler = engine.profiler();

    for _ in 0..3 {
        let result: Result<u32, String> = profiler.measure("fetch_pokemon", || Ok(1));
        assert!(result.is_ok());
    }
    let failed: Result<u32, String> = profiler.measure("fetch_pokemon", || Err("404".to_string()));
    assert_eq!(failed, Err("404".to_string()));

    for _ in 0..6 {
        profiler.record("generate_team_analysis", Duration::from_millis(800), Outcome::Success);
    }

    let insights = engine.get_insights();
    assert_eq!(insights.top_operations[0].name, "generate_team_analysis");
    assert_eq!(insights.top_operations[1].name, "fetch_pokemon");
    assert_eq!(insights.top_operations[1].errors, 1);
    assert_eq!(insights.slow_operations.len(), 6);

    let performance = insights
        .suggestions
        .iter()
        .find(|s| s.kind == SuggestionKind::Performance)
        .unwrap();
    assert_eq!(
        performance.affected_operations,
        Some(vec!["generate_team_analysis".to_string()])
    );
}

#[test]
fn insights_serialize_to_json() {
    let (engine, _) = engine(EngineConfig::default());
    engine.cache().set(names::AI_RESPONSES, "team-1", "Add a water type");
    engine
        .profiler()
        .record("ask_model", Duration::from_secs(2), Outcome::Error);

    let json = serde_json::to_value(engine.get_insights()).unwrap();
    assert_eq!(json["cache_stats"]["entry_count"], 1);
    assert_eq!(json["memory_breakdown"][names::AI_RESPONSES]["entries"], 1);
    assert_eq!(json["slow_operations"][0]["operation"], "ask_model");
    assert_eq!(json["slow_operations"][0]["outcome"], "error");
}

#[test]
fn shutdown_releases_everything() {
    let (engine, _) = engine(EngineConfig::default());
    engine.cache().set(names::USER_PREFERENCES, "theme", "dark");

    engine.shutdown();
    engine.shutdown();

    assert!(engine.cache().is_empty());
    assert_eq!(engine.cache().memory_usage(), 0);
    assert!(!engine.is_running());
}
