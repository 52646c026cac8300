//! End-to-end tests of the tile cache over the scripted backend

use crate::agent::{AgentProfileRegistry, AgentType, AreaMask};
use crate::backend::{CorridorStatus, RawCorridor};
use crate::config::NavTileConfig;
use crate::nav_tile_cache::NavTileCache;
use crate::query::{PathRequest, PathResult};
use crate::scheduler::SchedulerEvent;
use crate::test_helpers::StubWorld;
use crate::tile::{TileKey, TileState};
use glam::Vec3;
use navtile_common::Error;
use std::collections::HashSet;

fn cache_with(world: StubWorld) -> NavTileCache<StubWorld> {
    NavTileCache::new(
        NavTileConfig::default(),
        AgentProfileRegistry::with_defaults(),
        world,
    )
    .unwrap()
}

fn cache() -> NavTileCache<StubWorld> {
    cache_with(StubWorld::flat())
}

/// Pokes `points` and ticks until the tiles under all of them are built.
/// Returns the time of the last tick.
fn warm_up(cache: &mut NavTileCache<StubWorld>, points: &[Vec3], agent: AgentType) -> f64 {
    let mut now = cache.now();
    for _ in 0..1000 {
        for point in points {
            cache.poke(*point, agent).unwrap();
        }
        now += 0.25;
        cache.tick(now);

        let built = points.iter().all(|point| {
            let key = cache.tile_coord_for(*point, agent);
            cache.tile_state(&key) == Some(TileState::Built)
        });
        if built {
            return now;
        }
    }
    panic!("tiles never finished building");
}

#[test]
fn test_tile_identity() {
    let cache = cache();
    let agent = AgentType::Humanoid;
    let a = cache.tile_coord_for(Vec3::new(0.0, 0.0, 0.0), agent);
    let b = cache.tile_coord_for(Vec3::new(31.99, 250.0, 12.0), agent);
    let c = cache.tile_coord_for(Vec3::new(32.0, 0.0, 0.0), agent);
    let d = cache.tile_coord_for(Vec3::new(-0.01, 0.0, 0.0), agent);
    assert_eq!(a, b);
    assert_eq!(c, TileKey::new(1, 0, agent));
    assert_eq!(d, TileKey::new(-1, 0, agent));
    assert_ne!(a, cache.tile_coord_for(Vec3::ZERO, AgentType::Small));
}

#[test]
fn test_poke_rejects_unregistered_agent() {
    let mut registry = AgentProfileRegistry::new();
    let defaults = AgentProfileRegistry::with_defaults();
    registry.register(
        AgentType::Humanoid,
        defaults.get(AgentType::Humanoid).unwrap().clone(),
    );
    let mut cache =
        NavTileCache::new(NavTileConfig::default(), registry, StubWorld::flat()).unwrap();

    assert_eq!(
        cache.poke(Vec3::ZERO, AgentType::Large),
        Err(Error::UnknownAgentType(2))
    );
    assert!(cache.store().is_empty());
    assert_eq!(
        cache.find_path(Vec3::ZERO, Vec3::X, AgentType::Large),
        Err(Error::UnknownAgentType(2))
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = NavTileConfig::default().with_snap_radii(Vec::new());
    let result = NavTileCache::new(config, AgentProfileRegistry::with_defaults(), StubWorld::flat());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_interval_and_timeout_scenario() {
    let mut cache = cache();
    let center = Vec3::new(16.0, 0.0, 16.0);
    let key = cache.poke(center, AgentType::Humanoid).unwrap();
    assert_eq!(key, TileKey::new(0, 0, AgentType::Humanoid));

    let report = cache.tick(4.9);
    assert_eq!(report.scheduler, SchedulerEvent::Idle);
    assert_eq!(cache.tile_state(&key), Some(TileState::Unbuilt));

    let report = cache.tick(5.1);
    assert!(matches!(report.scheduler, SchedulerEvent::Dispatched(_)));

    // Nothing pokes again; no tile may go before the timeout has passed
    let mut now: f64 = 5.1;
    while now < 30.0 {
        now += 0.5;
        let report = cache.tick(now.min(30.0));
        assert_eq!(report.evicted, None);
        let stats = cache.statistics();
        assert!(stats.building_tiles <= 1);
    }
    assert!(cache.store().contains(&key));

    let mut now = 30.0;
    while now < 35.0 {
        now += 0.5;
        cache.tick(now);
    }
    assert!(!cache.store().contains(&key));
    assert!(cache.store().is_empty());
    assert_eq!(cache.statistics().tiles_evicted, 9);
}

#[test]
fn test_single_build_in_flight_under_load() {
    let mut world = StubWorld::flat();
    world.bake_polls = 2;
    let mut cache = cache_with(world);

    let spots = [
        (Vec3::new(5.0, 0.0, 5.0), AgentType::Humanoid),
        (Vec3::new(90.0, 0.0, -40.0), AgentType::Humanoid),
        (Vec3::new(5.0, 0.0, 5.0), AgentType::Large),
        (Vec3::new(-70.0, 0.0, 200.0), AgentType::Small),
    ];

    let mut now = 0.0;
    for step in 0..400 {
        // Each agent is active for a different stretch of time
        for (i, (point, agent)) in spots.iter().enumerate() {
            if (step / 50 + i) % 2 == 0 {
                cache.poke(*point, *agent).unwrap();
            }
        }
        now += 0.2;
        cache.tick(now);

        let stats = cache.statistics();
        assert!(stats.building_tiles <= 1);
        assert!(stats.building_tiles <= stats.in_flight.iter().count());
        assert!(cache.backend().outstanding_bakes() <= 1);
    }
    assert!(cache.statistics().builds_installed > 9);
}

#[test]
fn test_rebuild_without_ground_change_causes_no_link_churn() {
    let mut cache = cache();
    let point = Vec3::new(16.0, 0.0, 16.0);
    let mut installed = HashSet::new();
    let mut repeats = 0;

    let mut now = 0.0;
    for _ in 0..600 {
        cache.poke(point, AgentType::Humanoid).unwrap();
        now += 0.1;
        let report = cache.tick(now);
        if let SchedulerEvent::Installed(key, stitch) = report.scheduler {
            if !installed.insert(key) {
                repeats += 1;
                assert_eq!(stitch.links_created, 0);
                assert_eq!(stitch.links_queued, 0);
            }
        }
    }

    assert!(repeats > 0);
    assert!(cache.backend().removed_links.is_empty());
    assert_eq!(cache.queues().link_len(), 0);
    // 9 tiles, 16 stitch points on each of two edges
    assert_eq!(cache.statistics().stitch_links, 9 * 32);
}

#[test]
fn test_eviction_tears_down_links_before_data() {
    let mut cache = cache();
    let point = Vec3::new(16.0, 0.0, 16.0);
    cache.poke(point, AgentType::Humanoid).unwrap();

    let mut now = 5.0;
    while cache.statistics().built_tiles < 9 {
        now += 0.1;
        cache.tick(now);
    }
    let total_links = cache.backend().added_links.len();
    assert_eq!(total_links, 9 * 32);

    let mut data_removed = 0;
    for _ in 0..200 {
        now += 0.5;
        let links_queued_before = cache.queues().link_len();
        cache.tick(now);

        let removed = cache.backend().removed_data.len();
        if removed > data_removed {
            // Data is only touched once every queued link is gone
            assert_eq!(cache.queues().link_len(), 0);
            assert_eq!(links_queued_before, 0);
            data_removed = removed;
        }
    }

    assert!(cache.store().is_empty());
    assert_eq!(cache.backend().removed_links.len(), total_links);
    assert!(cache.backend().live_links.is_empty());
    assert_eq!(cache.backend().removed_data.len(), 9);
    assert!(cache.queues().is_empty());
}

#[test]
fn test_find_path_not_ready_schedules_endpoint_tiles() {
    let mut cache = cache();
    let from = Vec3::new(4.0, 0.0, 4.0);
    let to = Vec3::new(70.0, 0.0, 4.0);

    assert_eq!(
        cache.find_path(from, to, AgentType::Humanoid),
        Ok(PathResult::NotReady)
    );
    // Two 3x3 neighbourhoods, overlapping in one column
    assert_eq!(cache.store().len(), 15);
    assert!(cache.backend().path_log.borrow().is_empty());

    warm_up(&mut cache, &[from, to], AgentType::Humanoid);
    let result = cache.find_path(from, to, AgentType::Humanoid).unwrap();
    assert_eq!(result, PathResult::Complete(vec![from, to]));
}

#[test]
fn test_partial_path_starting_underground_is_invalid() {
    let mut cache = cache();
    let from = Vec3::new(4.0, 0.0, 4.0);
    let to = Vec3::new(20.0, 0.0, 20.0);
    warm_up(&mut cache, &[from, to], AgentType::Humanoid);

    cache.backend_mut().corridor = Some(RawCorridor {
        status: CorridorStatus::Partial,
        corners: vec![
            Vec3::new(4.0, -5.0, 4.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(14.0, 0.0, 14.0),
        ],
    });

    for require_full_path in [false, true] {
        let request = PathRequest::new(from, to, AgentType::Humanoid)
            .with_require_full_path(require_full_path);
        assert_eq!(cache.find_path_with(request), Err(Error::PathInvalid));
    }
}

#[test]
fn test_partial_path_stopping_underground_is_invalid() {
    let mut cache = cache();
    let from = Vec3::new(4.0, 0.0, 4.0);
    let to = Vec3::new(20.0, 0.0, 20.0);
    warm_up(&mut cache, &[from, to], AgentType::Humanoid);

    cache.backend_mut().corridor = Some(RawCorridor {
        status: CorridorStatus::Partial,
        corners: vec![
            Vec3::new(4.0, 0.0, 4.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(14.0, -5.0, 14.0),
        ],
    });

    let request = PathRequest::new(from, to, AgentType::Humanoid);
    assert_eq!(cache.find_path_with(request), Err(Error::PathInvalid));
}

#[test]
fn test_partial_path_with_underground_middle_corner_is_accepted() {
    let mut cache = cache();
    let from = Vec3::new(4.0, 0.0, 4.0);
    let to = Vec3::new(20.0, 0.0, 20.0);
    warm_up(&mut cache, &[from, to], AgentType::Humanoid);

    // Known gap: only the end corners are height-checked, so a corridor
    // dipping under the terrain in the middle still comes back as partial.
    cache.backend_mut().corridor = Some(RawCorridor {
        status: CorridorStatus::Partial,
        corners: vec![
            Vec3::new(4.0, 0.0, 4.0),
            Vec3::new(10.0, -5.0, 10.0),
            Vec3::new(14.0, 0.0, 14.0),
        ],
    });

    let request = PathRequest::new(from, to, AgentType::Humanoid);
    assert_eq!(
        cache.find_path_with(request),
        Ok(PathResult::Partial(vec![
            Vec3::new(4.0, 0.0, 4.0),
            Vec3::new(14.0, 0.0, 14.0),
        ]))
    );
}

#[test]
fn test_partial_path_within_margin_is_accepted() {
    let mut cache = cache();
    let from = Vec3::new(4.0, 0.0, 4.0);
    let to = Vec3::new(20.0, 0.0, 20.0);
    warm_up(&mut cache, &[from, to], AgentType::Humanoid);

    let corners = vec![Vec3::new(4.0, -0.5, 4.0), Vec3::new(14.0, 0.0, 14.0)];
    cache.backend_mut().corridor = Some(RawCorridor {
        status: CorridorStatus::Partial,
        corners: corners.clone(),
    });

    let request = PathRequest::new(from, to, AgentType::Humanoid);
    assert_eq!(cache.find_path_with(request), Ok(PathResult::Partial(corners)));

    let request = request.with_require_full_path(true);
    assert_eq!(cache.find_path_with(request), Err(Error::PathPartialRejected));
}

#[test]
fn test_invalid_corridor() {
    let mut cache = cache();
    let from = Vec3::new(4.0, 0.0, 4.0);
    warm_up(&mut cache, &[from], AgentType::Humanoid);

    cache.backend_mut().corridor = Some(RawCorridor::invalid());
    assert_eq!(
        cache.find_path(from, Vec3::new(8.0, 0.0, 8.0), AgentType::Humanoid),
        Err(Error::PathInvalid)
    );
}

#[test]
fn test_found_path_is_cleaned() {
    let mut world = StubWorld::flat();
    world.corridor = Some(RawCorridor {
        status: CorridorStatus::Complete,
        corners: vec![
            Vec3::new(4.0, 0.0, 4.0),
            Vec3::new(8.0, 0.0, 5.0),
            Vec3::new(12.0, 0.0, 3.0),
            Vec3::new(20.0, 0.0, 4.0),
        ],
    });
    let mut cache = cache_with(world);
    let from = Vec3::new(4.0, 0.0, 4.0);
    let to = Vec3::new(20.0, 0.0, 4.0);
    warm_up(&mut cache, &[from, to], AgentType::Humanoid);

    let result = cache.find_path(from, to, AgentType::Humanoid).unwrap();
    assert_eq!(result, PathResult::Complete(vec![from, to]));
}

#[test]
fn test_snap_walks_radius_ladder_in_order() {
    let mut world = StubWorld::flat();
    world.snap_min_radius = Some(6.0);
    let mut cache = cache_with(world);
    let point = Vec3::new(3.0, 0.5, 3.0);
    warm_up(&mut cache, &[point], AgentType::Humanoid);

    let snapped = cache.snap(point, AgentType::Humanoid, true).unwrap().unwrap();
    assert_eq!(snapped.radius, 6.0);
    assert_eq!(snapped.position, Vec3::new(3.0, 0.0, 3.0));
    assert_eq!(cache.backend().sampled_radii(), vec![1.0, 1.5, 3.0, 6.0]);
    // The owning tile and its neighbours were poked
    assert_eq!(cache.store().len(), 9);
}

#[test]
fn test_snap_without_extended_search_tries_one_radius() {
    let mut world = StubWorld::flat();
    world.snap_min_radius = Some(6.0);
    let mut cache = cache_with(world);
    warm_up(&mut cache, &[Vec3::ZERO], AgentType::Humanoid);

    assert_eq!(
        cache.snap(Vec3::ZERO, AgentType::Humanoid, false),
        Err(Error::SnapFailed)
    );
    assert_eq!(cache.backend().sampled_radii(), vec![1.0]);
}

#[test]
fn test_snap_diagnostic_probes() {
    let mut world = StubWorld::flat();
    world.snap_min_radius = Some(100.0);
    let mut cache = cache_with(world);
    warm_up(&mut cache, &[Vec3::ZERO], AgentType::Small);

    // The wide probe with the agent's own areas still returns its hit
    let snapped = cache.snap(Vec3::ZERO, AgentType::Small, true).unwrap().unwrap();
    assert_eq!(snapped.radius, 250.0);
    assert_eq!(
        cache.backend().sampled_radii(),
        vec![1.0, 1.5, 3.0, 6.0, 12.0, 250.0]
    );

    // Surface outside the agent's mask: the all-areas probe runs, the snap fails
    cache.backend_mut().surface_area = AreaMask::JUMP;
    cache.backend().sample_log.borrow_mut().clear();
    assert_eq!(
        cache.snap(Vec3::ZERO, AgentType::Small, true),
        Err(Error::SnapFailed)
    );
    let log = cache.backend().sample_log.borrow().clone();
    assert_eq!(log.len(), 7);
    assert_eq!(log[5], (250.0, AreaMask::WALKABLE));
    assert_eq!(log[6], (250.0, AreaMask::ALL));
}

#[test]
fn test_snap_on_unbuilt_tile_is_not_ready() {
    let mut cache = cache();

    assert_eq!(cache.snap(Vec3::ZERO, AgentType::Humanoid, true), Ok(None));
    // No ladder and no diagnostic probes against a tile without data
    assert!(cache.backend().sampled_radii().is_empty());
    assert_eq!(cache.store().len(), 9);

    warm_up(&mut cache, &[Vec3::ZERO], AgentType::Humanoid);
    let snapped = cache.snap(Vec3::ZERO, AgentType::Humanoid, true).unwrap();
    assert_eq!(snapped.map(|s| s.radius), Some(1.0));
}

#[test]
fn test_snap_lifts_point_below_terrain() {
    let mut world = StubWorld::flat();
    world.terrain_height = Some(3.0);
    let mut cache = cache_with(world);
    let point = Vec3::new(1.0, -10.0, 1.0);
    warm_up(&mut cache, &[point], AgentType::Humanoid);

    let snapped = cache
        .snap(point, AgentType::Humanoid, false)
        .unwrap()
        .unwrap();
    // Sampled from y = 3 instead of y = -10
    assert_eq!(snapped.distance, 3.0);
}

#[test]
fn test_destination_snap_depends_on_prior_path() {
    let mut world = StubWorld::flat();
    world.snap_min_radius = Some(3.0);
    let mut cache = cache_with(world);
    let from = Vec3::new(4.0, 0.0, 4.0);
    let to = Vec3::new(12.0, 0.0, 12.0);
    warm_up(&mut cache, &[from, to], AgentType::Humanoid);

    let request = PathRequest::new(from, to, AgentType::Humanoid);
    assert!(matches!(
        cache.find_path_with(request),
        Ok(PathResult::Complete(_))
    ));
    assert_eq!(
        cache.find_path_with(request.with_prior_path(true)),
        Err(Error::SnapFailed)
    );
}

#[test]
fn test_statistics() {
    let mut cache = cache();
    let point = Vec3::new(16.0, 0.0, 16.0);
    cache.poke(point, AgentType::Small).unwrap();

    let stats = cache.statistics();
    assert_eq!(stats.total_tiles, 9);
    assert_eq!(stats.unbuilt_tiles, 9);
    assert_eq!(stats.in_flight, None);

    cache.tick(6.0);
    let stats = cache.statistics();
    assert_eq!(stats.building_tiles, 1);
    assert_eq!(stats.unbuilt_tiles, 8);
    assert!(stats.in_flight.is_some());

    cache.tick(6.1);
    let stats = cache.statistics();
    assert_eq!(stats.built_tiles, 1);
    assert_eq!(stats.builds_installed, 1);
    assert_eq!(stats.stitch_links, 32);
}
