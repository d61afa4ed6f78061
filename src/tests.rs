use crate::{
    Egid, EntitiesDb, EntitiesDbConfig, EntitiesDbError, EntityDescriptor, Group, GroupInfo,
    GroupKind, LifecycleEvent, StagedSpawner, StepDriver, StepEngine,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Copy, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

impl Position {
    fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Score(u32);

#[derive(EntityDescriptor)]
struct Body {
    position: Position,
    velocity: Velocity,
}

#[derive(EntityDescriptor)]
struct Scored(Position, Score);

#[derive(EntityDescriptor)]
struct Tagged<T> {
    position: Position,
    tag: T,
}

#[test]
fn swap_removal_moves_last_row() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(3).unwrap();

    let a = db.build_entity(g, (Position::new(0.0, 0.0),)).unwrap();
    let b = db.build_entity(g, (Position::new(1.0, 1.0),)).unwrap();
    let c = db.build_entity(g, (Position::new(2.0, 2.0),)).unwrap();

    db.remove_entity(a).unwrap();

    assert_eq!(
        db.query_entities::<Position>(g).unwrap(),
        &[Position::new(2.0, 2.0), Position::new(1.0, 1.0)]
    );
    assert_eq!(db.query_entities_and_index::<Position>(c).unwrap().0, 0);
    assert_eq!(db.query_entities_and_index::<Position>(b).unwrap().0, 1);
    assert_eq!(db.count::<Position>(g), 2);
    assert_eq!(db.group_len(g).unwrap(), 2);
}

#[test]
fn removing_last_row_keeps_others_in_place() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    let ids: Vec<_> = (0..3)
        .map(|i| db.build_entity(g, (Score(i),)).unwrap())
        .collect();

    db.remove_entity(ids[2]).unwrap();

    assert_eq!(db.query_entities::<Score>(g).unwrap(), &[Score(0), Score(1)]);
    assert_eq!(db.query_entities_and_index::<Score>(ids[0]).unwrap().0, 0);
    assert_eq!(db.query_entities_and_index::<Score>(ids[1]).unwrap().0, 1);
}

#[test]
fn built_components_read_back() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();

    let e = db
        .build_entity(
            g,
            Body {
                position: Position::new(3.0, 4.0),
                velocity: Velocity { x: 1.0, y: -1.0 },
            },
        )
        .unwrap();

    let (index, positions) = db.query_entities_and_index::<Position>(e).unwrap();
    assert_eq!(positions[index], Position::new(3.0, 4.0));
    let (index, velocities) = db.query_entities_and_index::<Velocity>(e).unwrap();
    assert_eq!(velocities[index], Velocity { x: 1.0, y: -1.0 });

    assert!(db.exists::<Position>(e));
    assert!(!db.exists::<Score>(e));
}

#[test]
fn removed_entity_is_unknown() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    let e = db.build_entity(g, Scored(Position::new(1.0, 1.0), Score(1))).unwrap();
    db.build_entity(g, Scored(Position::new(2.0, 2.0), Score(2))).unwrap();

    db.remove_entity(e).unwrap();

    for _ in 0..2 {
        assert!(matches!(
            db.query_entity::<Score>(e),
            Err(EntitiesDbError::UnknownEntity(egid)) if egid == e
        ));
        assert!(db.try_query_entities_and_index::<Score>(e).is_none());
        assert!(!db.exists::<Score>(e));
    }
    assert!(matches!(
        db.remove_entity(e),
        Err(EntitiesDbError::UnknownEntity(_))
    ));
}

#[test]
fn random_builds_and_removals_keep_rows_aligned() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut db = EntitiesDb::new();
    let groups = [db.allocate_group(0).unwrap(), db.allocate_group(64).unwrap()];
    let mut model: HashMap<Egid, (Position, Score)> = HashMap::new();

    for _ in 0..1000 {
        if !model.is_empty() && rng.gen_bool(0.4) {
            let victim = *model.keys().nth(rng.gen_range(0..model.len())).unwrap();
            db.remove_entity(victim).unwrap();
            model.remove(&victim);
        } else {
            let group = groups[rng.gen_range(0..groups.len())];
            let row = (Position::new(rng.gen(), rng.gen()), Score(rng.gen()));
            let egid = db.build_entity(group, row).unwrap();
            assert!(model.insert(egid, row).is_none());
        }

        for (egid, (position, score)) in &model {
            assert_eq!(db.query_entity::<Position>(*egid).unwrap(), position);
            assert_eq!(db.query_entity::<Score>(*egid).unwrap(), score);
        }
    }

    for group in groups {
        let expected = model.keys().filter(|e| e.group == group).count();
        assert_eq!(db.count::<Score>(group), expected);
        assert_eq!(db.query_entities::<Position>(group).unwrap().len(), expected);
    }
    assert_eq!(db.len(), model.len());
}

#[test]
fn swap_group_preserves_values() {
    let mut db = EntitiesDb::new();
    let from = db.allocate_group(0).unwrap();
    let to = db.allocate_group(0).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    db.subscribe_lifecycle::<Score, _>(move |egid, score, event| {
        sink.lock().unwrap().push((egid, score.0, event));
    });

    let e = db.build_entity(from, Scored(Position::new(5.0, 6.0), Score(7))).unwrap();
    let keep = db.build_entity(from, Scored(Position::new(1.0, 1.0), Score(1))).unwrap();

    let moved = db.swap_entity_group(e, to).unwrap();

    assert_eq!(moved.group, to);
    assert_eq!(db.query_entity::<Position>(moved).unwrap(), &Position::new(5.0, 6.0));
    assert_eq!(db.query_entity::<Score>(moved).unwrap(), &Score(7));
    assert_eq!(db.query_entity::<Score>(keep).unwrap(), &Score(1));
    assert!(matches!(
        db.query_entity::<Score>(e),
        Err(EntitiesDbError::UnknownEntity(_))
    ));
    assert_eq!(db.group_len(from).unwrap(), 1);

    let events = events.lock().unwrap();
    assert_eq!(
        events[2..],
        [
            (
                e,
                7,
                LifecycleEvent::Removed {
                    swapped_to: Some(moved)
                }
            ),
            (
                moved,
                7,
                LifecycleEvent::Added {
                    previous_group: Some(from)
                }
            ),
        ]
    );
}

#[test]
fn swap_group_requires_matching_components() {
    let mut db = EntitiesDb::new();
    let from = db.allocate_group(0).unwrap();
    let to = db.allocate_group(0).unwrap();
    db.build_entity(to, (Score(0),)).unwrap();

    let e = db.build_entity(from, Scored(Position::new(1.0, 2.0), Score(3))).unwrap();

    assert!(matches!(
        db.swap_entity_group(e, to),
        Err(EntitiesDbError::ComponentSetMismatch { group }) if group == to
    ));
    assert_eq!(db.query_entity::<Score>(e).unwrap(), &Score(3));
    assert_eq!(db.swap_entity_group(e, from).unwrap(), e);
}

#[test]
fn swapping_a_removed_entity_fails() {
    let mut db = EntitiesDb::new();
    let from = db.allocate_group(0).unwrap();
    let to = db.allocate_group(0).unwrap();
    let e = db.build_entity(from, (Score(1),)).unwrap();
    db.remove_entity(e).unwrap();

    assert!(matches!(
        db.swap_entity_group(e, to),
        Err(EntitiesDbError::UnknownEntity(stale)) if stale == e
    ));
    assert_eq!(db.len(), 0);
}

#[test]
fn all_entities_are_visited_in_ascending_group_order() {
    let mut db = EntitiesDb::new();
    for id in [7, 2, 5] {
        let group = Group::new(id);
        db.register_group(group, GroupInfo::default()).unwrap();
        db.build_entity(group, (Score(id),)).unwrap();
        db.build_entity(group, (Score(id * 10),)).unwrap();
    }
    let positions = db.allocate_group(0).unwrap();
    db.build_entity(positions, (Position::new(0.0, 0.0),)).unwrap();

    for _ in 0..3 {
        let mut visited = Vec::new();
        db.execute_on_all_entities::<Score, _>(|score, data| {
            visited.push((data.egid.group.id(), score.0));
            Ok(())
        })
        .unwrap();
        assert_eq!(visited, [(2, 2), (2, 20), (5, 5), (5, 50), (7, 7), (7, 70)]);
    }

    let mut visited = Vec::new();
    db.execute_on_groups::<Score, _>(&[Group::new(5), positions, Group::new(2)], |score, _| {
        visited.push(score.0);
        Ok(())
    })
    .unwrap();
    assert_eq!(visited, [5, 50, 2, 20]);
}

#[test]
fn whole_arrays_are_visited_in_ascending_group_order() {
    let mut db = EntitiesDb::new();
    for id in [4, 1] {
        let group = Group::new(id);
        db.register_group(group, GroupInfo::default()).unwrap();
        for i in 0..id {
            db.build_entity(group, (Score(i),)).unwrap();
        }
    }
    let positions = db.allocate_group(0).unwrap();
    db.build_entity(positions, (Position::new(0.0, 0.0),)).unwrap();

    let mut visited = Vec::new();
    db.execute_on_all_arrays::<Score, _>(|scores, group, db| {
        assert!(matches!(
            db.build_entity(group, (Score(0),)),
            Err(EntitiesDbError::InvalidMutationDuringIteration { .. })
        ));
        scores.iter_mut().for_each(|s| s.0 += 100);
        visited.push((group.id(), scores.len()));
        Ok(())
    })
    .unwrap();

    assert_eq!(visited, [(1, 1), (4, 4)]);
    assert_eq!(
        db.query_entities::<Score>(Group::new(4)).unwrap(),
        &[Score(100), Score(101), Score(102), Score(103)]
    );
    db.build_entity(Group::new(1), (Score(0),)).unwrap();
}

#[test]
fn panicking_action_releases_the_array() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    let e = db.build_entity(g, (Score(1),)).unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        db.execute_on_entities::<Score, _>(g, |_, _| panic!("action failed"))
    }));
    assert!(outcome.is_err());

    assert_eq!(db.query_entities::<Score>(g).unwrap(), &[Score(1)]);
    let built = db.build_entity(g, (Score(2),)).unwrap();
    db.remove_entity(e).unwrap();
    assert_eq!(db.query_entity::<Score>(built).unwrap(), &Score(2));
}

#[test]
fn unique_queries_require_exactly_one_row() {
    let mut db = EntitiesDb::new();
    let singleton = db
        .allocate_group_with(GroupInfo::new(GroupKind::Unique))
        .unwrap();
    db.preallocate::<Score>(singleton, 1).unwrap();

    assert!(matches!(
        db.query_unique::<Score>(singleton),
        Err(EntitiesDbError::NotUnique { count: 0, .. })
    ));

    db.build_entity(singleton, (Score(5),)).unwrap();
    assert_eq!(db.query_unique::<Score>(singleton).unwrap(), &Score(5));
    *db.query_unique_mut::<Score>(singleton).unwrap() = Score(9);
    assert_eq!(db.query_entities::<Score>(singleton).unwrap(), &[Score(9)]);

    assert!(matches!(
        db.build_entity(singleton, (Score(1),)),
        Err(EntitiesDbError::UniqueGroupOccupied(_))
    ));

    let pair = db.allocate_group(0).unwrap();
    db.build_entity(pair, (Score(1),)).unwrap();
    db.build_entity(pair, (Score(2),)).unwrap();
    assert!(matches!(
        db.query_unique::<Score>(pair),
        Err(EntitiesDbError::NotUnique { count: 2, .. })
    ));
}

#[test]
fn iterated_group_rejects_structural_changes() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    let other = db.allocate_group(0).unwrap();
    for i in 0..3 {
        db.build_entity(g, (Score(i),)).unwrap();
    }
    let outsider = db.build_entity(other, (Score(100),)).unwrap();

    let mut visited = 0;
    db.execute_on_entities::<Score, _>(g, |score, data| {
        score.0 += 10;
        visited += 1;

        let db = data.entities_db;
        assert!(matches!(
            db.build_entity(g, (Score(0),)),
            Err(EntitiesDbError::InvalidMutationDuringIteration { .. })
        ));
        assert!(matches!(
            db.remove_entity(data.egid),
            Err(EntitiesDbError::InvalidMutationDuringIteration { .. })
        ));
        assert!(matches!(
            db.swap_entity_group(outsider, g),
            Err(EntitiesDbError::InvalidMutationDuringIteration { .. })
        ));
        assert!(matches!(
            db.query_entities::<Score>(g),
            Err(EntitiesDbError::ArrayInUse { .. })
        ));

        db.query_entity_mut::<Score>(outsider)?.0 += 1;
        db.build_entity(other, (Score(0),))?;
        Ok(())
    })
    .unwrap();

    assert_eq!(visited, 3);
    assert_eq!(db.query_entities::<Score>(g).unwrap(), &[Score(10), Score(11), Score(12)]);
    assert_eq!(db.query_entity::<Score>(outsider).unwrap(), &Score(103));
    assert_eq!(db.count::<Score>(other), 4);
    db.build_entity(g, (Score(3),)).unwrap();
}

#[test]
fn action_error_stops_iteration() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    for i in 0..4 {
        db.build_entity(g, (Score(i),)).unwrap();
    }

    let mut seen = 0;
    let err = db
        .execute_on_entities::<Score, _>(g, |_, data| {
            seen += 1;
            Err(EntitiesDbError::UnknownEntity(data.egid))
        })
        .unwrap_err();

    assert!(matches!(err, EntitiesDbError::UnknownEntity(e) if e.id == 0));
    assert_eq!(seen, 1);
    assert_eq!(db.query_entities::<Score>(g).unwrap().len(), 4);
    db.remove_entity(Egid::new(0, g)).unwrap();
}

#[test]
fn missing_type_differs_from_empty_array() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    db.preallocate::<Score>(g, 16).unwrap();

    assert!(db.query_entities::<Score>(g).unwrap().is_empty());
    assert!(!db.has_any::<Score>(g));
    assert!(matches!(
        db.query_entities::<Position>(g),
        Err(EntitiesDbError::MissingComponentType { .. })
    ));
    assert_eq!(db.count::<Position>(g), 0);

    let unknown = Group::new(999);
    assert!(!db.exists_group(unknown));
    assert!(matches!(
        db.query_entities::<Score>(unknown),
        Err(EntitiesDbError::UnknownGroup(_))
    ));
}

#[test]
fn builds_must_match_group_components() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    db.build_entity(g, Scored(Position::new(0.0, 0.0), Score(0))).unwrap();

    assert!(matches!(
        db.build_entity(g, (Score(1),)),
        Err(EntitiesDbError::ComponentSetMismatch { .. })
    ));
    assert!(matches!(
        db.build_entity(g, (Score(1), Score(2))),
        Err(EntitiesDbError::DuplicateComponentType { .. })
    ));
    assert!(matches!(
        db.preallocate::<Velocity>(g, 8),
        Err(EntitiesDbError::ComponentSetMismatch { .. })
    ));
    // Same set in a different order is accepted.
    db.build_entity(g, (Score(2), Position::new(1.0, 1.0))).unwrap();
    assert_eq!(db.group_len(g).unwrap(), 2);
}

#[test]
fn joined_queries_are_index_aligned() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    for i in 0..4 {
        db.build_entity(
            g,
            (Position::new(i as f32, 0.0), Velocity { x: 1.0, y: 2.0 }, Score(i)),
        )
        .unwrap();
    }
    db.remove_entity(Egid::new(1, g)).unwrap();

    let (positions, velocities) = db.query_entities2_mut::<Position, Velocity>(g).unwrap();
    for (p, v) in positions.iter_mut().zip(velocities.iter()) {
        p.x += v.x;
        p.y += v.y;
    }

    let (positions, _, scores) = db.query_entities3::<Position, Velocity, Score>(g).unwrap();
    for (p, s) in positions.iter().zip(scores) {
        assert_eq!(*p, Position::new(s.0 as f32 + 1.0, 2.0));
    }

    assert!(matches!(
        db.query_entities2_mut::<Score, Score>(g),
        Err(EntitiesDbError::DuplicateComponentType { .. })
    ));
}

#[test]
fn joined_queries_report_missing_types() {
    let mut db = EntitiesDb::new();
    let bodies = db.allocate_group(0).unwrap();
    db.build_entity(
        bodies,
        Body {
            position: Position::new(0.0, 0.0),
            velocity: Velocity { x: 1.0, y: 1.0 },
        },
    )
    .unwrap();
    let scored = db.allocate_group(0).unwrap();
    db.build_entity(scored, Scored(Position::new(1.0, 1.0), Score(1))).unwrap();
    let empty = db.allocate_group(0).unwrap();
    db.preallocate::<Position>(empty, 8).unwrap();

    let missing_velocity = |err: EntitiesDbError| {
        matches!(err, EntitiesDbError::MissingComponentType { component, .. } if component.ends_with("Velocity"))
    };

    assert!(missing_velocity(db.query_entities2::<Position, Velocity>(scored).unwrap_err()));
    assert!(missing_velocity(db.query_entities2::<Position, Velocity>(empty).unwrap_err()));
    assert!(missing_velocity(db.query_entities2_mut::<Position, Velocity>(empty).unwrap_err()));
    assert!(missing_velocity(
        db.query_entities3::<Position, Velocity, Score>(scored).unwrap_err()
    ));
    assert!(missing_velocity(
        db.query_entities3_mut::<Score, Position, Velocity>(scored).unwrap_err()
    ));
    assert!(db.query_entities::<Position>(empty).unwrap().is_empty());
}

#[test]
fn three_way_mutable_query_updates_every_array() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    for i in 0..3 {
        db.build_entity(g, (Score(i), Position::new(0.0, 0.0), Velocity { x: 2.0, y: 0.0 }))
            .unwrap();
    }

    let (scores, positions, velocities) =
        db.query_entities3_mut::<Score, Position, Velocity>(g).unwrap();
    for ((s, p), v) in scores.iter_mut().zip(positions.iter_mut()).zip(velocities.iter_mut()) {
        p.x += v.x * s.0 as f32;
        v.y = 1.0;
        s.0 += 1;
    }

    let (scores, positions, velocities) =
        db.query_entities3::<Score, Position, Velocity>(g).unwrap();
    assert_eq!(scores, &[Score(1), Score(2), Score(3)]);
    assert_eq!(positions[2], Position::new(4.0, 0.0));
    assert!(velocities.iter().all(|v| v.y == 1.0));
}

#[test]
fn generic_descriptors_build_entities() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    let e = db
        .build_entity(
            g,
            Tagged {
                position: Position::new(3.0, 4.0),
                tag: Score(9),
            },
        )
        .unwrap();

    assert_eq!(db.query_entity::<Score>(e).unwrap(), &Score(9));
    assert_eq!(db.query_entity::<Position>(e).unwrap(), &Position::new(3.0, 4.0));
}

#[test]
fn explicit_ids_advance_the_counter() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();

    let e = db.build_entity_with_id(Egid::new(10, g), (Score(1),)).unwrap();
    assert_eq!(e, Egid::new(10, g));
    assert!(matches!(
        db.build_entity_with_id(Egid::new(10, g), (Score(2),)),
        Err(EntitiesDbError::DuplicateEntity(_))
    ));
    assert_eq!(db.build_entity(g, (Score(3),)).unwrap().id, 11);
}

#[test]
fn change_listeners_run_in_subscription_order() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    let e = db.build_entity(g, Scored(Position::new(0.0, 0.0), Score(0))).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second"] {
        let log = Arc::clone(&log);
        db.subscribe_changes::<Score, _>(move |egid, score| {
            log.lock().unwrap().push(format!("{} {} {}", name, egid.id, score.0));
            Ok(())
        });
    }

    db.query_entity_mut::<Score>(e).unwrap().0 = 42;
    db.publish_entity_change::<Score>(e).unwrap();
    db.publish_entity_change::<Score>(e).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        ["first 0 42", "second 0 42", "first 0 42", "second 0 42"]
    );

    db.subscribe_changes::<Position, _>(|_, _| Err(anyhow::anyhow!("rejected")));
    let err = db.publish_entity_change::<Position>(e).unwrap_err();
    match err {
        EntitiesDbError::Listener { component, source } => {
            assert!(component.ends_with("Position"));
            assert_eq!(source.to_string(), "rejected");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn mapped_queries_resolve_local_ids() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    let ids: Vec<_> = (0..10)
        .map(|i| db.build_entity(g, (Score(i),)).unwrap())
        .collect();
    db.remove_entity(ids[3]).unwrap();

    let mut mapper = db.query_mapped::<Score>(g).unwrap();
    assert_eq!(mapper.len(), 9);
    for (i, e) in ids.iter().enumerate().filter(|(i, _)| *i != 3) {
        assert_eq!(mapper.entity(e.id).unwrap(), &Score(i as u32));
        mapper.entity_mut(e.id).unwrap().0 += 100;
    }
    assert!(!mapper.contains(ids[3].id));
    assert!(matches!(
        mapper.entity(ids[3].id),
        Err(EntitiesDbError::UnknownEntity(_))
    ));

    assert_eq!(db.query_entity::<Score>(ids[9]).unwrap(), &Score(109));
}

#[test]
fn entries_expose_all_components() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    let e = db.build_entity(g, Scored(Position::new(1.0, 2.0), Score(3))).unwrap();

    {
        let mut entry = db.entry_mut(e).unwrap();
        entry.get_mut::<Score>().unwrap().0 = 30;
        assert!(entry.get_mut::<Velocity>().is_none());
    }

    let entry = db.entry(e).unwrap();
    assert_eq!(entry.egid(), e);
    assert_eq!(entry.get::<Position>(), Some(&Position::new(1.0, 2.0)));
    assert_eq!(entry.get::<Score>(), Some(&Score(30)));
}

#[test]
fn raw_view_writes_through() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();
    for i in 0..3 {
        db.build_entity(g, (Score(i),)).unwrap();
    }

    let raw = db.query_entities_raw::<Score>(g).unwrap();
    assert_eq!(raw.len(), 3);
    unsafe {
        raw.get_unchecked_mut(1).0 = 77;
    }

    assert_eq!(db.query_entities::<Score>(g).unwrap()[1], Score(77));
}

#[test]
fn groups_are_enumerated_by_tag() {
    let mut db = EntitiesDb::with_config(EntitiesDbConfig::default().with_first_group_id(100));

    let a = db
        .allocate_group_with(GroupInfo::default().with_tag("damageable"))
        .unwrap();
    let b = db.allocate_group(0).unwrap();
    db.register_group(Group::new(3), GroupInfo::default().with_tag("damageable"))
        .unwrap();

    assert_eq!(a, Group::new(100));
    assert_eq!(b, Group::new(101));
    let tagged: Vec<_> = db.groups_tagged("damageable").collect();
    assert_eq!(tagged, [Group::new(3), a]);

    assert!(matches!(
        db.register_group(Group::new(3), GroupInfo::new(GroupKind::Exclusive)),
        Err(EntitiesDbError::DuplicateGroup { .. })
    ));
}

#[test]
fn group_capacity_is_limited_by_config() {
    let mut db = EntitiesDb::with_config(EntitiesDbConfig::default().with_max_entities_per_group(2));
    let g = db.allocate_group(0).unwrap();
    db.build_entity(g, (Score(0),)).unwrap();
    db.build_entity(g, (Score(1),)).unwrap();

    assert!(matches!(
        db.build_entity(g, (Score(2),)),
        Err(EntitiesDbError::IdSpaceExhausted(_))
    ));
}

#[test]
fn staged_spawner_resumes_across_steps() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(0).unwrap();

    let spawner = StagedSpawner::new(g, 10, 4, |i| (Score(i as u32),));
    let mut driver = StepDriver::new().with(spawner);

    for expected in [4, 8, 10, 10] {
        driver.run_step(&mut db).unwrap();
        assert_eq!(db.group_len(g).unwrap(), expected);
    }
    assert_eq!(driver.ticks(), 4);
    assert_eq!(db.query_entities::<Score>(g).unwrap()[9], Score(9));
}

struct Failing;

impl StepEngine for Failing {
    fn step(&mut self, _: &mut EntitiesDb) -> crate::Result<()> {
        Err(EntitiesDbError::UnknownGroup(Group::new(99)))
    }
}

struct Counting(Arc<AtomicUsize>);

impl StepEngine for Counting {
    fn step(&mut self, _: &mut EntitiesDb) -> crate::Result<()> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn failing_engine_ends_the_step() {
    let mut db = EntitiesDb::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let mut driver = StepDriver::new()
        .with(Counting(Arc::clone(&runs)))
        .with(Failing)
        .with(Counting(Arc::clone(&runs)));

    assert!(driver.run_step(&mut db).is_err());
    assert_eq!(runs.load(Ordering::Relaxed), 1);
    assert_eq!(driver.ticks(), 0);
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_iteration_updates_every_component() {
    let mut db = EntitiesDb::new();
    let g = db.allocate_group(1000).unwrap();
    for i in 0..1000 {
        db.build_entity(g, (Score(i),)).unwrap();
    }

    db.par_for_each_mut::<Score, _>(g, |s| s.0 *= 2).unwrap();

    let scores = db.query_entities::<Score>(g).unwrap();
    assert!(scores.iter().enumerate().all(|(i, s)| s.0 == i as u32 * 2));
}
