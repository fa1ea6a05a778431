use scene_physics::prelude::*;
use tracing::info;

fn setup() -> (World, PhysicsSystem<ReferenceSolver>) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // One solver step per tick keeps the event stream easy to read
    let config = PhysicsConfig {
        gravity: Vec3::ZERO,
        max_sub_steps: 0,
        ..Default::default()
    };
    let system = PhysicsSystem::new(ReferenceSolver::new(), config).unwrap();
    (World::new(), system)
}

fn tick(system: &mut PhysicsSystem<ReferenceSolver>, world: &mut World) -> Vec<PhysicsEvent> {
    update_hierarchy_system(world);
    system.process(world, 1.0 / 60.0);
    let events: Vec<PhysicsEvent> = system.drain_events().collect();
    info!("Tick events: {:?}", events);
    events
}

fn contact_events(events: &[PhysicsEvent]) -> Vec<PhysicsEvent> {
    events
        .iter()
        .copied()
        .filter(|event| *event != PhysicsEvent::SubStep)
        .collect()
}

#[test]
fn test_begin_during_end_sequence() {
    let (mut world, mut system) = setup();

    let ball = world.spawn_with_transform((
        Transform::default(),
        RigidBody::dynamic(1.0),
        Collider::sphere(0.5),
    ));
    let post = world.spawn_with_transform((
        Transform::from_position(Vec3::new(0.8, 0.0, 0.0)),
        Collider::sphere(0.5),
    ));

    let first = tick(&mut system, &mut world);
    let first_contacts = contact_events(&first);
    assert_eq!(first_contacts.len(), 1);
    assert!(matches!(first_contacts[0], PhysicsEvent::BeginContact { .. }));
    assert!(first_contacts[0].involves_pair(ball, post));
    assert_eq!(first.last(), Some(&PhysicsEvent::SubStep));

    for _ in 0..3 {
        let events = contact_events(&tick(&mut system, &mut world));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PhysicsEvent::DuringContact { .. }));
        assert!(events[0].involves_pair(ball, post));
    }

    // Fast enough to clear the post within a single step
    let handle = system.body_handle(ball).unwrap();
    system
        .solver_mut()
        .set_body_velocity(handle, Vec3::new(-600.0, 0.0, 0.0))
        .unwrap();

    let events = contact_events(&tick(&mut system, &mut world));
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], PhysicsEvent::EndContact { .. }));
    assert!(events[0].involves_pair(ball, post));

    // Nothing more once apart
    assert!(contact_events(&tick(&mut system, &mut world)).is_empty());
}

#[test]
fn test_substep_event_per_solver_step() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = PhysicsConfig {
        step_frequency: 60.0,
        max_sub_steps: 4,
        ..Default::default()
    };
    let mut system = PhysicsSystem::new(ReferenceSolver::new(), config).unwrap();
    let mut world = World::new();
    world.spawn_with_transform((Transform::default(), RigidBody::dynamic(1.0), Collider::default()));

    // Far more wall time than the catch-up budget allows
    update_hierarchy_system(&mut world);
    system.process(&mut world, 1.0);
    let substeps = system
        .drain_events()
        .filter(|event| *event == PhysicsEvent::SubStep)
        .count();

    assert_eq!(substeps, 4);
    assert_eq!(system.solver().steps_taken(), 4);
}

#[test]
fn test_compound_colliders_report_their_own_entities() {
    let (mut world, mut system) = setup();

    let body = world.spawn_with_transform((Transform::default(), RigidBody::dynamic(1.0)));
    let hand = world.spawn_with_transform((
        Transform::from_position(Vec3::new(2.0, 0.0, 0.0)),
        Parent(body),
        Collider::sphere(0.5),
    ));
    let target = world.spawn_with_transform((
        Transform::from_position(Vec3::new(2.5, 0.0, 0.0)),
        Collider::box_collider(Vec3::splat(0.5)),
    ));

    let events = contact_events(&tick(&mut system, &mut world));

    assert_eq!(events.len(), 1);
    assert!(events[0].involves_pair(hand, target));
    assert!(!events[0].involves_pair(body, target));
}

#[test]
fn test_trigger_still_reports_contacts() {
    let (mut world, mut system) = setup();

    let mover = world.spawn_with_transform((
        Transform::default(),
        RigidBody::dynamic(1.0),
        Collider::sphere(0.5),
    ));
    let zone = world.spawn_with_transform((
        Transform::default(),
        Collider::box_collider(Vec3::splat(2.0)).as_trigger(),
    ));

    let events = contact_events(&tick(&mut system, &mut world));
    assert_eq!(events.len(), 1);
    assert!(events[0].involves_pair(mover, zone));
}

#[test]
fn test_stop_forgets_touching_pairs() {
    let (mut world, mut system) = setup();

    world.spawn_with_transform((Transform::default(), RigidBody::dynamic(1.0), Collider::sphere(0.5)));
    world.spawn_with_transform((
        Transform::from_position(Vec3::new(0.5, 0.0, 0.0)),
        Collider::sphere(0.5),
    ));

    tick(&mut system, &mut world);
    tick(&mut system, &mut world);

    system.stop(&mut world);
    system.play();

    // Everything is rebuilt, so the contact starts over
    let events = contact_events(&tick(&mut system, &mut world));
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], PhysicsEvent::BeginContact { .. }));
}
