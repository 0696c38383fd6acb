use std::sync::{Arc, Mutex};

use mover::collision::{CollisionBackend, cuboid_from_pose, plane_from_pose};
use mover::{
    AuxState, FALLING, FixedStepLiaison, InputCmd, Mover, MoverBuilder, MoverEvent, Quat, StaticEntry,
    StaticShape, StaticWorld, TickStartData, TimeStep, Transform, Vec3, WALKING,
};

const STAND_Z: f32 = 90.05;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn flat_floor() -> Arc<dyn CollisionBackend> {
    Arc::new(StaticWorld::new(vec![StaticEntry::solid(
        1,
        StaticShape::Plane {
            normal: Vec3::z(),
            dist: 0.0,
        },
    )]))
}

/// A 1000x1000 platform with its top at z = 0 above a floor at z = -500.
fn ledge_world() -> Arc<dyn CollisionBackend> {
    Arc::new(StaticWorld::new(vec![
        StaticEntry::solid(
            1,
            cuboid_from_pose(Vec3::new(500.0, 500.0, 50.0), Vec3::new(0.0, 0.0, -50.0), Quat::identity()),
        ),
        StaticEntry::solid(2, plane_from_pose(Quat::identity(), Vec3::new(0.0, 0.0, -500.0), 0.0)),
    ]))
}

fn standing_mover(backend: Arc<dyn CollisionBackend>, x: f32) -> Mover {
    MoverBuilder::new(backend)
        .with_default_modes()
        .initial_transform(Transform::from_translation(Vec3::new(x, 0.0, STAND_Z)))
        .build()
}

fn scripted_input(frame: usize) -> InputCmd {
    let angle = frame as f32 * 0.1;
    InputCmd::directional(Vec3::new(angle.cos(), angle.sin(), 0.0))
}

#[test]
fn identical_runs_produce_identical_digests() {
    init_logging();
    let mut a = FixedStepLiaison::new(standing_mover(flat_floor(), 0.0), 16.0);
    let mut b = FixedStepLiaison::new(standing_mover(flat_floor(), 0.0), 16.0);
    for frame in 0..60 {
        let input = if frame == 20 { scripted_input(frame).with_jump() } else { scripted_input(frame) };
        let ea = a.advance_with_input(input.clone());
        let eb = b.advance_with_input(input);
        assert_eq!(ea.sync.digest(), eb.sync.digest(), "diverged at frame {frame}");
    }
}

#[test]
fn correction_and_resimulation_converge_on_the_authoritative_run() {
    init_logging();
    let mut authority = FixedStepLiaison::new(standing_mover(flat_floor(), 0.0), 16.0);
    let mut client = FixedStepLiaison::new(standing_mover(flat_floor(), 0.0), 16.0);

    for frame in 0..12 {
        authority.advance_with_input(scripted_input(frame));
        // The client mispredicts frame 2.
        let input = if frame == 2 { InputCmd::directional(-Vec3::x()) } else { scripted_input(frame) };
        client.advance_with_input(input);
    }
    assert_ne!(
        authority.mover().sync_state().digest(),
        client.mover().sync_state().digest()
    );

    let truth = authority
        .history()
        .find(|e| e.time_step.server_frame == 2)
        .map(|e| e.end.sync.clone())
        .expect("frame 2 recorded");
    client
        .apply_correction(2, &truth, &AuxState::default())
        .expect("frame 2 still in history");

    assert_eq!(
        authority.mover().sync_state().digest(),
        client.mover().sync_state().digest()
    );
}

#[test]
fn newest_time_step_never_moves_backwards() {
    init_logging();
    let mut m = standing_mover(flat_floor(), 0.0);
    let frames = [0_i64, 1, 2, 3, 1, 2, 4, 5];
    let mut newest = -1;
    for frame in frames {
        let start = TickStartData {
            input: InputCmd::directional(Vec3::x()),
            sync: m.sync_state().clone(),
            aux: m.aux_state().clone(),
        };
        let end = m.simulation_tick(&TimeStep::new(frame, frame as f64 * 16.0, 16.0), &start);
        m.finalize(&end.sync, &end.aux);
        assert!(m.newest_time_step().server_frame >= newest);
        newest = m.newest_time_step().server_frame;
    }
    assert_eq!(newest, 5);
}

#[test]
fn exactly_one_mode_is_current_after_every_tick() {
    init_logging();
    let mut l = FixedStepLiaison::new(standing_mover(ledge_world(), 0.0), 16.0);
    for frame in 0..90 {
        let input = if frame % 30 == 5 { scripted_input(frame).with_jump() } else { scripted_input(frame) };
        let end = l.advance_with_input(input);
        let mode = end.sync.mode_name().expect("a mode after the first tick");
        assert!(l.mover().state_machine().has_mode(mode));
        assert_eq!(l.mover().state_machine().current_mode_name(), Some(mode));
    }
}

#[test]
fn walking_off_a_ledge_falls_and_lands_below() {
    init_logging();
    let mut m = standing_mover(ledge_world(), 400.0);
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    m.subscribe(move |e| {
        if let MoverEvent::ModeChanged { new, .. } = e {
            sink.lock().unwrap().push(new.clone());
        }
    });

    let mut l = FixedStepLiaison::new(m, 16.0);
    for _ in 0..200 {
        l.advance_with_input(InputCmd::directional(Vec3::x()));
    }

    let seen = changes.lock().unwrap().clone();
    let names: Vec<&str> = seen.iter().filter_map(|n| n.as_deref()).collect();
    assert_eq!(names.first(), Some(&WALKING));
    assert!(names.contains(&FALLING));
    assert_eq!(names.last(), Some(&WALKING));

    let state = l.mover().sync_state();
    assert_eq!(state.mode_name(), Some(WALKING));
    assert!(state.location.x > 530.0);
    assert!((state.location.z - (STAND_Z - 500.0)).abs() < 2.0);
}
