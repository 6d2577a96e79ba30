mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use serial_test::serial;

use ledmatrix::prelude::*;
use support::*;

const TICK: Duration = Duration::from_millis(16);

struct Rig {
    journal: Journal,
    registry: Arc<AppRegistry>,
    device: Arc<SimulatedDevice>,
    scheduler: FrameScheduler,
}

fn rig(
    width: usize,
    height: usize,
    options: SchedulerOptions,
    apps: Vec<(&'static AppDescriptor, Script)>,
) -> Rig {
    let journal = Journal::default();
    let registry = Arc::new(registry(width, height));
    for (descriptor, script) in apps {
        register(&registry, descriptor, script, &journal);
    }
    let device = Arc::new(SimulatedDevice::new(width, height));
    let scheduler =
        FrameScheduler::new(device.clone(), registry.clone(), options);
    Rig {
        journal,
        registry,
        device,
        scheduler,
    }
}

fn options(speed: usize, transitions: bool) -> SchedulerOptions {
    SchedulerOptions {
        default_fps: 60,
        transition_speed: speed,
        transitions_enabled: transitions,
    }
}

fn alpha_and_beta() -> Vec<(&'static AppDescriptor, Script)> {
    vec![
        (&ALPHA, Script::default()),
        (
            &BETA,
            Script {
                color: BETA_COLOR,
                ..Script::default()
            },
        ),
    ]
}

fn solid(frame: &PixelBuffer, color: Pixel) -> bool {
    frame.pixels().iter().all(|p| *p == color)
}

#[tokio::test]
async fn slide_transition_runs_for_ceil_width_over_speed_ticks() {
    let (width, speed) = (10usize, 3usize);
    let rig = rig(width, 2, options(speed, true), alpha_and_beta());

    rig.registry.activate("alpha").await.expect("alpha activates");
    assert_eq!(
        rig.scheduler.tick(TICK),
        TickOutcome::Presented { transitioning: false }
    );
    assert!(solid(&rig.device.canvas(), ALPHA_COLOR));

    rig.registry.activate("beta").await.expect("beta activates");
    assert!(rig.scheduler.is_transitioning());

    let steps = width.div_ceil(speed);
    for k in 0..steps {
        assert_eq!(
            rig.scheduler.tick(TICK),
            TickOutcome::Presented { transitioning: true }
        );
        let frame = rig.device.canvas();
        let old_columns = width.saturating_sub(k * speed);
        for x in 0..width {
            let expected =
                if x < old_columns { ALPHA_COLOR } else { BETA_COLOR };
            assert_eq!(frame.get_pixel(x as i32, 1), expected, "k={k} x={x}");
        }
    }

    assert!(!rig.scheduler.is_transitioning());
    assert_eq!(
        rig.scheduler.tick(TICK),
        TickOutcome::Presented { transitioning: false }
    );
    assert!(solid(&rig.device.canvas(), BETA_COLOR));
}

#[tokio::test]
async fn snapshot_is_frozen_while_the_switch_is_in_flight() {
    let rig = rig(
        6,
        2,
        options(2, true),
        vec![
            (&ALPHA, Script::default()),
            (
                &BETA,
                Script {
                    color: BETA_COLOR,
                    activate_delay: Some(Duration::from_millis(100)),
                    ..Script::default()
                },
            ),
        ],
    );

    rig.registry.activate("alpha").await.expect("alpha activates");
    rig.scheduler.tick(TICK);

    let registry = rig.registry.clone();
    let switch = tokio::spawn(async move { registry.activate("beta").await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let renders_before = rig.journal.count("alpha:render");
    assert_eq!(
        rig.scheduler.tick(TICK),
        TickOutcome::Presented { transitioning: true }
    );
    assert!(solid(&rig.device.canvas(), ALPHA_COLOR));
    assert_eq!(rig.journal.count("alpha:render"), renders_before);

    switch.await.expect("join").expect("beta activates");
    rig.scheduler.tick(TICK);
    let frame = rig.device.canvas();
    assert_eq!(frame.get_pixel(0, 0), ALPHA_COLOR);
    assert_eq!(frame.get_pixel(5, 0), ALPHA_COLOR);
    rig.scheduler.tick(TICK);
    assert_eq!(rig.device.canvas().get_pixel(5, 0), BETA_COLOR);
}

#[tokio::test]
async fn disabled_transitions_switch_immediately() {
    let rig = rig(6, 2, options(1, false), alpha_and_beta());

    rig.registry.activate("alpha").await.expect("alpha activates");
    rig.scheduler.tick(TICK);
    rig.registry.activate("beta").await.expect("beta activates");

    assert!(!rig.scheduler.is_transitioning());
    rig.scheduler.tick(TICK);
    assert!(solid(&rig.device.canvas(), BETA_COLOR));
}

#[tokio::test]
async fn first_activation_does_not_slide_from_an_empty_screen() {
    let rig = rig(6, 2, options(1, true), alpha_and_beta());

    rig.registry.activate("alpha").await.expect("alpha activates");

    assert!(!rig.scheduler.is_transitioning());
    rig.scheduler.tick(TICK);
    assert!(solid(&rig.device.canvas(), ALPHA_COLOR));
}

#[tokio::test]
#[serial]
async fn failing_update_still_renders_and_later_switch_succeeds() {
    let failures = FailureLog::install();
    let rig = rig(
        4,
        2,
        options(1, false),
        vec![
            (
                &ALPHA,
                Script {
                    fail_update: true,
                    ..Script::default()
                },
            ),
            (&BETA, Script::default()),
        ],
    );

    rig.registry.activate("alpha").await.expect("alpha activates");
    for _ in 0..3 {
        assert_eq!(
            rig.scheduler.tick(TICK),
            TickOutcome::Presented { transitioning: false }
        );
    }

    assert_eq!(rig.journal.count("alpha:render"), 3);
    assert_eq!(failures.mentioning("update failed").len(), 3);

    rig.registry.activate("beta").await.expect("beta activates");
    assert_eq!(rig.registry.active_id().as_deref(), Some("beta"));
}

#[tokio::test]
#[serial]
async fn failed_render_is_never_presented() {
    let failures = FailureLog::install();
    let rig = rig(
        4,
        2,
        options(1, false),
        vec![(
            &ALPHA,
            Script {
                fail_render: true,
                ..Script::default()
            },
        )],
    );

    rig.registry.activate("alpha").await.expect("alpha activates");

    assert_eq!(rig.scheduler.tick(TICK), TickOutcome::Skipped);
    assert_eq!(rig.device.frames_presented(), 0);
    assert_eq!(rig.device.canvas().get_pixel(0, 0), Pixel::BLACK);
    assert_eq!(failures.mentioning("render failed").len(), 1);
}

#[tokio::test]
#[serial]
async fn panicking_render_is_contained() {
    let failures = FailureLog::install();
    let rig = rig(
        4,
        2,
        options(1, false),
        vec![(
            &ALPHA,
            Script {
                panic_render: true,
                ..Script::default()
            },
        )],
    );

    rig.registry.activate("alpha").await.expect("alpha activates");

    assert_eq!(rig.scheduler.tick(TICK), TickOutcome::Skipped);
    assert_eq!(rig.scheduler.tick(TICK), TickOutcome::Skipped);
    assert_eq!(failures.mentioning("render exploded").len(), 2);
}

#[tokio::test]
async fn power_off_skips_the_whole_tick() {
    let rig = rig(4, 2, options(1, false), alpha_and_beta());
    rig.registry.activate("alpha").await.expect("alpha activates");
    rig.scheduler.tick(TICK);
    let renders = rig.journal.count("alpha:render");

    rig.device.set_enabled(false);
    assert_eq!(rig.scheduler.tick(TICK), TickOutcome::Disabled);
    assert_eq!(rig.journal.count("alpha:render"), renders);
    assert_eq!(rig.device.frames_presented(), 1);
    assert!(solid(&rig.device.canvas(), ALPHA_COLOR));

    rig.device.set_enabled(true);
    assert_eq!(
        rig.scheduler.tick(TICK),
        TickOutcome::Presented { transitioning: false }
    );
    assert_eq!(rig.device.frames_presented(), 2);
}

#[tokio::test]
async fn frame_rate_is_reread_every_tick() {
    let rate = Arc::new(AtomicU32::new(10));
    let rig = rig(
        4,
        2,
        options(1, false),
        vec![
            (
                &ALPHA,
                Script {
                    frame_rate: Some(rate.clone()),
                    ..Script::default()
                },
            ),
            (&GAMMA, Script::default()),
        ],
    );

    assert_eq!(rig.scheduler.target_fps(), 60);

    rig.registry.activate("alpha").await.expect("alpha activates");
    assert_eq!(rig.scheduler.target_fps(), 10);

    rate.store(25, Ordering::Relaxed);
    rig.scheduler.tick(TICK);
    assert_eq!(rig.scheduler.target_fps(), 25);

    rig.registry.activate("gamma").await.expect("gamma activates");
    assert_eq!(rig.scheduler.target_fps(), 60);
}

#[tokio::test]
async fn start_is_idempotent_and_stop_returns_immediately() {
    let rig = rig(4, 2, options(1, false), alpha_and_beta());

    assert!(rig.scheduler.start());
    assert!(!rig.scheduler.start());
    assert!(rig.scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rig.device.frames_presented() > 0);

    let started = Instant::now();
    rig.scheduler.stop();
    assert!(started.elapsed() < Duration::from_millis(10));
    assert!(!rig.scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let presented = rig.device.frames_presented();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rig.device.frames_presented(), presented);

    assert!(rig.scheduler.start(), "a stopped scheduler can be restarted");
    rig.scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loop_pacing_follows_the_active_app() {
    let journal = Journal::default();
    let registry = Arc::new(registry(8, 2));
    register(&registry, &ALPHA, Script::default(), &journal);
    register(&registry, &BETA, Script::default(), &journal);

    let device = Arc::new(TimedDevice::new(8, 2));
    let scheduler =
        FrameScheduler::new(device.clone(), registry.clone(), options(8, true));

    registry.activate("alpha").await.expect("alpha activates");
    let slow_from = Instant::now();
    scheduler.start();
    tokio::time::sleep(Duration::from_millis(600)).await;

    registry.activate("beta").await.expect("beta activates");
    // Let the last 10 fps sleep run out before sampling.
    tokio::time::sleep(Duration::from_millis(120)).await;
    let fast_from = Instant::now();
    tokio::time::sleep(Duration::from_millis(400)).await;
    scheduler.stop();

    let stamps = device.stamps();
    let slow: Vec<_> =
        stamps.iter().copied().filter(|s| *s < fast_from).collect();
    let slow = mean_interval(&slow, slow_from).expect("slow samples");
    let fast = mean_interval(&stamps, fast_from).expect("fast samples");

    assert!(
        slow > Duration::from_millis(70) && slow < Duration::from_millis(140),
        "10 fps interval was {slow:?}"
    );
    assert!(
        fast > Duration::from_millis(20) && fast < Duration::from_millis(55),
        "30 fps interval was {fast:?}"
    );
    let status = scheduler.status();
    assert!(!status.running);
    assert!(status.frames_presented > 0);
}
