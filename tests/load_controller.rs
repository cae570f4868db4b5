use loadlab::ops::busy_task::BusyTaskSettings;
use loadlab::ops::load_control::{LoadController, Transition};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

fn controller() -> LoadController {
    LoadController::new("web-a", BusyTaskSettings::new(Duration::from_millis(2), 10))
}

fn wait_for_slices(controller: &LoadController, at_least: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while controller.completed_slices() < at_least {
        assert!(Instant::now() < deadline, "busy task never ran");
        sleep(Duration::from_millis(2));
    }
}

#[test]
fn start_schedules_busy_task_back_to_back() {
    let controller = controller();
    assert_eq!(controller.start(), Transition::Started);
    wait_for_slices(&controller, 3);
    assert!(controller.is_active());
    controller.stop();
}

#[test]
fn stop_cancels_future_slices_only() {
    let controller = controller();
    controller.start();
    wait_for_slices(&controller, 1);
    assert_eq!(controller.stop(), Transition::Stopped);

    // 最多还有一个正在执行的片段会跑完。
    sleep(Duration::from_millis(30));
    let settled = controller.completed_slices();
    sleep(Duration::from_millis(30));
    assert_eq!(controller.completed_slices(), settled);
    assert!(!controller.is_active());
}

#[test]
fn flag_follows_last_effective_request() {
    let controller = controller();
    let script = [
        (true, Transition::Started),
        (true, Transition::AlreadyActive),
        (false, Transition::Stopped),
        (false, Transition::AlreadyIdle),
        (true, Transition::Started),
        (false, Transition::Stopped),
        (true, Transition::Started),
    ];
    for (start, expected) in script {
        let transition = if start {
            controller.start()
        } else {
            controller.stop()
        };
        assert_eq!(transition, expected);
        assert_eq!(controller.is_active(), start);
    }
    controller.stop();
}

#[test]
fn concurrent_starts_schedule_a_single_loop() {
    let controller = Arc::new(controller());
    let handles = (0..8)
        .map(|_| {
            let controller = controller.clone();
            std::thread::spawn(move || controller.start())
        })
        .collect::<Vec<_>>();
    let transitions = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    let started = transitions
        .iter()
        .filter(|transition| **transition == Transition::Started)
        .count();
    assert_eq!(started, 1);
    assert_eq!(transitions.len() - started, 7);
    assert_eq!(controller.stop(), Transition::Stopped);
    assert_eq!(controller.stop(), Transition::AlreadyIdle);
}

#[test]
fn idle_stop_has_no_side_effect() {
    let controller = controller();
    assert_eq!(controller.stop(), Transition::AlreadyIdle);
    sleep(Duration::from_millis(10));
    assert_eq!(controller.completed_slices(), 0);
    assert!(!controller.is_active());
}
