//! Fatal "no runnable thread" teardown
//!
//! When the last runnable thread finishes while every other thread is
//! blocked, dispatch has nowhere to go and the library must tear down with
//! exit code 1 — crucially without unmapping the stack the teardown itself
//! is running on (the finishing thread's Tcb is still parked in the
//! graveyard at that point). The scenario ends the process, so it runs in a
//! child process re-executing this test binary.

use std::process::Command;

const CHILD_ENV: &str = "UTHREAD_DEADLOCK_CHILD";

fn deadlock_scenario() -> ! {
    uthread::init(3_600_000_000).unwrap();

    // A takes the mutex and suspends itself; nobody will ever unlock
    uthread::spawn(|| {
        uthread::mutex_lock().unwrap();
        let me = uthread::get_tid().unwrap();
        uthread::block(me).unwrap();
    })
    .unwrap();
    // B outlives main's lock attempt by one quantum, then finishes as the
    // last runnable thread
    uthread::spawn(|| {
        uthread::yield_now().unwrap();
    })
    .unwrap();

    uthread::yield_now().unwrap();
    uthread::mutex_lock().unwrap();
    unreachable!("lock returned but the owner can never unlock");
}

#[test]
fn no_runnable_thread_tears_down_with_exit_code_1() {
    if std::env::var_os(CHILD_ENV).is_some() {
        deadlock_scenario();
    }

    let exe = std::env::current_exe().unwrap();
    let output = Command::new(exe)
        .args([
            "no_runnable_thread_tears_down_with_exit_code_1",
            "--exact",
            "--nocapture",
        ])
        .env(CHILD_ENV, "1")
        .output()
        .unwrap();

    // Exit code 1, not a signal: teardown must not fault mid-release
    assert_eq!(
        output.status.code(),
        Some(1),
        "child did not exit cleanly: {:?}",
        output.status
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no runnable thread"),
        "child stderr: {}",
        stderr
    );
}
