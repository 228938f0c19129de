//! End-to-end scheduling scenario driven purely by voluntary yields
//!
//! The quantum is an hour of virtual CPU time, so the preemption timer never
//! fires and the interleaving below is fully deterministic. Everything runs
//! in one `#[test]` because the scheduler is process-global.

use std::cell::RefCell;
use std::rc::Rc;

use uthread::{ThreadError, ThreadId};

#[test]
fn cooperative_round_robin() {
    // Nothing works before init
    assert!(matches!(
        uthread::get_tid(),
        Err(ThreadError::InvalidOperation(_))
    ));
    assert!(matches!(
        uthread::yield_now(),
        Err(ThreadError::InvalidOperation(_))
    ));
    assert!(matches!(
        uthread::init(0),
        Err(ThreadError::InvalidArgument(_))
    ));
    assert!(matches!(
        uthread::init(-5),
        Err(ThreadError::InvalidArgument(_))
    ));

    uthread::init(3_600_000_000).unwrap();
    assert!(matches!(
        uthread::init(1000),
        Err(ThreadError::InvalidOperation(_))
    ));

    // The caller became thread 0, already in its first quantum
    assert_eq!(uthread::get_tid().unwrap(), ThreadId::MAIN);
    assert_eq!(uthread::get_total_quantums().unwrap(), 1);
    assert_eq!(uthread::get_quantums(ThreadId::MAIN).unwrap(), 1);
    assert!(matches!(
        uthread::get_quantums(ThreadId::new(5)),
        Err(ThreadError::UnknownThread(_))
    ));

    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let log1 = log.clone();
    let t1 = uthread::spawn(move || {
        log1.borrow_mut().push("t1:a");
        uthread::yield_now().unwrap();
        log1.borrow_mut().push("t1:b");
    })
    .unwrap();
    let log2 = log.clone();
    let t2 = uthread::spawn(move || {
        log2.borrow_mut().push("t2:a");
        uthread::yield_now().unwrap();
        log2.borrow_mut().push("t2:b");
    })
    .unwrap();

    assert_eq!(t1, ThreadId::new(1));
    assert_eq!(t2, ThreadId::new(2));
    assert_eq!(uthread::get_quantums(t1).unwrap(), 0);

    // FIFO order: t1 runs to its yield, then t2, then control returns here
    uthread::yield_now().unwrap();
    assert_eq!(*log.borrow(), ["t1:a", "t2:a"]);
    assert_eq!(uthread::get_quantums(t1).unwrap(), 1);
    assert_eq!(uthread::get_quantums(t2).unwrap(), 1);
    assert_eq!(uthread::get_quantums(ThreadId::MAIN).unwrap(), 2);
    assert_eq!(uthread::get_total_quantums().unwrap(), 4);

    // Block t2 before its second leg; only t1 finishes this round
    uthread::block(t2).unwrap();
    uthread::block(t2).unwrap(); // blocking a blocked thread is a no-op
    uthread::yield_now().unwrap();
    assert_eq!(*log.borrow(), ["t1:a", "t2:a", "t1:b"]);
    assert!(matches!(
        uthread::get_quantums(t1),
        Err(ThreadError::UnknownThread(_))
    ));
    assert!(matches!(
        uthread::resume(t1),
        Err(ThreadError::UnknownThread(_))
    ));

    // Resume t2 and let it finish
    uthread::resume(t2).unwrap();
    uthread::resume(t2).unwrap(); // resuming a ready thread is a no-op
    uthread::yield_now().unwrap();
    assert_eq!(*log.borrow(), ["t1:a", "t2:a", "t1:b", "t2:b"]);
    assert!(matches!(
        uthread::get_quantums(t2),
        Err(ThreadError::UnknownThread(_))
    ));

    // Freed ids are reused smallest-first; a never-run thread can be
    // terminated cleanly
    let t3 = uthread::spawn(|| {}).unwrap();
    assert_eq!(t3, ThreadId::new(1));
    uthread::terminate(t3).unwrap();
    assert!(matches!(
        uthread::terminate(t3),
        Err(ThreadError::UnknownThread(_))
    ));

    // The main thread can never be blocked
    assert!(matches!(
        uthread::block(ThreadId::MAIN),
        Err(ThreadError::InvalidOperation(_))
    ));

    // A panicking thread is terminated without taking the scheduler down
    let t6 = uthread::spawn(|| panic!("boom")).unwrap();
    uthread::yield_now().unwrap();
    assert!(matches!(
        uthread::get_quantums(t6),
        Err(ThreadError::UnknownThread(_))
    ));

    mutex_scenario(&log);
}

fn mutex_scenario(log: &Rc<RefCell<Vec<&'static str>>>) {
    uthread::mutex_lock().unwrap();
    assert!(matches!(
        uthread::mutex_lock(),
        Err(ThreadError::InvalidOperation(_))
    ));

    let log4 = log.clone();
    let t4 = uthread::spawn(move || {
        // Parks until thread 0 unlocks
        uthread::mutex_lock().unwrap();
        log4.borrow_mut().push("t4:locked");
        uthread::mutex_unlock().unwrap();
    })
    .unwrap();
    let log5 = log.clone();
    uthread::spawn(move || {
        log5.borrow_mut().push("t5:ran");
        if uthread::mutex_unlock().is_err() {
            log5.borrow_mut().push("t5:unlock-denied");
        }
    })
    .unwrap();

    // t4 blocks on the mutex, t5 runs to completion around it
    uthread::yield_now().unwrap();
    assert!(!log.borrow().contains(&"t4:locked"));
    assert!(log.borrow().contains(&"t5:ran"));
    assert!(log.borrow().contains(&"t5:unlock-denied"));

    // Unlock hands ownership straight to t4; it is never observable as
    // available in between
    uthread::mutex_unlock().unwrap();
    assert!(matches!(
        uthread::mutex_unlock(),
        Err(ThreadError::InvalidOperation(_))
    ));

    uthread::yield_now().unwrap();
    assert!(log.borrow().contains(&"t4:locked"));
    assert!(matches!(
        uthread::get_quantums(t4),
        Err(ThreadError::UnknownThread(_))
    ));

    // Fully released after t4's unlock
    uthread::mutex_lock().unwrap();
    uthread::mutex_unlock().unwrap();
}
