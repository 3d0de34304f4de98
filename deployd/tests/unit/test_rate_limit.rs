//! Log read rate limiter tests

use std::time::Duration;

use deployd::cache::rate_limit::{Decision, RateLimiter};
use deployd::server::state::{LOG_RATE_CAPACITY, LOG_RATE_LIMIT, LOG_RATE_WINDOW};

#[test]
fn test_three_reads_per_window() {
    let limiter = RateLimiter::new(LOG_RATE_LIMIT, LOG_RATE_WINDOW, LOG_RATE_CAPACITY);

    for _ in 0..3 {
        assert!(limiter.check("user-1").is_allowed());
    }
    match limiter.check("user-1") {
        Decision::Limited(retry_after) => {
            assert!(retry_after > Duration::ZERO);
            assert!(retry_after <= LOG_RATE_WINDOW);
        }
        Decision::Allowed => panic!("fourth read within the window was allowed"),
    }

    // Other users are unaffected
    assert!(limiter.check("user-2").is_allowed());
    assert_eq!(limiter.len(), 2);
}

#[test]
fn test_window_slides() {
    let limiter = RateLimiter::new(1, Duration::from_millis(50), 10);
    assert!(limiter.check("user-1").is_allowed());
    assert!(!limiter.check("user-1").is_allowed());

    std::thread::sleep(Duration::from_millis(60));
    assert!(limiter.check("user-1").is_allowed());
}

#[test]
fn test_capacity_bounds_tracked_users() {
    let limiter = RateLimiter::new(1, Duration::from_secs(60), 2);
    assert!(limiter.check("a").is_allowed());
    std::thread::sleep(Duration::from_millis(2));
    assert!(limiter.check("b").is_allowed());
    std::thread::sleep(Duration::from_millis(2));
    assert!(limiter.check("c").is_allowed());
    assert_eq!(limiter.len(), 2);

    // "a" was evicted, so its history is gone
    assert!(limiter.check("a").is_allowed());
}

#[test]
fn test_purge_idle() {
    let limiter = RateLimiter::new(3, Duration::from_millis(20), 10);
    limiter.check("a");
    limiter.check("b");
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(limiter.purge_idle(), 2);
    assert!(limiter.is_empty());
}
