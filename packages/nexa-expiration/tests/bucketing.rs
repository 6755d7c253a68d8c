use nexa_expiration::*;

#[test]
fn test_ceiling_always_advances() {
    assert_eq!(ceiling(999, 25), 1000);
    assert_eq!(ceiling(1000, 25), 1025);
    assert_eq!(ceiling(1024, 25), 1025);
    assert_eq!(ceiling(1026, 25), 1050);
}

#[test]
fn test_round_trip_truncates_to_unit() {
    for ms in [0.0, 9.0, 10.0, 15.5, 999.0, 1234.0, 86_400_000.0] {
        let expected = (ms / 10.0_f64).floor() * 10.0;
        assert_eq!(expiration_time_to_ms(ms_to_expiration_time(ms)), expected);
    }
}

#[test]
fn test_clock_is_inverted() {
    let earlier = ms_to_expiration_time(100.0);
    let later = ms_to_expiration_time(200.0);
    assert!(earlier > later);
    assert_eq!(ms_to_expiration_time(0.0), MAGIC_NUMBER_OFFSET);
    assert!(ms_to_expiration_time(0.0) < SYNC);
}

#[test]
fn test_sync_converts_to_negative_ms() {
    assert_eq!(expiration_time_to_ms(SYNC), -10.0);
}

#[test]
fn test_async_expiration_bucket() {
    let now = ms_to_expiration_time(1234.0);
    // 123 units elapsed + 500 unit window, rounded up to 25 unit buckets.
    assert_eq!(compute_async_expiration(now), MAGIC_NUMBER_OFFSET - 625);
    assert_eq!(expiration_time_to_ms(compute_async_expiration(now)), 6250.0);
}

#[test]
fn test_interactive_expiration_bucket() {
    let now = ms_to_expiration_time(1234.0);
    let expected = if cfg!(debug_assertions) {
        MAGIC_NUMBER_OFFSET - 180
    } else {
        MAGIC_NUMBER_OFFSET - 140
    };
    assert_eq!(compute_interactive_expiration(now), expected);
}

#[test]
fn test_requests_in_same_window_share_a_bucket() {
    let a = compute_async_expiration(ms_to_expiration_time(1000.0));
    let b = compute_async_expiration(ms_to_expiration_time(1240.0));
    assert_eq!(a, b);

    // Landing exactly on the boundary moves to the next bucket.
    let c = compute_async_expiration(ms_to_expiration_time(1250.0));
    assert!(c < a);
}

#[test]
fn test_interactive_outranks_async() {
    let now = ms_to_expiration_time(5000.0);
    assert!(compute_interactive_expiration(now) > compute_async_expiration(now));
}

#[test]
fn test_policy_matches_free_functions() {
    let now = ms_to_expiration_time(777.0);
    assert_eq!(
        ExpirationPolicy::LOW_PRIORITY.compute(now),
        compute_expiration_bucket(now, 5000, 250)
    );
    assert_eq!(ExpirationPolicy::HIGH_PRIORITY.bucket_size_ms, 100);
    assert!(
        ExpirationPolicy::HIGH_PRIORITY.expiration_ms == 500
            || ExpirationPolicy::HIGH_PRIORITY.expiration_ms == 150
    );
}

#[test]
fn test_ceiling_with_zero_precision_counts_as_one() {
    assert_eq!(ceiling(7, 0), 8);
    assert_eq!(ceiling(u32::MAX, 3), u32::MAX);
}

#[test]
fn test_sub_unit_buckets_round_up_to_next_unit() {
    let now = ms_to_expiration_time(1000.0);

    // 5ms buckets are half a unit: 600 units lands on 600.5, then 601.
    assert_eq!(
        compute_expiration_bucket(now, 5000, 5),
        MAGIC_NUMBER_OFFSET - 601
    );

    let zero_bucket = compute_expiration_bucket(now, 5000, 0);
    assert!(zero_bucket <= MAGIC_NUMBER_OFFSET - 600);
    assert!(zero_bucket >= MAGIC_NUMBER_OFFSET - 601);
}

#[test]
fn test_non_multiple_bucket_keeps_fractional_precision() {
    let now = ms_to_expiration_time(1000.0);

    // 125ms is 12.5 units: 600 units falls in the bucket ending at 612.5.
    assert_eq!(
        compute_expiration_bucket(now, 5000, 125),
        MAGIC_NUMBER_OFFSET - 613
    );

    // A 155ms window is 15.5 units on top of the 100 already elapsed.
    assert_eq!(
        compute_expiration_bucket(now, 155, 5),
        MAGIC_NUMBER_OFFSET - 116
    );
}
