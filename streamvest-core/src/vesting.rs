//! Linear vesting calculator.
//!
//! Pure integer arithmetic: before `start_time` nothing is vested, after
//! `end_time` everything is, and in between the unlocked amount grows
//! linearly with `floor` rounding. The intermediate product is computed in
//! `u128` so `total_amount * elapsed` cannot overflow.

/// Amount of `total_amount` (sats) unlocked at `now`.
///
/// Requires `end_time > start_time`; the stream state validator enforces
/// that at create time, so it is not re-checked here. With equal bounds the
/// `now >= end_time` arm still returns `total_amount` rather than dividing
/// by zero.
pub fn vested_amount(total_amount: u64, start_time: u64, end_time: u64, now: u64) -> u64 {
    if now <= start_time {
        return 0;
    }
    if now >= end_time {
        return total_amount;
    }
    let elapsed = (now - start_time) as u128;
    let duration = (end_time - start_time) as u128;
    ((total_amount as u128 * elapsed) / duration) as u64
}
