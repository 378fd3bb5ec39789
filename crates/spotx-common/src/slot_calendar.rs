// Slot Calendar
//
// Fixed daily viewing slots and the +/- window arithmetic around them.
// Everything here is a pure function of the wall-clock time passed in.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Slot;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Minutes on either side of a slot time during which the slot is open
pub const WINDOW_MINUTES: u32 = 60;

/// The five daily slots, in id order
pub const SLOTS: [Slot; 5] = [
    Slot::new(1, 9, 0),
    Slot::new(2, 12, 0),
    Slot::new(3, 15, 0),
    Slot::new(4, 18, 0),
    Slot::new(5, 21, 0),
];

/// Minutes since midnight for a wall-clock time
pub fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Shortest distance between two minute-of-day values, wrapping at midnight
fn circular_distance(a: u32, b: u32) -> u32 {
    let d = a.abs_diff(b) % MINUTES_PER_DAY;
    d.min(MINUTES_PER_DAY - d)
}

/// True iff `now` is within `WINDOW_MINUTES` of the slot time (edges inclusive)
pub fn is_within_slot_window(slot: &Slot, now: NaiveTime) -> bool {
    circular_distance(slot.minutes_of_day(), minutes_of_day(now)) <= WINDOW_MINUTES
}

/// First slot, in id order, whose window contains `now`
pub fn current_active_slot(now: NaiveTime) -> Option<Slot> {
    SLOTS.iter().copied().find(|slot| is_within_slot_window(slot, now))
}

/// First slot strictly later than `now`; wraps to the first slot of the day
pub fn next_slot(now: NaiveTime) -> Slot {
    let current = minutes_of_day(now);
    SLOTS.iter().copied().find(|slot| slot.minutes_of_day() > current).unwrap_or(SLOTS[0])
}

pub fn slot_by_id(id: u8) -> Result<Slot> {
    SLOTS.iter().copied().find(|slot| slot.id == id).ok_or(Error::InvalidSlot(id))
}

/// Minutes from `now` until the slot time, in `[0, MINUTES_PER_DAY)`
pub fn minutes_until(slot: &Slot, now: NaiveTime) -> u32 {
    let current = minutes_of_day(now);
    (slot.minutes_of_day() + MINUTES_PER_DAY - current) % MINUTES_PER_DAY
}

/// Minute of day at which a slot window opens
pub fn window_opens_at(slot: &Slot) -> u32 {
    (slot.minutes_of_day() + MINUTES_PER_DAY - WINDOW_MINUTES) % MINUTES_PER_DAY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotWindow {
    pub slot: Slot,
    pub label: String,
    pub active: bool,
    pub minutes_until: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOverview {
    pub slots: Vec<SlotWindow>,
    pub current: Option<Slot>,
    pub next: Slot,
}

/// Snapshot of the whole calendar at `now`
pub fn overview(now: NaiveTime) -> SlotOverview {
    let slots = SLOTS
        .iter()
        .map(|slot| SlotWindow {
            slot: *slot,
            label: slot.label(),
            active: is_within_slot_window(slot, now),
            minutes_until: minutes_until(slot, now),
        })
        .collect();

    SlotOverview { slots, current: current_active_slot(now), next: next_slot(now) }
}
