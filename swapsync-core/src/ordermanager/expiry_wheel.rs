//! Hashed timer wheel for order expiry.
//!
//! 3600 one-second slots cover an hour per rotation; orders further out
//! carry a cycle count and are decremented on each visit instead of fired.
//! Insertion is O(1), a tick costs O(nodes in the current slot).
//!
//! There is deliberately no removal path for cancelled or matched orders:
//! nodes stay until their slot fires, and the expiry worker re-checks the
//! order status in the database before acting, making stale fires no-ops.

/// Number of slots; one full rotation takes `WHEEL_SIZE` seconds.
pub const WHEEL_SIZE: u64 = 3600;

/// A pending expiry, handed to the wheel task by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryNode {
    pub order_id: String,
    pub collection_address: String,
    pub token_id: String,
    pub maker: String,
    /// Unix seconds. Callers must not insert never-expiring orders (zero).
    pub expire_time: i64,
}

#[derive(Debug)]
struct SlotEntry {
    node: ExpiryNode,
    cycle_count: u64,
}

/// The wheel itself. `advance` is called once per second by the owning task.
#[derive(Debug)]
pub struct ExpiryWheel {
    slots: Vec<Vec<SlotEntry>>,
    current_index: u64,
}

impl ExpiryWheel {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(WHEEL_SIZE as usize);
        slots.resize_with(WHEEL_SIZE as usize, Vec::new);
        Self {
            slots,
            current_index: 0,
        }
    }

    /// Number of nodes currently parked in the wheel.
    pub fn len(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Vec::is_empty)
    }

    /// Park a node `max(0, expire_time - now)` seconds ahead of the cursor.
    ///
    /// Already-due nodes land in the current slot with a zero cycle count
    /// and fire on the next tick.
    pub fn insert(&mut self, node: ExpiryNode, now: i64) {
        let delta = node.expire_time.saturating_sub(now).max(0) as u64;
        let cycle_count = delta / WHEEL_SIZE;
        let slot_index = (self.current_index + delta % WHEEL_SIZE) % WHEEL_SIZE;
        self.slots[slot_index as usize].push(SlotEntry { node, cycle_count });
    }

    /// Process the current slot and step the cursor.
    ///
    /// Nodes whose cycle count reached zero are unlinked and returned;
    /// the rest are decremented and revisited one rotation later.
    pub fn advance(&mut self) -> Vec<ExpiryNode> {
        let slot = &mut self.slots[self.current_index as usize];
        let mut fired = Vec::new();
        let mut index = 0;
        while index < slot.len() {
            if slot[index].cycle_count == 0 {
                fired.push(slot.swap_remove(index).node);
            } else {
                slot[index].cycle_count -= 1;
                index += 1;
            }
        }
        self.current_index = (self.current_index + 1) % WHEEL_SIZE;
        fired
    }
}

impl Default for ExpiryWheel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(order_id: &str, expire_time: i64) -> ExpiryNode {
        ExpiryNode {
            order_id: order_id.to_string(),
            collection_address: "0xc0ffee".to_string(),
            token_id: "1".to_string(),
            maker: "0xmaker".to_string(),
            expire_time,
        }
    }

    /// Tick the wheel `n` times and collect every fired node with the tick
    /// number it fired at.
    fn run_ticks(wheel: &mut ExpiryWheel, n: u64) -> Vec<(u64, String)> {
        let mut fired = Vec::new();
        for tick in 0..n {
            for done in wheel.advance() {
                fired.push((tick, done.order_id));
            }
        }
        fired
    }

    #[test]
    fn fires_after_rounded_down_delta() {
        let now = 1_700_000_000;
        let mut wheel = ExpiryWheel::new();
        wheel.insert(node("a", now + 500), now);

        let fired = run_ticks(&mut wheel, 501);
        assert_eq!(fired, vec![(500, "a".to_string())]);
        assert!(wheel.is_empty());
    }

    #[test]
    fn already_expired_node_fires_on_next_tick() {
        let now = 1_700_000_000;
        let mut wheel = ExpiryWheel::new();
        wheel.insert(node("late", now - 40), now);

        let fired = run_ticks(&mut wheel, 1);
        assert_eq!(fired, vec![(0, "late".to_string())]);
    }

    #[test]
    fn long_delays_survive_full_rotations() {
        let now = 0;
        let mut wheel = ExpiryWheel::new();
        // One rotation plus five seconds: shares a slot with a short timer.
        wheel.insert(node("short", now + 5), now);
        wheel.insert(node("long", now + 5 + WHEEL_SIZE as i64), now);

        let fired = run_ticks(&mut wheel, WHEEL_SIZE + 6);
        assert_eq!(
            fired,
            vec![
                (5, "short".to_string()),
                (WHEEL_SIZE + 5, "long".to_string()),
            ]
        );
    }

    #[test]
    fn nodes_in_one_slot_fire_together() {
        let now = 0;
        let mut wheel = ExpiryWheel::new();
        wheel.insert(node("a", now + 10), now);
        wheel.insert(node("b", now + 10), now);
        wheel.insert(node("c", now + 11), now);

        let mut fired = run_ticks(&mut wheel, 12);
        fired.sort();
        assert_eq!(
            fired,
            vec![
                (10, "a".to_string()),
                (10, "b".to_string()),
                (11, "c".to_string()),
            ]
        );
    }

    #[test]
    fn insert_respects_a_moved_cursor() {
        let now = 0;
        let mut wheel = ExpiryWheel::new();
        // Move the cursor off slot zero first.
        run_ticks(&mut wheel, 100);

        wheel.insert(node("x", now + 130), now + 100);
        let fired = run_ticks(&mut wheel, 31);
        assert_eq!(fired, vec![(30, "x".to_string())]);
    }

    #[test]
    fn len_tracks_pending_nodes() {
        let mut wheel = ExpiryWheel::new();
        assert!(wheel.is_empty());
        wheel.insert(node("a", 50), 0);
        wheel.insert(node("b", 9000), 0);
        assert_eq!(wheel.len(), 2);
        run_ticks(&mut wheel, 51);
        assert_eq!(wheel.len(), 1);
    }
}
