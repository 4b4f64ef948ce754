use std::sync::Mutex;

use time::OffsetDateTime;

/// 2010-11-04T01:42:54.657Z, in milliseconds.
pub const EPOCH_MS: i64 = 1_288_834_974_657;

const NODE_BITS: u32 = 10;
const STEP_BITS: u32 = 12;
const MAX_NODE: i64 = (1 << NODE_BITS) - 1;
const STEP_MASK: i64 = (1 << STEP_BITS) - 1;
const TIME_SHIFT: u32 = NODE_BITS + STEP_BITS;
const NODE_SHIFT: u32 = STEP_BITS;

#[derive(Debug, thiserror::Error)]
#[error("snowflake node id must be between 0 and {MAX_NODE}, got {0}")]
pub struct InvalidNode(pub i64);

#[derive(Debug, Default)]
struct Clock {
    last_ms: i64,
    step: i64,
}

/// Time-ordered 64-bit id generator for one node.
#[derive(Debug)]
pub struct SnowflakeNode {
    node: i64,
    clock: Mutex<Clock>,
}

impl SnowflakeNode {
    pub fn new(node: i64) -> Result<Self, InvalidNode> {
        if !(0..=MAX_NODE).contains(&node) {
            return Err(InvalidNode(node));
        }
        Ok(Self {
            node,
            clock: Mutex::new(Clock::default()),
        })
    }

    pub fn generate(&self) -> i64 {
        let mut clock = self.clock.lock().unwrap_or_else(|p| p.into_inner());
        let mut now = now_ms();

        if now <= clock.last_ms {
            now = clock.last_ms;
            clock.step = (clock.step + 1) & STEP_MASK;
            if clock.step == 0 {
                while now <= clock.last_ms {
                    std::hint::spin_loop();
                    now = now_ms();
                }
            }
        } else {
            clock.step = 0;
        }
        clock.last_ms = now;

        ((now - EPOCH_MS) << TIME_SHIFT) | (self.node << NODE_SHIFT) | clock.step
    }
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Node id a generated id was minted on.
pub fn node_of(id: i64) -> i64 {
    (id >> NODE_SHIFT) & MAX_NODE
}
