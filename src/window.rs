/// Anti-replay window for records of one epoch (RFC 6347 4.1.2.6).
///
/// Tracks the highest authenticated sequence number and a bitmap of the 64
/// numbers below it. `check` runs before decryption and `update` only after
/// the record authenticated, so forged records cannot move the window.
#[derive(Debug, Default)]
pub struct ReplayWindow {
    top: Option<u64>,
    seen: u64,
}

const WINDOW_SIZE: u64 = 64;

impl ReplayWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `seq` is new and inside the window.
    pub fn check(&self, seq: u64) -> bool {
        let Some(top) = self.top else {
            return true;
        };
        if seq > top {
            return true;
        }
        let behind = top - seq;
        behind < WINDOW_SIZE && self.seen & (1 << behind) == 0
    }

    /// Mark `seq` as received.
    pub fn update(&mut self, seq: u64) {
        let Some(top) = self.top else {
            self.top = Some(seq);
            self.seen = 1;
            return;
        };

        if seq > top {
            let shift = seq - top;
            self.seen = if shift >= WINDOW_SIZE {
                0
            } else {
                self.seen << shift
            };
            self.seen |= 1;
            self.top = Some(seq);
        } else {
            let behind = top - seq;
            if behind < WINDOW_SIZE {
                self.seen |= 1 << behind;
            }
        }
    }
}
