use primitive_types::U256;
use parking_lot::RwLock;

/// Last observed ledger height, shared between the height refresh and the sweep
#[derive(Default)]
pub struct HeightCursor {
    height: RwLock<U256>,
}

impl HeightCursor {
    #[cfg(test)]
    pub fn new(height: U256) -> Self {
        Self {
            height: RwLock::new(height),
        }
    }

    pub fn get(&self) -> U256 {
        *self.height.read()
    }

    pub fn set(&self, height: U256) {
        *self.height.write() = height;
    }

    /// Confirmations of a block at `number`; zero while the cursor lags behind it
    pub fn confirmations_since(&self, number: &U256) -> u64 {
        let height = self.height.read();
        if *height < *number {
            return 0;
        }
        let depth = *height - *number;
        if depth > U256::from(u64::MAX) {
            return u64::MAX;
        }
        depth.low_u64()
    }
}
