/// Bitmask selecting extra debug output.
///
/// 1 - dev, config discovery
/// 2 - perf, phase timings and counters
/// 4 - sched, every step with its classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugMask(u32);

impl DebugMask {
    /// Mask from raw bits
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Read mask from `KILN_DEBUG`, zero if unset or not a number
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("KILN_DEBUG").ok().and_then(|x| x.parse::<u32>().ok()).map_or(Self(0), Self)
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Is dev printing enabled?
    #[must_use]
    pub const fn dev(self) -> bool {
        self.0 % 2 == 1
    }

    /// Is perf printing enabled?
    #[must_use]
    pub const fn perf(self) -> bool {
        (self.0 >> 1) % 2 == 1
    }

    /// Is scheduler printing enabled?
    #[must_use]
    pub const fn sched(self) -> bool {
        (self.0 >> 2) % 2 == 1
    }
}

#[test]
fn mask_bits() {
    let mask = DebugMask::new(5);
    assert!(mask.dev());
    assert!(!mask.perf());
    assert!(mask.sched());
    assert_eq!(DebugMask::default().bits(), 0);
}
