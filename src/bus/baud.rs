/// SCL divider for each ICR value of the frequency divider register.
///
/// Entries below `0x10` are listed for completeness but never selected: the
/// controller is unreliable at those ratios.
pub const SCL_DIVIDER: [u16; 64] = [
    20, 22, 24, 26, 28, 32, 36, 40, 28, 32, 26, 40, 44, 48, 56, 68, //
    48, 56, 64, 72, 80, 88, 104, 128, 80, 96, 112, 128, 144, 160, 192, 204, //
    160, 192, 224, 256, 288, 320, 384, 480, 320, 384, 448, 512, 576, 640, 768, 960, //
    640, 768, 896, 1024, 1152, 1280, 1536, 1920, 1280, 1536, 1792, 2048, 2304, 2560, 3072, 3840,
];

const FIRST_ICR: u8 = 0x10;
const LAST_ICR: u8 = 0x3F;

/// MULT register values, in search order.
const MULT_VALUES: [u8; 3] = [0, 1, 2];

/// A frequency divider setting and the SCL rate it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudSetting {
    /// MULT register value (multiplier is `1 << mult`).
    pub mult: u8,
    /// ICR register value, an index into [`SCL_DIVIDER`].
    pub icr: u8,
    /// Resulting SCL frequency in Hz.
    pub actual: u32,
}

impl BaudSetting {
    pub const fn multiplier(&self) -> u32 {
        1 << self.mult
    }

    pub const fn divider(&self) -> u32 {
        SCL_DIVIDER[self.icr as usize] as u32
    }

    /// Absolute distance between the produced rate and `target`.
    pub const fn error(&self, target: u32) -> u32 {
        self.actual.abs_diff(target)
    }
}

/// Picks the MULT/ICR pair whose SCL rate is closest to `target`.
///
/// Every multiplier is tried against every usable divider and the first pair
/// with the smallest absolute error wins. Returns `None` when no pair gets
/// closer than `target` itself, in which case the divider should be left
/// alone.
pub fn select_baud(target: u32, module_clock: u32) -> Option<BaudSetting> {
    let mut best: Option<BaudSetting> = None;
    let mut best_error = target;

    for mult in MULT_VALUES {
        for icr in FIRST_ICR..=LAST_ICR {
            let divisor = (1u32 << mult) * SCL_DIVIDER[icr as usize] as u32;
            let actual = module_clock / divisor;
            let error = actual.abs_diff(target);

            if error < best_error {
                best_error = error;
                best = Some(BaudSetting { mult, icr, actual });
            }
        }
    }

    best
}
