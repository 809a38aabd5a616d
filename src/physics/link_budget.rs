use serde::Serialize;

use crate::pattern::GainComponents;
use crate::units::{Db, Dbm, DbuvPerMeter, MegaHertz, Meters, Watts};

/// Transmit power below this is raised to it before taking the log.
pub const MIN_TX_POWER_W: f64 = 1e-6;
/// Lowest frequency handed to the propagation model and used for the field conversion.
pub const MIN_FREQUENCY_MHZ: f64 = 100.0;

pub fn calculate_wavelength(frequency: MegaHertz) -> Meters {
    frequency.wavelength()
}

/// `10 log10(P_W * 1000)`, with `P_W` floored at [`MIN_TX_POWER_W`].
pub fn tx_power_dbm(power: Watts) -> Dbm {
    let watts = if power.value() > MIN_TX_POWER_W { power.value() } else { MIN_TX_POWER_W };
    Watts(watts).to_dbm()
}

pub fn clamp_frequency(frequency: MegaHertz) -> MegaHertz {
    if frequency.value() >= MIN_FREQUENCY_MHZ {
        frequency
    } else {
        MegaHertz(MIN_FREQUENCY_MHZ)
    }
}

/// Per-link constants of the Friis budget in dB form.
///
/// ```text
/// Geff = Gpeak + ΔH + ΔV
/// ERP  = Ptx + Geff - Lsys
/// Prx  = ERP + Grx - L
/// E    = Prx - Grx + 77.2 + 20 log10(f_MHz)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkBudget {
    pub tx_power: Dbm,
    pub peak_gain: Db,
    pub rx_gain: Db,
    pub system_loss: Db,
    pub frequency: MegaHertz,
}

impl LinkBudget {
    pub fn new(
        power: Watts,
        peak_gain: Db,
        rx_gain: Db,
        system_loss: Db,
        frequency: MegaHertz,
    ) -> Self {
        Self {
            tx_power: tx_power_dbm(power),
            peak_gain,
            rx_gain,
            system_loss,
            frequency: clamp_frequency(frequency),
        }
    }

    pub fn effective_gain(&self, pattern: GainComponents) -> Db {
        self.peak_gain + pattern.total()
    }

    /// Radiated power in the direction the effective gain was taken for.
    pub fn erp(&self, effective_gain: Db) -> Dbm {
        self.tx_power + effective_gain - self.system_loss
    }

    pub fn received_power(&self, effective_gain: Db, path_loss: Db) -> Dbm {
        self.erp(effective_gain) + self.rx_gain - path_loss
    }

    pub fn field_strength(&self, received: Dbm) -> DbuvPerMeter {
        received.to_field_strength(self.rx_gain, self.frequency)
    }

    pub fn wavelength(&self) -> Meters {
        calculate_wavelength(self.frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn budget() -> LinkBudget {
        LinkBudget::new(Watts(1000.0), Db(8.0), Db(2.0), Db(1.5), MegaHertz(98.1))
    }

    #[test]
    fn test_tx_power_floor() {
        assert_abs_diff_eq!(tx_power_dbm(Watts(1.0)).value(), 30.0, epsilon = 1e-12);
        assert_abs_diff_eq!(tx_power_dbm(Watts(0.0)).value(), -30.0, epsilon = 1e-9);
        assert_abs_diff_eq!(tx_power_dbm(Watts(-5.0)).value(), -30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_frequency_floor() {
        let b = budget();
        assert_eq!(b.frequency, MegaHertz(100.0));
        assert_abs_diff_eq!(b.wavelength().value(), 2.99792458, epsilon = 1e-9);
    }

    #[test]
    fn test_budget_chain() {
        let b = budget();
        let geff = b.effective_gain(GainComponents { horizontal: Db(-3.0), vertical: Db(-1.0) });
        assert_abs_diff_eq!(geff.value(), 4.0);
        assert_abs_diff_eq!(b.erp(geff).value(), 60.0 + 4.0 - 1.5, epsilon = 1e-9);

        let prx = b.received_power(geff, Db(120.0));
        assert_abs_diff_eq!(prx.value(), 62.5 + 2.0 - 120.0, epsilon = 1e-9);

        // the receive gain cancels out of the field strength
        let e = b.field_strength(prx);
        assert_abs_diff_eq!(e.value(), 62.5 - 120.0 + 77.2 + 40.0, epsilon = 1e-9);
    }
}
