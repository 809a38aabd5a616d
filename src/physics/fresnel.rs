use crate::units::Meters;

/// Radius of the first Fresnel zone at a point `d1` from one end and `d2`
/// from the other. Zero at (and beyond) either end.
pub fn fresnel_radius(d1: Meters, d2: Meters, wavelength: Meters) -> Meters {
    let (d1, d2) = (d1.value(), d2.value());
    if d1 <= 0.0 || d2 <= 0.0 {
        return Meters(0.0);
    }
    Meters((wavelength.value() * d1 * d2 / (d1 + d2)).sqrt())
}
