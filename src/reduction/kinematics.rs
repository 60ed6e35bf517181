use std::f64::consts::PI;

const NEUTRON_ENERGY_WAVELENGTH: f64 = 81.8047; // meV * A^2, E = 81.8047 / lambda^2

/// Neutron wavevector (1/A) for an energy in meV
pub fn wavevector(energy: f64) -> f64 {
    2.0 * PI / (NEUTRON_ENERGY_WAVELENGTH / energy).sqrt()
}

/// In-plane momentum transfer (Qx, Qy) in 1/A. Angles in degrees; the
/// sample is rotated by -psi and the scattered beam leaves at 2theta from it.
pub fn momentum_transfer(ki: f64, kf: f64, two_theta: f64, sample_angle: f64) -> (f64, f64) {
    let two_theta = two_theta.to_radians();
    let sample_angle = sample_angle.to_radians();

    let qx = ki * (-sample_angle).cos() - kf * (-sample_angle + two_theta).cos();
    let qy = ki * (-sample_angle).sin() - kf * (-sample_angle + two_theta).sin();
    (qx, qy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_wavevector() {
        // 81.8047 meV is a 1 A neutron
        assert_abs_diff_eq!(wavevector(81.8047), 2.0 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(wavevector(5.0), 1.553_37, epsilon = 1e-4);

        let energies = [3.21, 3.38, 4.05, 5.01, 12.0];
        for pair in energies.windows(2) {
            assert!(wavevector(pair[0]) < wavevector(pair[1]));
        }
    }

    #[test]
    fn test_momentum_transfer() {
        // forward scattering without an energy change transfers nothing
        let (qx, qy) = momentum_transfer(1.5, 1.5, 0.0, 23.0);
        assert_abs_diff_eq!(qx, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(qy, 0.0, epsilon = 1e-12);

        let (qx, qy) = momentum_transfer(2.0, 1.0, 90.0, 0.0);
        assert_abs_diff_eq!(qx, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(qy, -1.0, epsilon = 1e-12);
    }
}
