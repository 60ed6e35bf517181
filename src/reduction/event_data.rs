use polars::prelude::*;

use crate::error::PrismError;
use crate::io::run_params::RunParameters;
use crate::reduction::kinematics::{momentum_transfer, wavevector};

/// Columns of the reduced event table, in output order
#[derive(Debug, Clone, Copy, Hash, Eq, PartialOrd, Ord, PartialEq)]
pub enum EventColumn {
    IncidentEnergy,
    FinalEnergy,
    TwoTheta,
    SampleAngle,
    ReprojectedIntensity,
    EnergyTransfer,
    Ki,
    Kf,
    Qx,
    Qy,
    Intensity,
}

impl EventColumn {
    pub const ALL: [EventColumn; 11] = [
        EventColumn::IncidentEnergy,
        EventColumn::FinalEnergy,
        EventColumn::TwoTheta,
        EventColumn::SampleAngle,
        EventColumn::ReprojectedIntensity,
        EventColumn::EnergyTransfer,
        EventColumn::Ki,
        EventColumn::Kf,
        EventColumn::Qx,
        EventColumn::Qy,
        EventColumn::Intensity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventColumn::IncidentEnergy => "Ei",
            EventColumn::FinalEnergy => "Ef",
            EventColumn::TwoTheta => "Two Theta",
            EventColumn::SampleAngle => "Sample Angle",
            EventColumn::ReprojectedIntensity => "Reprojected Intensity",
            EventColumn::EnergyTransfer => "E",
            EventColumn::Ki => "ki",
            EventColumn::Kf => "kf",
            EventColumn::Qx => "Qx",
            EventColumn::Qy => "Qy",
            EventColumn::Intensity => "Intensity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.name() == name)
    }
}

/// Reduced events, one row per (run, tube, calibration energy). Columns are
/// kept the same length at all times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReducedEvents {
    pub incident_energy: Vec<f64>,
    pub final_energy: Vec<f64>,
    pub two_theta: Vec<f64>,
    pub sample_angle: Vec<f64>,
    pub reprojected_intensity: Vec<f64>,
    pub energy_transfer: Vec<f64>,
    pub ki: Vec<f64>,
    pub kf: Vec<f64>,
    pub qx: Vec<f64>,
    pub qy: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl ReducedEvents {
    pub fn len(&self) -> usize {
        self.incident_energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incident_energy.is_empty()
    }

    /// Adds one row per final energy for a tube at `two_theta`, deriving the
    /// energy transfer, wavevectors, Q and the ki/kf corrected intensity.
    pub fn push_tube(
        &mut self,
        params: &RunParameters,
        two_theta: f64,
        final_energies: &[f64],
        reprojected: &[f64],
    ) {
        let ei = params.incident_energy;
        let ki = wavevector(ei);

        for (&ef, &reprojected) in final_energies.iter().zip(reprojected) {
            let kf = wavevector(ef);
            let (qx, qy) = momentum_transfer(ki, kf, two_theta, params.sample_angle);

            self.incident_energy.push(ei);
            self.final_energy.push(ef);
            self.two_theta.push(two_theta);
            self.sample_angle.push(params.sample_angle);
            self.reprojected_intensity.push(reprojected);
            self.energy_transfer.push(ei - ef);
            self.ki.push(ki);
            self.kf.push(kf);
            self.qx.push(qx);
            self.qy.push(qy);
            self.intensity.push(reprojected * ki / kf);
        }
    }

    pub fn append(&mut self, mut other: ReducedEvents) {
        self.incident_energy.append(&mut other.incident_energy);
        self.final_energy.append(&mut other.final_energy);
        self.two_theta.append(&mut other.two_theta);
        self.sample_angle.append(&mut other.sample_angle);
        self.reprojected_intensity.append(&mut other.reprojected_intensity);
        self.energy_transfer.append(&mut other.energy_transfer);
        self.ki.append(&mut other.ki);
        self.kf.append(&mut other.kf);
        self.qx.append(&mut other.qx);
        self.qy.append(&mut other.qy);
        self.intensity.append(&mut other.intensity);
    }

    pub fn column(&self, column: EventColumn) -> &[f64] {
        match column {
            EventColumn::IncidentEnergy => &self.incident_energy,
            EventColumn::FinalEnergy => &self.final_energy,
            EventColumn::TwoTheta => &self.two_theta,
            EventColumn::SampleAngle => &self.sample_angle,
            EventColumn::ReprojectedIntensity => &self.reprojected_intensity,
            EventColumn::EnergyTransfer => &self.energy_transfer,
            EventColumn::Ki => &self.ki,
            EventColumn::Kf => &self.kf,
            EventColumn::Qx => &self.qx,
            EventColumn::Qy => &self.qy,
            EventColumn::Intensity => &self.intensity,
        }
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, PrismError> {
        let df = df!(
            EventColumn::IncidentEnergy.name() => &self.incident_energy,
            EventColumn::FinalEnergy.name() => &self.final_energy,
            EventColumn::TwoTheta.name() => &self.two_theta,
            EventColumn::SampleAngle.name() => &self.sample_angle,
            EventColumn::ReprojectedIntensity.name() => &self.reprojected_intensity,
            EventColumn::EnergyTransfer.name() => &self.energy_transfer,
            EventColumn::Ki.name() => &self.ki,
            EventColumn::Kf.name() => &self.kf,
            EventColumn::Qx.name() => &self.qx,
            EventColumn::Qy.name() => &self.qy,
            EventColumn::Intensity.name() => &self.intensity,
        )?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn params() -> RunParameters {
        RunParameters {
            incident_energy: 5.5,
            two_theta_base: 30.0,
            sample_angle: -12.5,
        }
    }

    #[test]
    fn test_push_tube_derives_columns() {
        let mut events = ReducedEvents::default();
        events.push_tube(&params(), 34.44, &[3.21, 4.05, 5.5], &[2.0, 0.0, 1.0]);

        assert_eq!(events.len(), 3);
        for (i, &ef) in events.final_energy.iter().enumerate() {
            assert_eq!(events.energy_transfer[i], 5.5 - ef);
            assert_eq!(events.two_theta[i], 34.44);
            assert_abs_diff_eq!(
                events.intensity[i],
                events.reprojected_intensity[i] * events.ki[i] / events.kf[i],
                epsilon = 1e-12
            );
        }

        // elastic row keeps its intensity
        assert_abs_diff_eq!(events.intensity[2], 1.0, epsilon = 1e-12);
        assert!(events.intensity[0] > 2.0);
    }

    #[test]
    fn test_dataframe_columns() {
        let mut events = ReducedEvents::default();
        events.push_tube(&params(), 30.0, &[3.21, 4.05], &[1.0, 1.0]);

        let mut more = ReducedEvents::default();
        more.push_tube(&params(), 37.5, &[3.21, 4.05], &[1.0, 3.0]);
        events.append(more);

        let df = events.to_dataframe().unwrap();
        assert_eq!(df.shape(), (4, 11));

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let expected: Vec<String> = EventColumn::ALL
            .iter()
            .map(|column| column.name().to_owned())
            .collect();
        assert_eq!(names, expected);

        let two_theta: Vec<f64> = df
            .column("Two Theta")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(two_theta, vec![30.0, 30.0, 37.5, 37.5]);
    }

    #[test]
    fn test_column_names_round_trip() {
        assert_eq!(EventColumn::from_name("Qx"), Some(EventColumn::Qx));
        assert_eq!(EventColumn::from_name("Sample Angle"), Some(EventColumn::SampleAngle));
        assert_eq!(EventColumn::from_name("qx"), None);
    }
}
