use crate::errors::Result;
use crate::forward_model::ForwardModel;
use crate::geometry::Geometry;
use crate::stm::{StmDescriptor, Window};

/// A simplified analytic stand-in for the real EM forward solver (spec §1
/// Non-goals: "no forward EM solver reimplementation"). `ForwardModel` is
/// specified as an external black box (spec §4.3); this implementation
/// lets `aem-invert` construct a runnable model straight from an `.stm`
/// descriptor without depending on an external physics engine. It models a
/// TDEM secondary field's qualitative shape — geometric decay with
/// transmitter standoff, power-law decay with window centre-time,
/// proportional to layer conductance — not a physically exact solution.
pub struct StmForwardModel {
    name: String,
    windows: Vec<Window>,
    thicknesses: Vec<f64>,
}

impl StmForwardModel {
    pub fn new(name: impl Into<String>, descriptor: &StmDescriptor, thicknesses: Vec<f64>) -> Self {
        Self { name: name.into(), windows: descriptor.windows.clone(), thicknesses }
    }

    pub fn from_descriptor(
        name: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        thicknesses: Vec<f64>,
    ) -> Result<Self> {
        let descriptor = StmDescriptor::load(path)?;
        Ok(Self::new(name, &descriptor, thicknesses))
    }
}

impl ForwardModel for StmForwardModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_response(&self) -> usize {
        self.windows.len()
    }

    fn eval(&self, geometry: &Geometry, layered_conductivity: &[f64]) -> Result<Vec<f64>> {
        assert_eq!(layered_conductivity.len(), self.thicknesses.len());
        let conductance: f64 =
            self.thicknesses.iter().zip(layered_conductivity).map(|(t, c)| t * c).sum();
        let standoff = geometry.tx_height.abs() + geometry.txrx_dz.abs() + 1.0;
        Ok(self
            .windows
            .iter()
            .map(|w| conductance * (-w.centre() / standoff).exp() / standoff.powi(3))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> StmDescriptor {
        let text = "\
Transmitter Begin
    NumberOfTurns = 1
Transmitter End

Receiver Begin
    NumberOfWindows = 2
Receiver End

ForwardModelling Begin
    WindowTimes Begin
        1.0e-6 2.0e-6
        2.0e-6 4.0e-6
    WindowTimes End
ForwardModelling End
";
        StmDescriptor::parse(text, std::path::Path::new("t.stm")).unwrap()
    }

    #[test]
    fn response_length_matches_window_count() {
        let model = StmForwardModel::new("sys0", &descriptor(), vec![10.0, 10.0]);
        let geometry = Geometry::from_fields(&[30.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let response = model.eval(&geometry, &[0.1, 0.2]).unwrap();
        assert_eq!(response.len(), 2);
        assert_eq!(model.n_response(), 2);
    }

    #[test]
    fn higher_conductance_increases_response_magnitude() {
        let model = StmForwardModel::new("sys0", &descriptor(), vec![10.0, 10.0]);
        let geometry = Geometry::from_fields(&[30.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let weak = model.eval(&geometry, &[0.01, 0.01]).unwrap();
        let strong = model.eval(&geometry, &[1.0, 1.0]).unwrap();
        assert!(strong[0] > weak[0]);
    }

    #[test]
    fn greater_standoff_attenuates_the_response() {
        let model = StmForwardModel::new("sys0", &descriptor(), vec![10.0, 10.0]);
        let near = Geometry::from_fields(&[10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let far = Geometry::from_fields(&[200.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let near_response = model.eval(&near, &[0.5, 0.5]).unwrap();
        let far_response = model.eval(&far, &[0.5, 0.5]).unwrap();
        assert!(near_response[0] > far_response[0]);
    }
}
