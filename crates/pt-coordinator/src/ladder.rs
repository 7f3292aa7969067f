use crate::errors::{PtError, Result};

/// A temperature ladder of `levels` geometrically-spaced rungs from `T = 1`
/// (the posterior replica) up to `max_temperature`, each rung hosting
/// `chains_per_t` replicas (spec §4.5: "Temperature ladder of `M` levels
/// with `chains_per_T` replicas at each level (total = `M·chains_per_T`,
/// must be even)").
#[derive(Debug, Clone)]
pub struct TemperatureLadder {
    temperatures: Vec<f64>,
    chains_per_t: usize,
}

impl TemperatureLadder {
    pub fn new(levels: usize, chains_per_t: usize, max_temperature: f64) -> Result<Self> {
        if levels == 0 || chains_per_t == 0 || (levels * chains_per_t) % 2 != 0 {
            return Err(PtError::InvalidLadder { levels, chains_per_t });
        }
        assert!(max_temperature >= 1.0, "max_temperature must be >= 1.0");
        let temperatures = if levels == 1 {
            vec![1.0]
        } else {
            (0..levels)
                .map(|m| max_temperature.powf(m as f64 / (levels - 1) as f64))
                .collect()
        };
        Ok(Self { temperatures, chains_per_t })
    }

    pub fn levels(&self) -> usize {
        self.temperatures.len()
    }

    pub fn chains_per_t(&self) -> usize {
        self.chains_per_t
    }

    pub fn total_replicas(&self) -> usize {
        self.temperatures.len() * self.chains_per_t
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    /// The temperature level index for a flat replica index `0..total_replicas()`
    /// (replicas are laid out level-major: all `chains_per_t` replicas of
    /// level 0, then level 1, ...).
    pub fn level_of(&self, replica: usize) -> usize {
        replica / self.chains_per_t
    }

    /// The fixed temperature of a flat replica index, per spec §4.5's
    /// "temperatures stay at their rank positions".
    pub fn temperature_of(&self, replica: usize) -> f64 {
        self.temperatures[self.level_of(replica)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_level_ladder_is_just_the_posterior_replica() {
        let ladder = TemperatureLadder::new(1, 4, 1.0).unwrap();
        assert_eq!(ladder.temperatures(), &[1.0]);
        assert_eq!(ladder.total_replicas(), 4);
    }

    #[test]
    fn ladder_is_geometrically_spaced_and_starts_at_one() {
        let ladder = TemperatureLadder::new(3, 2, 100.0).unwrap();
        assert_eq!(ladder.temperatures().len(), 3);
        assert!((ladder.temperatures()[0] - 1.0).abs() < 1e-12);
        assert!((ladder.temperatures()[2] - 100.0).abs() < 1e-9);
        assert!(ladder.temperatures()[1] > 1.0 && ladder.temperatures()[1] < 100.0);
    }

    #[test]
    fn odd_total_replica_count_is_rejected() {
        assert!(TemperatureLadder::new(3, 1, 10.0).is_err());
    }

    #[test]
    fn level_and_temperature_lookup_is_rank_major_by_level() {
        let ladder = TemperatureLadder::new(2, 3, 4.0).unwrap();
        assert_eq!(ladder.level_of(0), 0);
        assert_eq!(ladder.level_of(2), 0);
        assert_eq!(ladder.level_of(3), 1);
        assert!((ladder.temperature_of(3) - 4.0).abs() < 1e-12);
    }
}
