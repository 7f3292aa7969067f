use serde::{Deserialize, Serialize};

/// Flight-path geometry for a single observation point (spec §6): ten
/// floats describing transmitter attitude and the fixed tx/rx offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub tx_height: f64,
    pub tx_roll: f64,
    pub tx_pitch: f64,
    pub tx_yaw: f64,
    pub txrx_dx: f64,
    pub txrx_dy: f64,
    pub txrx_dz: f64,
    pub rx_roll: f64,
    pub rx_pitch: f64,
    pub rx_yaw: f64,
}

impl Geometry {
    pub const FIELD_COUNT: usize = 10;

    pub fn from_fields(fields: &[f64; Self::FIELD_COUNT]) -> Self {
        Self {
            tx_height: fields[0],
            tx_roll: fields[1],
            tx_pitch: fields[2],
            tx_yaw: fields[3],
            txrx_dx: fields[4],
            txrx_dy: fields[5],
            txrx_dz: fields[6],
            rx_roll: fields[7],
            rx_pitch: fields[8],
            rx_yaw: fields[9],
        }
    }

    pub fn to_fields(self) -> [f64; Self::FIELD_COUNT] {
        [
            self.tx_height,
            self.tx_roll,
            self.tx_pitch,
            self.tx_yaw,
            self.txrx_dx,
            self.txrx_dy,
            self.txrx_dz,
            self.rx_roll,
            self.rx_pitch,
            self.rx_yaw,
        ]
    }
}

/// Which component of the EM field a response sub-record was measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Direction {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Self::X),
            1 => Some(Self::Y),
            2 => Some(Self::Z),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        self as i64
    }
}
