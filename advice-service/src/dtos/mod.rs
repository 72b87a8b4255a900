pub mod predict;

pub use predict::{PredictRequest, PredictResponse};
