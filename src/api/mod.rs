pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::gis::GisLookup;
use crate::ml::RiskPredictor;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<RiskPredictor>,
    pub gis: Arc<dyn GisLookup>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(predictor: Arc<RiskPredictor>, gis: Arc<dyn GisLookup>) -> Self {
        Self {
            predictor,
            gis,
            started_at: Instant::now(),
        }
    }
}
