pub mod alerts;
pub mod metrics;

use lazy_static::lazy_static;
use metrics::Metrics;

pub use alerts::{AlertManager, OperatorNotifier, Severity};

lazy_static! {
    pub static ref METRICS: Metrics = Metrics::new();
}
