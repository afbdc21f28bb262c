//! Window Strategy Implementations

pub mod counting;
pub mod session;
pub mod sliding;
pub mod tumbling;

pub use counting::CountingWindowStrategy;
pub use session::SessionWindowStrategy;
pub use sliding::SlidingWindowStrategy;
pub use tumbling::TumblingWindowStrategy;

use super::traits::WindowStrategy;
use crate::velostream::sql::ast::WindowSpec;

/// Build the strategy for a window specification.
pub fn create_strategy(spec: &WindowSpec) -> Box<dyn WindowStrategy> {
    match spec {
        WindowSpec::Tumbling { size } => {
            Box::new(TumblingWindowStrategy::new(duration_millis(size)))
        }
        WindowSpec::Sliding { size, slide } => Box::new(SlidingWindowStrategy::new(
            duration_millis(size),
            duration_millis(slide),
        )),
        WindowSpec::Counting { count } => Box::new(CountingWindowStrategy::new(*count)),
        WindowSpec::Session { gap } => Box::new(SessionWindowStrategy::new(duration_millis(gap))),
    }
}

fn duration_millis(duration: &std::time::Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
