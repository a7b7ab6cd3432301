pub mod abnormal_returns;
pub mod analyzer;
pub mod batch;
pub mod calendar;
pub mod expected_returns;
pub mod market_model;
pub mod price_history;

pub use abnormal_returns::{AbnormalReturnRow, StandardWindow, WindowReturns};
pub use analyzer::{CarWindows, EventMetrics, EventResult, EventStudy, MetricColumn};
pub use batch::{AggregateRow, BatchItem, BatchOutput, EventFailure, GroupBy};
pub use calendar::AlignDirection;
pub use expected_returns::ExpectedReturnModel;
pub use market_model::MarketModelFit;
pub use price_history::{InMemoryPriceHistory, PriceHistory, WindowSpec};
