pub mod engine;
pub mod events;
pub mod paper;
pub mod revaluation;
pub mod signals;
pub mod simulated;
pub mod traits;

pub use engine::{CycleReport, EngineStats, TradingEngine};
pub use events::{Fill, OrderIntent};
pub use paper::{PaperExecution, COMMISSION_PER_CONTRACT};
pub use revaluation::{MarketState, OptionQuote, RevaluationSummary, Revaluer, VolSource};
pub use signals::MispricingSignal;
pub use simulated::{option_symbol, SimulatedFeed};
pub use traits::{DataProvider, ExecutionHandler, SignalSource};
