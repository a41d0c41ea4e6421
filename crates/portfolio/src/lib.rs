pub mod contract;
pub mod error;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod risk_manager;

pub use contract::OptionContract;
pub use error::{PortfolioError, RiskError, RiskViolation};
pub use order::{Order, OrderPrices, OrderSide, OrderStatus, OrderType};
pub use portfolio::{Portfolio, PortfolioSnapshot, MAX_ORDERS, MAX_POSITIONS};
pub use position::Position;
pub use risk_manager::{RiskAdjustment, RiskLimits, RiskManager};
