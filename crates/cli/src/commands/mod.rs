pub mod batch;
pub mod implied_vol;
pub mod monte_carlo;
pub mod price;
pub mod run;

pub use batch::{run_batch, BatchArgs};
pub use implied_vol::{run_implied_vol, ImpliedVolArgs};
pub use monte_carlo::{run_monte_carlo, MonteCarloArgs};
pub use price::{run_price, PriceArgs};
pub use run::{run_engine, RunArgs};
