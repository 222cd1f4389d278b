//! Catalog access and aggregation services

pub mod catalog_client;
pub mod energy;
pub mod fanout_collector;
pub mod retry_policy;
pub mod token_exchanger;

pub use catalog_client::{build_http_client, Catalog, CatalogClient, CatalogError, ErrorKind};
pub use energy::{weighted_mean_energy, EnergyOutcome, NoDataReason, WeightedEnergy};
pub use fanout_collector::{FanoutCollector, FetchOutcome, OutcomeCounts};
pub use retry_policy::RetryPolicy;
pub use token_exchanger::{AccessToken, TokenExchanger};
