// Library crate: decision engine for trend-following futures trading
// Binaries and integration tests build on these modules

pub mod candle_store;
pub mod config;
pub mod connection;
pub mod event_bus;
pub mod indicators;
pub mod logging;
pub mod ordering;
pub mod position_manager;
pub mod risk;
pub mod risk_manager;
pub mod scan_orchestrator;
pub mod state;
pub mod symbol_scanner;
pub mod tasks;
pub mod trending;
pub mod types;
pub mod utils;

pub use candle_store::CandleStore;
pub use config::{AppCfg, DetectorConfig, ScanConfig, TradingConfig};
pub use connection::{MarketDataGateway, OrderGateway};
pub use event_bus::EventBus;
pub use position_manager::PositionManager;
pub use scan_orchestrator::ScanOrchestrator;
pub use state::SharedState;
pub use trending::SignalDetector;
