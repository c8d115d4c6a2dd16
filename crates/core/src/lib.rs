pub mod config;
pub mod config_loader;
pub mod intent;
pub mod market;
pub mod options;
pub mod state;
pub mod traits;

pub use config::{
    AccountConfig, ConfigError, CoveredCallConfig, EngineConfig, GapSpreadConfig,
    LiquidityConfig, MomentumConfig, PutWriterConfig, RefitCadence, RegimeConfig,
    ScreenerConfig, SymbolsConfig,
};
pub use config_loader::ConfigLoader;
pub use intent::{
    IntentDirection, IntentSize, IntentTarget, SpreadLeg, SpreadOrder, StrategyKind, TradeIntent,
};
pub use market::{Bar, Holding, PortfolioFacts, Tick};
pub use options::{ContractRecord, OptionChain, OptionContract, OptionRight, OrderSide};
pub use state::{BreakerState, BreakerVerdict, RegimeState};
pub use traits::{SignalGenerator, TickContext};
