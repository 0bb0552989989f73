pub mod currency_api;
pub mod firefly;

pub use currency_api::CurrencyApiFeed;
pub use firefly::FireflyClient;
