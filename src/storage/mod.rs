pub mod db;
pub mod repository;
pub mod tariff;

pub use db::{connect, run_migrations, run_seed};
pub use repository::TariffRepository;
pub use tariff::NewTariff;
